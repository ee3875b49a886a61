//! Scripted transport shared by the integration tests

#![allow(dead_code)]

use nesp_core::protocol::{packet::calculate_crc, Transport};
use nesp_core::pump::{Pump, PumpConfig};
use std::collections::VecDeque;
use std::io;
use std::time::Duration;

const STX: u8 = 0x02;
const ETX: u8 = 0x03;

/// What the mock pump does after receiving the next frame
enum Scripted {
    Bytes(Vec<u8>),
    Silence,
}

/// Mock serial link: one scripted reply per written frame
pub struct MockTransport {
    replies: VecDeque<Scripted>,
    input: VecDeque<u8>,
    written: Vec<Vec<u8>>,
    pub fail_on_send: bool,
}

impl MockTransport {
    pub fn new() -> Self {
        Self {
            replies: VecDeque::new(),
            input: VecDeque::new(),
            written: Vec::new(),
            fail_on_send: false,
        }
    }

    /// Queue a basic-mode reply, e.g. `"00S"` or `"00SNE1000V3.928"`
    pub fn reply(mut self, body: &str) -> Self {
        self.push_reply(body);
        self
    }

    /// Queue the same reply several times
    pub fn replies(mut self, body: &str, count: usize) -> Self {
        for _ in 0..count {
            self.push_reply(body);
        }
        self
    }

    /// Queue a safe-mode reply packet
    pub fn reply_safe(mut self, body: &str) -> Self {
        self.replies.push_back(Scripted::Bytes(safe_packet(body.as_bytes())));
        self
    }

    /// Queue raw reply bytes
    pub fn reply_raw(mut self, bytes: &[u8]) -> Self {
        self.replies.push_back(Scripted::Bytes(bytes.to_vec()));
        self
    }

    /// Let the next frame go unanswered
    pub fn silence(mut self) -> Self {
        self.replies.push_back(Scripted::Silence);
        self
    }

    pub fn push_reply(&mut self, body: &str) {
        let mut frame = vec![STX];
        frame.extend_from_slice(body.as_bytes());
        frame.push(ETX);
        self.replies.push_back(Scripted::Bytes(frame));
    }

    /// Frames written so far, as text
    pub fn sent(&self) -> Vec<String> {
        self.written
            .iter()
            .map(|frame| String::from_utf8_lossy(frame).into_owned())
            .collect()
    }

    /// Raw frames written so far
    pub fn sent_raw(&self) -> &[Vec<u8>] {
        &self.written
    }

    /// Scripted replies not consumed yet
    pub fn pending_replies(&self) -> usize {
        self.replies.len()
    }
}

impl Transport for MockTransport {
    fn write_all(&mut self, data: &[u8]) -> io::Result<()> {
        if self.fail_on_send {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "Serial write failed"));
        }
        self.written.push(data.to_vec());
        if let Some(Scripted::Bytes(bytes)) = self.replies.pop_front() {
            self.input.extend(bytes);
        }
        Ok(())
    }

    fn read_until(&mut self, terminator: u8, _timeout: Duration) -> io::Result<Vec<u8>> {
        match self.input.iter().position(|b| *b == terminator) {
            Some(end) => Ok(self.input.drain(..=end).collect()),
            None => Err(io::Error::new(io::ErrorKind::TimedOut, "no reply")),
        }
    }

    fn read_exact(&mut self, len: usize, _timeout: Duration) -> io::Result<Vec<u8>> {
        if self.input.len() < len {
            return Err(io::Error::new(io::ErrorKind::TimedOut, "no reply"));
        }
        Ok(self.input.drain(..len).collect())
    }

    fn clear_input(&mut self) -> io::Result<()> {
        self.input.clear();
        Ok(())
    }
}

/// Build a safe-mode packet around `data`
pub fn safe_packet(data: &[u8]) -> Vec<u8> {
    let mut packet = vec![STX, (data.len() + 4) as u8];
    packet.extend_from_slice(data);
    packet.extend_from_slice(&calculate_crc(data).to_be_bytes());
    packet.push(ETX);
    packet
}

/// Configuration with no polling delay
pub fn fast_config() -> PumpConfig {
    PumpConfig {
        poll_interval_ms: 0,
        ..PumpConfig::default()
    }
}

/// Session on address 0 without a handshake
pub fn pump(transport: MockTransport) -> Pump<MockTransport> {
    Pump::new(transport, &fast_config()).unwrap()
}
