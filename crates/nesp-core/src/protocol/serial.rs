//! Byte transport
//!
//! The session only needs a request/response byte channel; [`Transport`]
//! is that seam. [`SerialTransport`] implements it over an OS serial port.

use serialport::{SerialPort, SerialPortInfo, SerialPortType};
use std::io::{self, Read, Write};
use std::time::{Duration, Instant};

use super::DEFAULT_BAUD_RATE;

/// How long a single OS read may block before the deadline is re-checked
const READ_SLICE: Duration = Duration::from_millis(20);

/// Full-duplex byte channel to a pump
///
/// Reads that hit their deadline must fail with [`io::ErrorKind::TimedOut`].
pub trait Transport {
    /// Write a complete frame
    fn write_all(&mut self, data: &[u8]) -> io::Result<()>;

    /// Read up to and including `terminator`
    fn read_until(&mut self, terminator: u8, timeout: Duration) -> io::Result<Vec<u8>>;

    /// Read exactly `len` bytes
    fn read_exact(&mut self, len: usize, timeout: Duration) -> io::Result<Vec<u8>>;

    /// Discard unread input (stale replies)
    fn clear_input(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn write_all(&mut self, data: &[u8]) -> io::Result<()> {
        (**self).write_all(data)
    }

    fn read_until(&mut self, terminator: u8, timeout: Duration) -> io::Result<Vec<u8>> {
        (**self).read_until(terminator, timeout)
    }

    fn read_exact(&mut self, len: usize, timeout: Duration) -> io::Result<Vec<u8>> {
        (**self).read_exact(len, timeout)
    }

    fn clear_input(&mut self) -> io::Result<()> {
        (**self).clear_input()
    }
}

/// Serial port transport (8N1, no flow control)
pub struct SerialTransport {
    port: Box<dyn SerialPort>,
    /// Bytes read past the end of the previous frame
    pending: Vec<u8>,
}

impl SerialTransport {
    /// Open and configure a serial port
    pub fn open(name: &str, baud_rate: Option<u32>) -> io::Result<Self> {
        let baud = baud_rate.unwrap_or(DEFAULT_BAUD_RATE);
        tracing::debug!(port = name, baud, "opening serial port");

        let port = serialport::new(name, baud)
            .data_bits(serialport::DataBits::Eight)
            .parity(serialport::Parity::None)
            .stop_bits(serialport::StopBits::One)
            .flow_control(serialport::FlowControl::None)
            .timeout(READ_SLICE)
            .open()?;

        let mut transport = Self::from_port(port);
        transport.clear_input()?;
        Ok(transport)
    }

    /// Wrap an already configured port
    pub fn from_port(port: Box<dyn SerialPort>) -> Self {
        Self {
            port,
            pending: Vec::new(),
        }
    }

    /// Port name, if the OS reports one
    pub fn name(&self) -> Option<String> {
        self.port.name()
    }

    /// Pull whatever arrives within one read slice into `pending`
    fn fill(&mut self, deadline: Instant) -> io::Result<()> {
        if Instant::now() >= deadline {
            return Err(io::Error::new(
                io::ErrorKind::TimedOut,
                "no complete reply before deadline",
            ));
        }
        let mut buffer = [0u8; 64];
        match self.port.read(&mut buffer) {
            Ok(0) => Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "serial port closed",
            )),
            Ok(n) => {
                tracing::trace!(bytes = ?&buffer[..n], "serial read");
                self.pending.extend_from_slice(&buffer[..n]);
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::TimedOut || e.kind() == io::ErrorKind::WouldBlock => {
                Ok(())
            }
            Err(e) => Err(e),
        }
    }
}

impl Transport for SerialTransport {
    fn write_all(&mut self, data: &[u8]) -> io::Result<()> {
        Write::write_all(&mut *self.port, data)?;
        self.port.flush()
    }

    fn read_until(&mut self, terminator: u8, timeout: Duration) -> io::Result<Vec<u8>> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(end) = self.pending.iter().position(|b| *b == terminator) {
                return Ok(self.pending.drain(..=end).collect());
            }
            self.fill(deadline)?;
        }
    }

    fn read_exact(&mut self, len: usize, timeout: Duration) -> io::Result<Vec<u8>> {
        let deadline = Instant::now() + timeout;
        while self.pending.len() < len {
            self.fill(deadline)?;
        }
        Ok(self.pending.drain(..len).collect())
    }

    fn clear_input(&mut self) -> io::Result<()> {
        self.pending.clear();
        self.port.clear(serialport::ClearBuffer::Input)?;
        Ok(())
    }
}

/// Information about an available serial port
#[derive(Debug, Clone)]
pub struct PortInfo {
    /// Port name (e.g., "/dev/ttyUSB0" or "COM3")
    pub name: String,

    /// USB vendor ID (if USB device)
    pub vid: Option<u16>,

    /// USB product ID (if USB device)
    pub pid: Option<u16>,

    /// Product name (if available)
    pub product: Option<String>,
}

impl From<SerialPortInfo> for PortInfo {
    fn from(info: SerialPortInfo) -> Self {
        let (vid, pid, product) = match info.port_type {
            SerialPortType::UsbPort(usb_info) => {
                (Some(usb_info.vid), Some(usb_info.pid), usb_info.product)
            }
            _ => (None, None, None),
        };

        Self {
            name: info.port_name,
            vid,
            pid,
            product,
        }
    }
}

/// Sort key: USB ports first, then by name stem and numeric suffix
/// (so COM2 sorts before COM10)
fn port_sort_key(port: &PortInfo) -> (bool, String, usize) {
    let stem = port.name.trim_end_matches(|c: char| c.is_ascii_digit());
    let number = port.name[stem.len()..].parse::<usize>().unwrap_or(0);
    (port.vid.is_none(), stem.to_string(), number)
}

/// List available serial ports in a deterministic order
pub fn list_ports() -> Vec<PortInfo> {
    let mut ports: Vec<PortInfo> = serialport::available_ports()
        .unwrap_or_default()
        .into_iter()
        .map(PortInfo::from)
        .collect();
    ports.sort_by_key(port_sort_key);
    ports
}

#[cfg(test)]
mod tests {
    use super::*;

    fn port(name: &str, usb: bool) -> PortInfo {
        PortInfo {
            name: name.to_string(),
            vid: usb.then_some(0x0403),
            pid: usb.then_some(0x6001),
            product: None,
        }
    }

    #[test]
    fn test_list_ports() {
        // Only checks that enumeration does not panic
        let ports = list_ports();
        for port in &ports {
            println!("Found port: {} - {:?}", port.name, port.product);
        }
    }

    #[test]
    fn test_port_sorting() {
        let mut ports = vec![
            port("/dev/ttyS0", false),
            port("COM10", true),
            port("/dev/ttyUSB1", true),
            port("COM2", true),
            port("/dev/ttyUSB0", true),
        ];
        ports.sort_by_key(port_sort_key);
        let ordered: Vec<&str> = ports.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(
            ordered,
            vec!["/dev/ttyUSB0", "/dev/ttyUSB1", "COM2", "COM10", "/dev/ttyS0"]
        );
    }
}
