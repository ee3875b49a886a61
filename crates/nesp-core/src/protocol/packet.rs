//! Safe-mode packet encoding/decoding
//!
//! Packet format:
//! - 1 byte: STX
//! - 1 byte: length (data length + 4: the length byte, CRC and ETX)
//! - N bytes: data (same text as a basic-mode frame, without terminator)
//! - 2 bytes: CRC-16/XMODEM of data (big-endian)
//! - 1 byte: ETX

use crc::{Crc, CRC_16_XMODEM};

use super::{
    codec::{self, DecodedResponse},
    Command, EncodingError, ProtocolError, REPLY_START, REPLY_TERMINATOR,
};
use crate::pump::PumpAddress;

/// CCITT CRC with zero initial value
const CRC16: Crc<u16> = Crc::<u16>::new(&CRC_16_XMODEM);

/// Bytes counted by the length byte besides the data
const LENGTH_OVERHEAD: usize = 4;

/// Bytes preceding the data (STX and length)
pub const HEADER_SIZE: usize = 2;

/// Calculate the checksum of packet data
pub fn calculate_crc(data: &[u8]) -> u16 {
    CRC16.checksum(data)
}

/// Encode a safe-mode command packet
pub fn encode(address: PumpAddress, command: &Command) -> Result<Vec<u8>, EncodingError> {
    let data = codec::frame_body(address, command)?;
    let crc = calculate_crc(&data);

    let mut packet = Vec::with_capacity(HEADER_SIZE + data.len() + 3);
    packet.push(REPLY_START);
    packet.push((data.len() + LENGTH_OVERHEAD) as u8);
    packet.extend_from_slice(&data);
    packet.extend_from_slice(&crc.to_be_bytes());
    packet.push(REPLY_TERMINATOR);
    Ok(packet)
}

/// Number of bytes still to read after the 2-byte header
pub fn remaining_length(header: &[u8]) -> Result<usize, ProtocolError> {
    match header {
        [REPLY_START, length] if (*length as usize) > LENGTH_OVERHEAD - 1 => {
            Ok(*length as usize - 1)
        }
        [REPLY_START, length] => Err(ProtocolError::malformed(format!(
            "packet length {} too short",
            length
        ))),
        _ => Err(ProtocolError::malformed("missing packet start")),
    }
}

/// Decode a complete safe-mode reply packet, failing on an alarm
pub fn decode(packet: &[u8]) -> Result<DecodedResponse, ProtocolError> {
    decode_frame(packet)?.check_alarm()
}

/// Decode a complete safe-mode reply packet, keeping an alarm as its status
pub fn decode_frame(packet: &[u8]) -> Result<DecodedResponse, ProtocolError> {
    if packet.len() < HEADER_SIZE {
        return Err(ProtocolError::malformed("packet truncated"));
    }
    let remaining = remaining_length(&packet[..HEADER_SIZE])?;
    let tail = &packet[HEADER_SIZE..];
    if tail.len() != remaining {
        return Err(ProtocolError::malformed(format!(
            "packet length {} does not match header {}",
            tail.len(),
            remaining
        )));
    }

    let (body, terminator) = tail.split_at(tail.len() - 1);
    if terminator != [REPLY_TERMINATOR] {
        return Err(ProtocolError::malformed("missing terminator"));
    }
    let (data, crc_bytes) = body.split_at(body.len() - 2);
    let actual = u16::from_be_bytes([crc_bytes[0], crc_bytes[1]]);
    let expected = calculate_crc(data);
    if actual != expected {
        return Err(ProtocolError::ChecksumMismatch { expected, actual });
    }

    codec::decode_body(data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pump::PumpStatus;

    fn reply(data: &[u8]) -> Vec<u8> {
        let mut packet = vec![REPLY_START, (data.len() + LENGTH_OVERHEAD) as u8];
        packet.extend_from_slice(data);
        packet.extend_from_slice(&calculate_crc(data).to_be_bytes());
        packet.push(REPLY_TERMINATOR);
        packet
    }

    #[test]
    fn test_crc_check_value() {
        // CRC-16/XMODEM check value
        assert_eq!(calculate_crc(b"123456789"), 0x31C3);
    }

    #[test]
    fn test_encode_packet() {
        let packet = encode(PumpAddress::new(0).unwrap(), &Command::Run).unwrap();
        assert_eq!(packet[0], REPLY_START);
        assert_eq!(packet[1] as usize, b"00RUN".len() + 4);
        assert_eq!(&packet[2..7], b"00RUN");
        assert_eq!(
            u16::from_be_bytes([packet[7], packet[8]]),
            calculate_crc(b"00RUN")
        );
        assert_eq!(packet[9], REPLY_TERMINATOR);
        assert_eq!(packet.len(), 1 + packet[1] as usize);
    }

    #[test]
    fn test_decode_packet() {
        let response = decode(&reply(b"00I")).unwrap();
        assert_eq!(response.status, PumpStatus::Infusing);
    }

    #[test]
    fn test_decode_bad_crc() {
        let mut packet = reply(b"00S");
        packet[5] ^= 0xFF;
        assert!(matches!(
            decode(&packet),
            Err(ProtocolError::ChecksumMismatch { .. })
        ));
    }

    #[test]
    fn test_decode_truncated() {
        let packet = reply(b"00S");
        assert!(matches!(
            decode(&packet[..packet.len() - 1]),
            Err(ProtocolError::Malformed(_))
        ));
        assert!(matches!(decode(&[0x02]), Err(ProtocolError::Malformed(_))));
        assert!(matches!(
            remaining_length(&[0x02, 0x03]),
            Err(ProtocolError::Malformed(_))
        ));
    }
}
