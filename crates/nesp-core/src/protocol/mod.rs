//! Serial Protocol Communication
//!
//! Implements the New Era syringe pump command protocol.
//!
//! Supports both basic mode (ASCII frames terminated by CR/ETX) and safe
//! mode (length-prefixed packets with CRC-16).

pub mod codec;
pub mod commands;
mod decimal;
mod error;
pub mod packet;
pub mod serial;

pub use codec::{decode, encode, DecodedResponse, DeviceError, Dispensed, Reply};
pub use commands::Command;
pub use decimal::Decimal;
pub use error::{EncodingError, ProtocolError};
pub use serial::{list_ports, PortInfo, SerialTransport, Transport};

/// Default baud rate of New Era pumps
pub const DEFAULT_BAUD_RATE: u32 = 9600;

/// Default timeout for replies in milliseconds
pub const DEFAULT_TIMEOUT_MS: u64 = 1000;

/// Terminates every basic-mode command frame
pub const COMMAND_TERMINATOR: u8 = b'\r';

/// Starts every reply frame and safe-mode packet (STX)
pub const REPLY_START: u8 = 0x02;

/// Terminates every reply frame and safe-mode packet (ETX)
pub const REPLY_TERMINATOR: u8 = 0x03;
