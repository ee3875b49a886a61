//! Protocol errors

use thiserror::Error;

use crate::pump::Alarm;

/// Errors raised while exchanging frames with the pump
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProtocolError {
    #[error("No reply from pump within the read timeout")]
    Timeout,

    #[error("Malformed reply: {0}")]
    Malformed(String),

    #[error("Pump alarm: {0}")]
    Alarm(Alarm),

    #[error("Reply from address {actual:02}, expected {expected:02}")]
    AddressMismatch { expected: u8, actual: u8 },

    #[error("CRC mismatch: expected {expected:#06x}, got {actual:#06x}")]
    ChecksumMismatch { expected: u16, actual: u16 },

    #[error("Pump received a corrupted request")]
    Communication,
}

impl ProtocolError {
    pub(crate) fn malformed(reason: impl Into<String>) -> Self {
        ProtocolError::Malformed(reason.into())
    }
}

/// A value that cannot be represented in a command frame
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EncodingError {
    #[error("{quantity} {value} outside [{min}, {max}]")]
    OutOfRange {
        quantity: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("{value} needs more than 4 significant digits or 3 decimals")]
    Precision { value: f64 },

    #[error("Value is not a finite number")]
    NotFinite,
}
