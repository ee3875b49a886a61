//! Session errors

use std::io;
use thiserror::Error;

use super::{Alarm, SessionState};
use crate::protocol::{DeviceError, EncodingError, ProtocolError};

/// Errors returned by [`Pump`](super::Pump) operations
#[derive(Error, Debug)]
pub enum PumpError {
    /// Transport failure; the session should be considered lost
    #[error("I/O error: {0}")]
    Io(io::Error),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// The pump refused the command; local state is unchanged
    #[error("Pump rejected command: {0}")]
    DeviceRejected(DeviceError),

    /// Value not representable on the wire; nothing was sent
    #[error("Cannot encode value: {0}")]
    Encoding(#[from] EncodingError),

    /// Operation not allowed in the current session state; nothing was sent
    #[error("Cannot {operation} while {state}")]
    InvalidState {
        operation: &'static str,
        state: SessionState,
    },

    #[error("Expected pump model {expected}, found {actual}")]
    IdentityMismatch { expected: String, actual: String },
}

impl PumpError {
    /// Alarm carried by this error, if the pump reported one
    pub fn alarm(&self) -> Option<Alarm> {
        match self {
            PumpError::Protocol(ProtocolError::Alarm(alarm)) => Some(*alarm),
            _ => None,
        }
    }

    /// Whether the pump failed to reply in time
    pub fn is_timeout(&self) -> bool {
        matches!(self, PumpError::Protocol(ProtocolError::Timeout))
    }
}

/// Read deadlines surface as protocol timeouts, everything else as I/O failure
impl From<io::Error> for PumpError {
    fn from(error: io::Error) -> Self {
        match error.kind() {
            io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => {
                PumpError::Protocol(ProtocolError::Timeout)
            }
            _ => PumpError::Io(error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_mapping() {
        let error = PumpError::from(io::Error::new(io::ErrorKind::TimedOut, "slow"));
        assert!(error.is_timeout());

        let error = PumpError::from(io::Error::new(io::ErrorKind::BrokenPipe, "gone"));
        assert!(matches!(error, PumpError::Io(_)));
        assert!(!error.is_timeout());
    }

    #[test]
    fn test_alarm_accessor() {
        let error = PumpError::from(ProtocolError::Alarm(Alarm::Stalled));
        assert_eq!(error.alarm(), Some(Alarm::Stalled));
        assert_eq!(PumpError::from(ProtocolError::Timeout).alarm(), None);
    }

    #[test]
    fn test_display() {
        let error = PumpError::InvalidState {
            operation: "run",
            state: SessionState::Running,
        };
        assert_eq!(error.to_string(), "Cannot run while running");
        let error = PumpError::DeviceRejected(DeviceError::OutOfRange);
        assert_eq!(error.to_string(), "Pump rejected command: parameter out of range");
    }
}
