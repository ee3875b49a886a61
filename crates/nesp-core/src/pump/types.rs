//! Pump data model
//!
//! Plain value types shared by the wire codec and the session.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::protocol::EncodingError;

/// Highest address a pump can be given on a shared bus
pub const MAX_ADDRESS: u8 = 99;

/// Address of a pump on the serial bus (0-99)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct PumpAddress(u8);

impl PumpAddress {
    /// Create an address, rejecting values above [`MAX_ADDRESS`]
    pub fn new(address: u8) -> Result<Self, EncodingError> {
        if address > MAX_ADDRESS {
            return Err(EncodingError::OutOfRange {
                quantity: "address",
                value: address as f64,
                min: 0.0,
                max: MAX_ADDRESS as f64,
            });
        }
        Ok(Self(address))
    }

    /// Numeric value of the address
    pub fn value(self) -> u8 {
        self.0
    }
}

impl TryFrom<u8> for PumpAddress {
    type Error = EncodingError;

    fn try_from(address: u8) -> Result<Self, Self::Error> {
        Self::new(address)
    }
}

impl From<PumpAddress> for u8 {
    fn from(address: PumpAddress) -> Self {
        address.0
    }
}

impl fmt::Display for PumpAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}", self.0)
    }
}

/// Pumping direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PumpingDirection {
    /// Dispense fluid
    Infuse,
    /// Draw fluid
    Withdraw,
}

impl PumpingDirection {
    /// Wire keyword used by `DIR` and `CLD`
    pub fn keyword(self) -> &'static str {
        match self {
            PumpingDirection::Infuse => "INF",
            PumpingDirection::Withdraw => "WDR",
        }
    }

    /// Parse a wire keyword
    pub fn from_keyword(keyword: &str) -> Option<Self> {
        match keyword {
            "INF" => Some(PumpingDirection::Infuse),
            "WDR" => Some(PumpingDirection::Withdraw),
            _ => None,
        }
    }
}

/// Alarm reported by the pump
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Alarm {
    /// Pump was reset (power was interrupted)
    Reset,
    /// Pump motor stalled
    Stalled,
    /// Safe mode communication timeout
    Timeout,
    /// Pumping program error
    ProgramError,
    /// Pumping program phase out of range
    PhaseOutOfRange,
}

impl Alarm {
    /// Alarm code character following `A?` in a reply
    pub fn code(self) -> u8 {
        match self {
            Alarm::Reset => b'R',
            Alarm::Stalled => b'S',
            Alarm::Timeout => b'T',
            Alarm::ProgramError => b'E',
            Alarm::PhaseOutOfRange => b'O',
        }
    }

    /// Look up an alarm by its code character
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            b'R' => Some(Alarm::Reset),
            b'S' => Some(Alarm::Stalled),
            b'T' => Some(Alarm::Timeout),
            b'E' => Some(Alarm::ProgramError),
            b'O' => Some(Alarm::PhaseOutOfRange),
            _ => None,
        }
    }
}

impl fmt::Display for Alarm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Alarm::Reset => "pump was reset",
            Alarm::Stalled => "motor stalled",
            Alarm::Timeout => "safe mode communication timeout",
            Alarm::ProgramError => "pumping program error",
            Alarm::PhaseOutOfRange => "pumping program phase out of range",
        };
        write!(f, "{} ({})", text, self.code() as char)
    }
}

/// Device status derived from the status character of a reply
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PumpStatus {
    /// Infusing
    Infusing,
    /// Withdrawing
    Withdrawing,
    /// Purging at maximum rate
    Purging,
    /// Stopped / idle
    Stopped,
    /// Paused
    Paused,
    /// Pumping program in a pause phase
    Sleeping,
    /// Pumping program waiting for user input
    Waiting,
    /// Halted by an alarm
    Alarm(Alarm),
}

impl PumpStatus {
    /// Map a (non-alarm) status character
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            b'I' => Some(PumpStatus::Infusing),
            b'W' => Some(PumpStatus::Withdrawing),
            b'X' => Some(PumpStatus::Purging),
            b'S' => Some(PumpStatus::Stopped),
            b'P' => Some(PumpStatus::Paused),
            b'T' => Some(PumpStatus::Sleeping),
            b'U' => Some(PumpStatus::Waiting),
            _ => None,
        }
    }

    /// Whether the plunger is moving
    pub fn is_running(self) -> bool {
        matches!(
            self,
            PumpStatus::Infusing | PumpStatus::Withdrawing | PumpStatus::Purging
        )
    }
}

/// Firmware version reported by `VER`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FirmwareVersion {
    pub major: u16,
    pub minor: u16,
}

impl fmt::Display for FirmwareVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// Model number and firmware of a pump, immutable for a session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Model number, e.g. "1000" for an NE-1000
    pub model: String,
    pub firmware: FirmwareVersion,
}

/// Last configuration acknowledged by the device
///
/// A field is `None` until its setter (or getter) has round-tripped.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PumpConfiguration {
    /// Syringe inside diameter in millimeters
    pub diameter_mm: Option<f64>,
    pub direction: Option<PumpingDirection>,
    /// Volume to pump in milliliters
    pub volume_ml: Option<f64>,
    /// Rate in milliliters per minute
    pub rate_ml_per_min: Option<f64>,
}

/// Session state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    /// Not running
    Idle,
    /// Device acknowledged a start command
    Running,
    /// Device reported an alarm; needs `stop()` before further commands
    Error,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Idle => write!(f, "idle"),
            SessionState::Running => write!(f, "running"),
            SessionState::Error => write!(f, "error"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_bounds() {
        assert_eq!(PumpAddress::new(0).unwrap().value(), 0);
        assert_eq!(PumpAddress::new(99).unwrap().value(), 99);
        assert!(PumpAddress::new(100).is_err());
    }

    #[test]
    fn test_address_display_is_two_digits() {
        assert_eq!(PumpAddress::new(7).unwrap().to_string(), "07");
        assert_eq!(PumpAddress::new(42).unwrap().to_string(), "42");
    }

    #[test]
    fn test_alarm_codes() {
        for alarm in [
            Alarm::Reset,
            Alarm::Stalled,
            Alarm::Timeout,
            Alarm::ProgramError,
            Alarm::PhaseOutOfRange,
        ] {
            assert_eq!(Alarm::from_code(alarm.code()), Some(alarm));
        }
        assert_eq!(Alarm::from_code(b'Z'), None);
    }

    #[test]
    fn test_status_running() {
        assert!(PumpStatus::Infusing.is_running());
        assert!(PumpStatus::Withdrawing.is_running());
        assert!(PumpStatus::Purging.is_running());
        assert!(!PumpStatus::Stopped.is_running());
        assert!(!PumpStatus::Paused.is_running());
        assert!(!PumpStatus::Alarm(Alarm::Stalled).is_running());
    }

    #[test]
    fn test_status_bytes() {
        assert_eq!(PumpStatus::from_byte(b'I'), Some(PumpStatus::Infusing));
        assert_eq!(PumpStatus::from_byte(b'S'), Some(PumpStatus::Stopped));
        assert_eq!(PumpStatus::from_byte(b'A'), None);
        assert_eq!(PumpStatus::from_byte(b'q'), None);
    }

    #[test]
    fn test_direction_keywords() {
        assert_eq!(PumpingDirection::Infuse.keyword(), "INF");
        assert_eq!(
            PumpingDirection::from_keyword("WDR"),
            Some(PumpingDirection::Withdraw)
        );
        assert_eq!(PumpingDirection::from_keyword("REV"), None);
    }
}
