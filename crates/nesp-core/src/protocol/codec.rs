//! Basic-mode frame codec
//!
//! Command frame: `<address 2 digits><mnemonic><parameter>` CR
//!
//! Reply frame: STX `<address 2 digits><status char><payload>` ETX
//!
//! Decoding is pure: it never touches the transport.

use super::{Command, EncodingError, ProtocolError, COMMAND_TERMINATOR, REPLY_START, REPLY_TERMINATOR};
use crate::pump::{Alarm, FirmwareVersion, Identity, PumpAddress, PumpStatus, PumpingDirection};
use crate::units::{RateUnit, VolumeUnit};

/// Marks an alarm status; followed by `?` and the alarm code
const STATUS_ALARM: u8 = b'A';

/// Prefix of an error payload
const ERROR_MARKER: u8 = b'?';

/// Refusal reported by the pump in place of a payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceError {
    /// Command not recognized (`?`)
    Unrecognized,
    /// Command not applicable in the current state (`?NA`)
    NotApplicable,
    /// Parameter out of the pump's own range (`?OOR`)
    OutOfRange,
}

impl std::fmt::Display for DeviceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeviceError::Unrecognized => write!(f, "command not recognized"),
            DeviceError::NotApplicable => write!(f, "command not applicable now"),
            DeviceError::OutOfRange => write!(f, "parameter out of range"),
        }
    }
}

/// Body of a decoded reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Accepted, with the (possibly empty) payload
    Data(String),
    /// Accepted but ignored by the pump (`?IGN`)
    Ignored,
    /// Refused by the pump
    Rejected(DeviceError),
}

/// A reply frame split into its parts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedResponse {
    pub address: u8,
    pub status: PumpStatus,
    pub reply: Reply,
}

impl DecodedResponse {
    /// Surface an alarm status as [`ProtocolError::Alarm`]
    pub fn check_alarm(self) -> Result<Self, ProtocolError> {
        match self.status {
            PumpStatus::Alarm(alarm) => Err(ProtocolError::Alarm(alarm)),
            _ => Ok(self),
        }
    }
}

/// Frame body without terminator, shared by basic and safe mode
pub fn frame_body(address: PumpAddress, command: &Command) -> Result<Vec<u8>, EncodingError> {
    let mut body = format!("{}{}", address, command.mnemonic());
    if let Some(parameter) = command.parameter()? {
        body.push_str(&parameter);
    }
    Ok(body.into_bytes())
}

/// Encode a basic-mode command frame
///
/// Parameters are validated here, so an unrepresentable value never
/// reaches the transport.
pub fn encode(address: PumpAddress, command: &Command) -> Result<Vec<u8>, EncodingError> {
    let mut frame = frame_body(address, command)?;
    frame.push(COMMAND_TERMINATOR);
    Ok(frame)
}

/// Decode a basic-mode reply frame, failing on an alarm
pub fn decode(frame: &[u8]) -> Result<DecodedResponse, ProtocolError> {
    decode_frame(frame)?.check_alarm()
}

/// Decode a basic-mode reply frame, keeping an alarm as its status
///
/// Lets the caller check the reply address before acting on the alarm.
pub fn decode_frame(frame: &[u8]) -> Result<DecodedResponse, ProtocolError> {
    let body = match frame.split_last() {
        Some((&REPLY_TERMINATOR, body)) => body,
        _ => return Err(ProtocolError::malformed("missing terminator")),
    };
    let body = body.strip_prefix(&[REPLY_START]).unwrap_or(body);
    decode_body(body)
}

/// Decode the address, status and payload of a reply
///
/// An alarm is returned as [`PumpStatus::Alarm`] with an empty payload.
pub fn decode_body(body: &[u8]) -> Result<DecodedResponse, ProtocolError> {
    if body.len() < 3 {
        return Err(ProtocolError::malformed(format!(
            "reply too short ({} bytes)",
            body.len()
        )));
    }
    if body.contains(&REPLY_TERMINATOR) || body.contains(&REPLY_START) {
        return Err(ProtocolError::malformed("embedded delimiter"));
    }

    let address = parse_address(&body[..2])?;
    let status_byte = body[2];
    let rest = &body[3..];

    if status_byte == STATUS_ALARM {
        let alarm = match rest {
            [ERROR_MARKER, code] => Alarm::from_code(*code),
            _ => None,
        }
        .ok_or_else(|| {
            ProtocolError::malformed(format!(
                "bad alarm payload {:?}",
                String::from_utf8_lossy(rest)
            ))
        })?;
        return Ok(DecodedResponse {
            address,
            status: PumpStatus::Alarm(alarm),
            reply: Reply::Data(String::new()),
        });
    }

    let status = PumpStatus::from_byte(status_byte).ok_or_else(|| {
        ProtocolError::malformed(format!("unknown status byte {:#04x}", status_byte))
    })?;
    let payload = std::str::from_utf8(rest)
        .map_err(|_| ProtocolError::malformed("payload is not ASCII"))?;

    let reply = match payload.strip_prefix(ERROR_MARKER as char) {
        None => Reply::Data(payload.to_string()),
        Some("") => Reply::Rejected(DeviceError::Unrecognized),
        Some("NA") => Reply::Rejected(DeviceError::NotApplicable),
        Some("OOR") => Reply::Rejected(DeviceError::OutOfRange),
        Some("IGN") => Reply::Ignored,
        Some("COM") => return Err(ProtocolError::Communication),
        Some(other) => {
            return Err(ProtocolError::malformed(format!("unknown error code ?{}", other)))
        }
    };

    Ok(DecodedResponse {
        address,
        status,
        reply,
    })
}

fn parse_address(digits: &[u8]) -> Result<u8, ProtocolError> {
    match digits {
        [tens @ b'0'..=b'9', ones @ b'0'..=b'9'] => Ok((tens - b'0') * 10 + (ones - b'0')),
        _ => Err(ProtocolError::malformed(format!(
            "bad address {:?}",
            String::from_utf8_lossy(digits)
        ))),
    }
}

/// Parse an unsigned decimal number such as `30.00` or `1200`
pub fn parse_number(text: &str) -> Result<f64, ProtocolError> {
    let valid = !text.is_empty()
        && text.bytes().filter(|b| *b == b'.').count() <= 1
        && text.bytes().all(|b| b.is_ascii_digit() || b == b'.')
        && text.bytes().any(|b| b.is_ascii_digit());
    if !valid {
        return Err(ProtocolError::malformed(format!("bad number {:?}", text)));
    }
    text.parse::<f64>()
        .map_err(|_| ProtocolError::malformed(format!("bad number {:?}", text)))
}

/// Split `<number><unit symbol>` as echoed by `VOL`, `RAT` and `DIS`
fn split_unit(text: &str) -> Result<(f64, &str), ProtocolError> {
    let split = text
        .find(|c: char| c.is_ascii_uppercase())
        .ok_or_else(|| ProtocolError::malformed(format!("missing unit in {:?}", text)))?;
    let (number, unit) = text.split_at(split);
    if !unit.bytes().all(|b| b.is_ascii_uppercase()) {
        return Err(ProtocolError::malformed(format!("bad unit {:?}", unit)));
    }
    Ok((parse_number(number)?, unit))
}

/// Parse a `VER` payload: `NE<model>V<major>.<minor>`
pub fn parse_identity(payload: &str) -> Result<Identity, ProtocolError> {
    let bad = || ProtocolError::malformed(format!("bad version {:?}", payload));
    let rest = payload.strip_prefix("NE").ok_or_else(bad)?;
    let (model, firmware) = rest.split_once('V').ok_or_else(bad)?;
    let (major, minor) = firmware.split_once('.').ok_or_else(bad)?;
    let is_digits = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());
    if !is_digits(model) || !is_digits(major) || !is_digits(minor) {
        return Err(bad());
    }
    Ok(Identity {
        model: model.to_string(),
        firmware: FirmwareVersion {
            major: major.parse().map_err(|_| bad())?,
            minor: minor.parse().map_err(|_| bad())?,
        },
    })
}

/// Parse a `DIR` payload
pub fn parse_direction(payload: &str) -> Result<PumpingDirection, ProtocolError> {
    PumpingDirection::from_keyword(payload)
        .ok_or_else(|| ProtocolError::malformed(format!("bad direction {:?}", payload)))
}

/// Parse a `VOL` payload into milliliters
pub fn parse_volume(payload: &str) -> Result<f64, ProtocolError> {
    let (value, symbol) = split_unit(payload)?;
    let unit = VolumeUnit::from_symbol(symbol)
        .ok_or_else(|| ProtocolError::malformed(format!("bad volume unit {:?}", symbol)))?;
    Ok(unit.to_milliliters(value))
}

/// Parse a `RAT` payload into mL/min
pub fn parse_rate(payload: &str) -> Result<f64, ProtocolError> {
    let (value, symbol) = split_unit(payload)?;
    let unit = RateUnit::from_symbol(symbol)
        .ok_or_else(|| ProtocolError::malformed(format!("bad rate unit {:?}", symbol)))?;
    Ok(unit.to_milliliters_per_minute(value))
}

/// Volumes moved since the counters were last cleared, in milliliters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Dispensed {
    pub infused_ml: f64,
    pub withdrawn_ml: f64,
}

/// Parse a `DIS` payload: `I<infused>W<withdrawn><unit>`
pub fn parse_dispensed(payload: &str) -> Result<Dispensed, ProtocolError> {
    let bad = || ProtocolError::malformed(format!("bad dispensed volume {:?}", payload));
    let rest = payload.strip_prefix('I').ok_or_else(bad)?;
    let (infused, rest) = rest.split_once('W').ok_or_else(bad)?;
    let (withdrawn, symbol) = split_unit(rest)?;
    let unit = VolumeUnit::from_symbol(symbol).ok_or_else(bad)?;
    Ok(Dispensed {
        infused_ml: unit.to_milliliters(parse_number(infused)?),
        withdrawn_ml: unit.to_milliliters(withdrawn),
    })
}
