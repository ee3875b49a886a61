//! Protocol commands
//!
//! Typed requests understood by New Era pump firmware. Each command maps
//! to a mnemonic and an optional parameter rendered in the pump's
//! fixed-point format.

use super::{Decimal, EncodingError};
use crate::pump::PumpingDirection;
use crate::units::{RateUnit, VolumeUnit};

/// Smallest syringe diameter in millimeters
pub const SYRINGE_DIAMETER_MIN: f64 = 0.1;

/// Largest syringe diameter in millimeters
pub const SYRINGE_DIAMETER_MAX: f64 = 80.0;

/// Protocol commands for pump communication
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Command {
    /// Bare address, answered with the current status
    QueryStatus,
    /// Model and firmware version ('VER')
    QueryVersion,
    QueryDiameter,
    /// Syringe inside diameter in millimeters ('DIA')
    SetDiameter(f64),
    QueryDirection,
    SetDirection(PumpingDirection),
    QueryVolume,
    /// Select the unit later `SetVolume` values are expressed in
    SetVolumeUnit(VolumeUnit),
    /// Volume in the currently selected unit ('VOL')
    SetVolume(f64),
    QueryRate,
    SetRate(f64, RateUnit),
    /// Volume infused and withdrawn ('DIS')
    QueryDispensed,
    /// Reset the infused or withdrawn volume counter ('CLD')
    ClearDispensed(PumpingDirection),
    QuerySafeMode,
    /// Safe mode timeout in seconds, 0 selects basic mode ('SAF')
    SetSafeMode(u8),
    /// Start the pumping program ('RUN')
    Run,
    /// Run at maximum rate until stopped ('PUR')
    Purge,
    /// Stop or pause pumping ('STP')
    Stop,
}

impl Command {
    /// Command mnemonic (empty for a status query)
    pub fn mnemonic(&self) -> &'static str {
        match self {
            Command::QueryStatus => "",
            Command::QueryVersion => "VER",
            Command::QueryDiameter | Command::SetDiameter(_) => "DIA",
            Command::QueryDirection | Command::SetDirection(_) => "DIR",
            Command::QueryVolume | Command::SetVolumeUnit(_) | Command::SetVolume(_) => "VOL",
            Command::QueryRate | Command::SetRate(..) => "RAT",
            Command::QueryDispensed => "DIS",
            Command::ClearDispensed(_) => "CLD",
            Command::QuerySafeMode | Command::SetSafeMode(_) => "SAF",
            Command::Run => "RUN",
            Command::Purge => "PUR",
            Command::Stop => "STP",
        }
    }

    /// Render the parameter, validating it against the wire format
    pub fn parameter(&self) -> Result<Option<String>, EncodingError> {
        let parameter = match *self {
            Command::SetDiameter(diameter) => {
                if !diameter.is_finite() {
                    return Err(EncodingError::NotFinite);
                }
                if !(SYRINGE_DIAMETER_MIN..=SYRINGE_DIAMETER_MAX).contains(&diameter) {
                    return Err(EncodingError::OutOfRange {
                        quantity: "diameter",
                        value: diameter,
                        min: SYRINGE_DIAMETER_MIN,
                        max: SYRINGE_DIAMETER_MAX,
                    });
                }
                Decimal::from_f64(diameter)?.to_string()
            }
            Command::SetDirection(direction) | Command::ClearDispensed(direction) => {
                direction.keyword().to_string()
            }
            Command::SetVolumeUnit(unit) => unit.symbol().to_string(),
            Command::SetVolume(volume) => positive(volume, "volume")?.to_string(),
            Command::SetRate(rate, unit) => {
                format!("{}{}", positive(rate, "rate")?, unit.symbol())
            }
            Command::SetSafeMode(seconds) => seconds.to_string(),
            _ => return Ok(None),
        };
        Ok(Some(parameter))
    }
}

fn positive(value: f64, quantity: &'static str) -> Result<Decimal, EncodingError> {
    let decimal = Decimal::from_f64(value).map_err(|error| match error {
        EncodingError::OutOfRange { value, min, max, .. } => EncodingError::OutOfRange {
            quantity,
            value,
            min,
            max,
        },
        other => other,
    })?;
    if decimal.value() <= 0.0 {
        return Err(EncodingError::OutOfRange {
            quantity,
            value,
            min: super::decimal::MIN_VALUE,
            max: super::decimal::MAX_VALUE,
        });
    }
    Ok(decimal)
}
