//! Volume and rate units
//!
//! The pump expresses volumes in mL or µL and rates in mL or µL per
//! minute or hour. The public API works in milliliters and mL/min; these
//! helpers pick the wire unit that can carry a value within the 4-digit
//! parameter width.

use serde::{Deserialize, Serialize};

use crate::protocol::{Decimal, EncodingError};

/// Volume unit understood by `VOL`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VolumeUnit {
    Milliliters,
    Microliters,
}

impl VolumeUnit {
    const ALL: [VolumeUnit; 2] = [VolumeUnit::Milliliters, VolumeUnit::Microliters];

    /// Wire symbol
    pub fn symbol(self) -> &'static str {
        match self {
            VolumeUnit::Milliliters => "ML",
            VolumeUnit::Microliters => "UL",
        }
    }

    pub fn from_symbol(symbol: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|unit| unit.symbol() == symbol)
    }

    /// Number of this unit in one milliliter
    pub fn per_milliliter(self) -> f64 {
        match self {
            VolumeUnit::Milliliters => 1.0,
            VolumeUnit::Microliters => 1_000.0,
        }
    }

    /// Convert a value in this unit to milliliters
    pub fn to_milliliters(self, value: f64) -> f64 {
        value / self.per_milliliter()
    }

    fn preferred(milliliters: f64) -> Self {
        if milliliters >= 10.0 {
            VolumeUnit::Milliliters
        } else {
            VolumeUnit::Microliters
        }
    }
}

/// Rate unit understood by `RAT`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RateUnit {
    /// mL/min
    MillilitersPerMinute,
    /// mL/h
    MillilitersPerHour,
    /// µL/min
    MicrolitersPerMinute,
    /// µL/h
    MicrolitersPerHour,
}

impl RateUnit {
    const ALL: [RateUnit; 4] = [
        RateUnit::MillilitersPerMinute,
        RateUnit::MillilitersPerHour,
        RateUnit::MicrolitersPerMinute,
        RateUnit::MicrolitersPerHour,
    ];

    /// Wire symbol
    pub fn symbol(self) -> &'static str {
        match self {
            RateUnit::MillilitersPerMinute => "MM",
            RateUnit::MillilitersPerHour => "MH",
            RateUnit::MicrolitersPerMinute => "UM",
            RateUnit::MicrolitersPerHour => "UH",
        }
    }

    pub fn from_symbol(symbol: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|unit| unit.symbol() == symbol)
    }

    /// Number of this unit in one mL/min
    pub fn per_milliliter_per_minute(self) -> f64 {
        match self {
            RateUnit::MillilitersPerMinute => 1.0,
            RateUnit::MillilitersPerHour => 60.0,
            RateUnit::MicrolitersPerMinute => 1_000.0,
            RateUnit::MicrolitersPerHour => 60_000.0,
        }
    }

    /// Convert a value in this unit to mL/min
    pub fn to_milliliters_per_minute(self, value: f64) -> f64 {
        value / self.per_milliliter_per_minute()
    }

    fn preferred(ml_per_min: f64) -> Self {
        if ml_per_min >= 10_000.0 / 60.0 {
            RateUnit::MillilitersPerMinute
        } else if ml_per_min >= 10.0 {
            RateUnit::MillilitersPerHour
        } else if ml_per_min >= 10_000.0 / 60_000.0 {
            RateUnit::MicrolitersPerMinute
        } else {
            RateUnit::MicrolitersPerHour
        }
    }
}

/// Express a volume in milliliters as a wire value and unit
pub fn volume_setting(milliliters: f64) -> Result<(Decimal, VolumeUnit), EncodingError> {
    let preferred = VolumeUnit::preferred(milliliters);
    let candidates = std::iter::once(preferred)
        .chain(VolumeUnit::ALL.into_iter().filter(|unit| *unit != preferred));
    select(
        "volume",
        milliliters,
        candidates.map(|unit| (unit, unit.per_milliliter())),
    )
}

/// Express a rate in mL/min as a wire value and unit
pub fn rate_setting(ml_per_min: f64) -> Result<(Decimal, RateUnit), EncodingError> {
    let preferred = RateUnit::preferred(ml_per_min);
    let candidates = std::iter::once(preferred)
        .chain(RateUnit::ALL.into_iter().filter(|unit| *unit != preferred));
    select(
        "rate",
        ml_per_min,
        candidates.map(|unit| (unit, unit.per_milliliter_per_minute())),
    )
}

fn select<U: Copy>(
    quantity: &'static str,
    value: f64,
    candidates: impl Iterator<Item = (U, f64)>,
) -> Result<(Decimal, U), EncodingError> {
    if !value.is_finite() {
        return Err(EncodingError::NotFinite);
    }
    if value <= 0.0 {
        return Err(EncodingError::OutOfRange {
            quantity,
            value,
            min: 0.0,
            max: f64::INFINITY,
        });
    }

    let mut first_error = None;
    for (unit, factor) in candidates {
        match Decimal::from_f64(value * factor) {
            Ok(decimal) if decimal.value() > 0.0 => return Ok((decimal, unit)),
            Ok(_) => {}
            Err(error) => {
                // Report precision failures over range failures
                match (&first_error, &error) {
                    (None, _)
                    | (Some(EncodingError::OutOfRange { .. }), EncodingError::Precision { .. }) => {
                        first_error = Some(error)
                    }
                    _ => {}
                }
            }
        }
    }

    Err(match first_error {
        Some(EncodingError::OutOfRange { .. }) | None => EncodingError::OutOfRange {
            quantity,
            value,
            min: 0.0,
            max: f64::INFINITY,
        },
        Some(error) => error,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_small_volumes_use_microliters() {
        let (value, unit) = volume_setting(1.0).unwrap();
        assert_eq!(unit, VolumeUnit::Microliters);
        assert_eq!(value.to_string(), "1000");
    }

    #[test]
    fn test_large_volumes_use_milliliters() {
        let (value, unit) = volume_setting(25.5).unwrap();
        assert_eq!(unit, VolumeUnit::Milliliters);
        assert_eq!(value.to_string(), "25.5");
    }

    #[test]
    fn test_volume_falls_back_to_other_unit() {
        // 9.9999 mL does not fit as µL (9999.9) but neither as mL
        assert!(matches!(
            volume_setting(9.9999),
            Err(EncodingError::Precision { .. })
        ));
        // 0.0000001 mL is below the smallest µL value
        assert!(matches!(
            volume_setting(0.000_000_1),
            Err(EncodingError::OutOfRange { .. })
        ));
    }

    #[test]
    fn test_rate_unit_selection() {
        assert_eq!(rate_setting(200.0).unwrap().1, RateUnit::MillilitersPerMinute);
        assert_eq!(rate_setting(20.0).unwrap().1, RateUnit::MillilitersPerHour);
        assert_eq!(rate_setting(1.0).unwrap().1, RateUnit::MicrolitersPerMinute);
        assert_eq!(rate_setting(0.01).unwrap().1, RateUnit::MicrolitersPerHour);
    }

    #[test]
    fn test_rate_values() {
        let (value, _) = rate_setting(20.0).unwrap();
        assert_eq!(value.to_string(), "1200");
        let (value, _) = rate_setting(0.5).unwrap();
        assert_eq!(value.to_string(), "500");
    }

    #[test]
    fn test_rate_prefers_representable_unit() {
        // 20.05 mL/min is 1203 mL/h
        let (value, unit) = rate_setting(20.05).unwrap();
        assert_eq!(unit, RateUnit::MillilitersPerHour);
        assert_eq!(value.to_string(), "1203");
        // 99.99 mL/min is 5999.4 mL/h, too precise; falls back to mL/min
        let (value, unit) = rate_setting(99.99).unwrap();
        assert_eq!(unit, RateUnit::MillilitersPerMinute);
        assert_eq!(value.to_string(), "99.99");
    }

    #[test]
    fn test_rejects_non_positive() {
        assert!(matches!(
            rate_setting(0.0),
            Err(EncodingError::OutOfRange { .. })
        ));
        assert!(matches!(
            volume_setting(-1.0),
            Err(EncodingError::OutOfRange { .. })
        ));
    }

    #[test]
    fn test_symbols() {
        assert_eq!(VolumeUnit::from_symbol("UL"), Some(VolumeUnit::Microliters));
        assert_eq!(RateUnit::from_symbol("UH"), Some(RateUnit::MicrolitersPerHour));
        assert_eq!(RateUnit::from_symbol("XX"), None);
        assert_eq!(RateUnit::MillilitersPerHour.to_milliliters_per_minute(1200.0), 20.0);
        assert_eq!(VolumeUnit::Microliters.to_milliliters(1000.0), 1.0);
    }
}
