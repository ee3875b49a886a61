//! Fixed-point command parameters
//!
//! The pump accepts at most 4 digits plus one decimal point, with at most
//! 3 digits right of the point. Values that need more precision are
//! rejected rather than truncated.

use std::fmt;

use super::EncodingError;

/// Maximum number of significant digits in a parameter
pub const MAX_DIGITS: u32 = 4;

/// Maximum number of digits after the decimal point
pub const MAX_DECIMALS: u32 = 3;

/// Smallest non-zero value a parameter can carry
pub const MIN_VALUE: f64 = 0.001;

/// Largest value a parameter can carry
pub const MAX_VALUE: f64 = 9999.0;

/// Relative slack absorbing binary rounding noise (e.g. 0.1 * 60)
const TOLERANCE: f64 = 1e-9;

/// A non-negative decimal with at most 4 significant digits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decimal {
    mantissa: u16,
    scale: u8,
}

impl Decimal {
    /// Represent `value` exactly, choosing the fewest decimals that fit
    pub fn from_f64(value: f64) -> Result<Self, EncodingError> {
        if !value.is_finite() {
            return Err(EncodingError::NotFinite);
        }
        if value == 0.0 {
            return Ok(Self {
                mantissa: 0,
                scale: 0,
            });
        }
        if value < MIN_VALUE * (1.0 - TOLERANCE) || value > MAX_VALUE * (1.0 + TOLERANCE) {
            return Err(EncodingError::OutOfRange {
                quantity: "parameter",
                value,
                min: MIN_VALUE,
                max: MAX_VALUE,
            });
        }

        let limit = 10u32.pow(MAX_DIGITS) as f64;
        for scale in 0..=MAX_DECIMALS {
            let scaled = value * 10f64.powi(scale as i32);
            let rounded = scaled.round();
            if rounded >= limit {
                break;
            }
            if (scaled - rounded).abs() <= TOLERANCE * rounded.max(1.0) {
                return Ok(Self {
                    mantissa: rounded as u16,
                    scale: scale as u8,
                });
            }
        }
        Err(EncodingError::Precision { value })
    }

    /// Numeric value
    pub fn value(self) -> f64 {
        self.mantissa as f64 / 10f64.powi(self.scale as i32)
    }
}

impl fmt::Display for Decimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.scale == 0 {
            return write!(f, "{}", self.mantissa);
        }
        let divisor = 10u16.pow(self.scale as u32);
        write!(
            f,
            "{}.{:0width$}",
            self.mantissa / divisor,
            self.mantissa % divisor,
            width = self.scale as usize
        )
    }
}
