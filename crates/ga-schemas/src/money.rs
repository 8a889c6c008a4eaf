//! Fixed-point money type.
//!
//! All billed, contracted and approved amounts are `i64` micros
//! (1 unit = 1_000_000 micros). Wrapping the raw integer prevents money from
//! being mixed with quantities or sequence numbers without an explicit call.
//!
//! Decimal strings are the only wire representation: amounts are parsed with
//! [`Micros::parse_decimal`] at the ingestion boundary and rendered with
//! [`Micros::to_decimal_string`] when serialized. No `f64` ever touches money.

use std::ops::{Add, AddAssign, Neg, Sub};

use serde::{Deserialize, Serialize};

/// Scale factor: 1 currency unit = 1_000_000 micros (6 decimal places).
pub const MICROS_PER_UNIT: i64 = 1_000_000;

/// A fixed-point monetary amount at 1e-6 scale.
///
/// There is intentionally no `From<i64>`: callers must say [`Micros::new`]
/// (raw micros) or [`Micros::from_units`] (whole currency units).
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Micros(i64);

impl Micros {
    pub const ZERO: Micros = Micros(0);

    #[inline]
    pub const fn new(raw: i64) -> Self {
        Micros(raw)
    }

    /// Whole currency units, e.g. `Micros::from_units(100)` is `100.00`.
    #[inline]
    pub const fn from_units(units: i64) -> Self {
        Micros(units * MICROS_PER_UNIT)
    }

    #[inline]
    pub const fn raw(self) -> i64 {
        self.0
    }

    /// Absolute value. `i64::MIN` saturates to `i64::MAX`.
    #[inline]
    pub fn abs(self) -> Micros {
        Micros(self.0.saturating_abs())
    }

    #[inline]
    pub fn is_negative(self) -> bool {
        self.0 < 0
    }

    #[inline]
    pub fn is_zero(self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub fn checked_add(self, rhs: Micros) -> Option<Micros> {
        self.0.checked_add(rhs.0).map(Micros)
    }

    #[inline]
    pub fn checked_sub(self, rhs: Micros) -> Option<Micros> {
        self.0.checked_sub(rhs.0).map(Micros)
    }

    /// Multiply a per-unit amount by an integer quantity.
    ///
    /// Returns `None` on overflow; there is no implicit clamp.
    #[inline]
    pub fn checked_mul_qty(self, qty: i64) -> Option<Micros> {
        self.0.checked_mul(qty).map(Micros)
    }

    /// Parse a decimal string such as `"150"`, `"150.5"` or `"-0.000001"`.
    ///
    /// At most 6 fractional digits are accepted; anything finer is an error
    /// rather than a silent rounding.
    pub fn parse_decimal(raw: &str) -> Result<Micros, MoneyParseError> {
        let s = raw.trim();
        if s.is_empty() {
            return Err(MoneyParseError::Empty);
        }

        let (negative, body) = match s.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, s),
        };

        let (int_part, frac_part) = match body.split_once('.') {
            Some((i, f)) => (i, f),
            None => (body, ""),
        };

        if int_part.is_empty() && frac_part.is_empty() {
            return Err(MoneyParseError::Malformed(raw.to_string()));
        }
        if !int_part.chars().all(|c| c.is_ascii_digit())
            || !frac_part.chars().all(|c| c.is_ascii_digit())
        {
            return Err(MoneyParseError::Malformed(raw.to_string()));
        }
        if frac_part.len() > 6 {
            return Err(MoneyParseError::TooPrecise(raw.to_string()));
        }

        let units: i64 = if int_part.is_empty() {
            0
        } else {
            int_part
                .parse()
                .map_err(|_| MoneyParseError::OutOfRange(raw.to_string()))?
        };

        let mut frac: i64 = 0;
        if !frac_part.is_empty() {
            let padded = format!("{frac_part:0<6}");
            frac = padded
                .parse()
                .map_err(|_| MoneyParseError::Malformed(raw.to_string()))?;
        }

        let magnitude = units
            .checked_mul(MICROS_PER_UNIT)
            .and_then(|m| m.checked_add(frac))
            .ok_or_else(|| MoneyParseError::OutOfRange(raw.to_string()))?;

        Ok(Micros(if negative { -magnitude } else { magnitude }))
    }

    /// Render as a decimal string with at least two fractional digits:
    /// `100.00`, `105.10`, `0.000001`.
    pub fn to_decimal_string(self) -> String {
        let sign = if self.0 < 0 { "-" } else { "" };
        let magnitude = self.0.unsigned_abs();
        let units = magnitude / MICROS_PER_UNIT as u64;
        let frac = magnitude % MICROS_PER_UNIT as u64;

        let mut frac_str = format!("{frac:06}");
        while frac_str.len() > 2 && frac_str.ends_with('0') {
            frac_str.pop();
        }
        format!("{sign}{units}.{frac_str}")
    }
}

impl Add for Micros {
    type Output = Micros;
    #[inline]
    fn add(self, rhs: Micros) -> Micros {
        Micros(self.0 + rhs.0)
    }
}

impl Sub for Micros {
    type Output = Micros;
    #[inline]
    fn sub(self, rhs: Micros) -> Micros {
        Micros(self.0 - rhs.0)
    }
}

impl Neg for Micros {
    type Output = Micros;
    #[inline]
    fn neg(self) -> Micros {
        Micros(-self.0)
    }
}

impl AddAssign for Micros {
    #[inline]
    fn add_assign(&mut self, rhs: Micros) {
        self.0 += rhs.0;
    }
}

impl std::fmt::Display for Micros {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_decimal_string())
    }
}

impl TryFrom<String> for Micros {
    type Error = MoneyParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Micros::parse_decimal(&value)
    }
}

impl From<Micros> for String {
    fn from(value: Micros) -> Self {
        value.to_decimal_string()
    }
}

/// Errors returned by [`Micros::parse_decimal`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MoneyParseError {
    Empty,
    Malformed(String),
    /// More than 6 fractional digits.
    TooPrecise(String),
    OutOfRange(String),
}

impl std::fmt::Display for MoneyParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MoneyParseError::Empty => write!(f, "empty monetary amount"),
            MoneyParseError::Malformed(s) => write!(f, "malformed monetary amount '{s}'"),
            MoneyParseError::TooPrecise(s) => {
                write!(f, "monetary amount '{s}' has more than 6 decimal places")
            }
            MoneyParseError::OutOfRange(s) => write!(f, "monetary amount '{s}' is out of range"),
        }
    }
}

impl std::error::Error for MoneyParseError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_whole_and_fractional_amounts() {
        assert_eq!(Micros::parse_decimal("150").unwrap(), Micros::from_units(150));
        assert_eq!(Micros::parse_decimal("150.00").unwrap(), Micros::from_units(150));
        assert_eq!(Micros::parse_decimal("105.1").unwrap(), Micros::new(105_100_000));
        assert_eq!(Micros::parse_decimal(".5").unwrap(), Micros::new(500_000));
        assert_eq!(Micros::parse_decimal("-2.75").unwrap(), Micros::new(-2_750_000));
    }

    #[test]
    fn rejects_garbage_and_excess_precision() {
        assert_eq!(Micros::parse_decimal("  "), Err(MoneyParseError::Empty));
        assert!(matches!(
            Micros::parse_decimal("12a.00"),
            Err(MoneyParseError::Malformed(_))
        ));
        assert!(matches!(
            Micros::parse_decimal("."),
            Err(MoneyParseError::Malformed(_))
        ));
        assert!(matches!(
            Micros::parse_decimal("1.0000001"),
            Err(MoneyParseError::TooPrecise(_))
        ));
        assert!(matches!(
            Micros::parse_decimal("99999999999999999999"),
            Err(MoneyParseError::OutOfRange(_))
        ));
    }

    #[test]
    fn renders_with_at_least_two_decimals() {
        assert_eq!(Micros::from_units(100).to_decimal_string(), "100.00");
        assert_eq!(Micros::new(105_100_000).to_decimal_string(), "105.10");
        assert_eq!(Micros::new(1).to_decimal_string(), "0.000001");
        assert_eq!(Micros::new(-500_000).to_decimal_string(), "-0.50");
    }

    #[test]
    fn serde_uses_decimal_strings() {
        let json = serde_json::to_string(&Micros::new(150_250_000)).unwrap();
        assert_eq!(json, "\"150.25\"");
        let back: Micros = serde_json::from_str("\"150.25\"").unwrap();
        assert_eq!(back, Micros::new(150_250_000));
        assert!(serde_json::from_str::<Micros>("\"abc\"").is_err());
    }

    #[test]
    fn checked_mul_qty_detects_overflow() {
        assert_eq!(
            Micros::from_units(100).checked_mul_qty(3),
            Some(Micros::from_units(300))
        );
        assert_eq!(Micros::new(i64::MAX).checked_mul_qty(2), None);
    }
}
