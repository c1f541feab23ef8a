//! # Volume Module
//!
//! Fuel volumes in integer millilitres.
//!
//! Meter heads show litres with two or three decimals (`001050.25`). Parsing
//! the displayed text straight into millilitres keeps every delta exact, the
//! same way [`Money`](crate::money::Money) keeps amounts exact in paise.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, AddAssign, Sub};
use ts_rs::TS;

use crate::error::ValidationError;

/// Millilitres in one litre.
pub const ML_PER_LITRE: i64 = 1_000;

/// Fractional digits carried by a litre value.
const LITRE_DECIMALS: u32 = 3;

/// A fuel volume in millilitres.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Volume(i64);

impl Volume {
    /// Creates a volume from millilitres.
    #[inline]
    pub const fn from_ml(ml: i64) -> Self {
        Volume(ml)
    }

    /// Creates a volume from whole litres.
    #[inline]
    pub const fn from_litres(litres: i64) -> Self {
        Volume(litres * ML_PER_LITRE)
    }

    /// Parses a litre reading such as `"1050.00"`, `"001050.250"` or `"1,050.5"`.
    ///
    /// ## Example
    /// ```rust
    /// use fuelrecon_core::volume::Volume;
    ///
    /// assert_eq!(Volume::parse_litres("1050.25").unwrap().ml(), 1_050_250);
    /// assert!(Volume::parse_litres("10.0001").is_err());
    /// ```
    pub fn parse_litres(text: &str) -> Result<Self, ValidationError> {
        parse_scaled(text, LITRE_DECIMALS, "cumulative_volume").map(Volume)
    }

    /// Returns the value in millilitres.
    #[inline]
    pub const fn ml(&self) -> i64 {
        self.0
    }

    /// Zero volume.
    #[inline]
    pub const fn zero() -> Self {
        Volume(0)
    }

    /// Checks if the volume is negative.
    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }
}

impl fmt::Display for Volume {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.abs();
        write!(
            f,
            "{}{}.{:03} L",
            sign,
            abs / ML_PER_LITRE,
            abs % ML_PER_LITRE
        )
    }
}

impl Default for Volume {
    fn default() -> Self {
        Volume::zero()
    }
}

impl Add for Volume {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Volume(self.0 + other.0)
    }
}

impl AddAssign for Volume {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.0 += other.0;
    }
}

impl Sub for Volume {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Volume(self.0 - other.0)
    }
}

/// Parses a decimal string into an integer scaled by `10^decimals`.
///
/// Shared by [`Volume::parse_litres`] and [`Money::parse`](crate::money::Money::parse).
pub(crate) fn parse_scaled(text: &str, decimals: u32, field: &str) -> Result<i64, ValidationError> {
    let cleaned: String = text.trim().chars().filter(|c| *c != ',').collect();

    if cleaned.is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    let invalid = |reason: &str| ValidationError::InvalidFormat {
        field: field.to_string(),
        reason: reason.to_string(),
    };

    let (negative, digits) = match cleaned.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, cleaned.as_str()),
    };

    let (whole, frac) = match digits.split_once('.') {
        Some((w, f)) => (w, f),
        None => (digits, ""),
    };

    if whole.is_empty() && frac.is_empty() {
        return Err(invalid("no digits"));
    }
    if !whole.chars().all(|c| c.is_ascii_digit()) || !frac.chars().all(|c| c.is_ascii_digit()) {
        return Err(invalid("must be a decimal number"));
    }
    if frac.len() > decimals as usize {
        return Err(invalid(&format!("at most {} decimal places", decimals)));
    }

    let scale = 10_i64.pow(decimals);
    let whole_value: i64 = if whole.is_empty() {
        0
    } else {
        whole.parse().map_err(|_| invalid("value too large"))?
    };
    let frac_value: i64 = if frac.is_empty() {
        0
    } else {
        let padded = format!("{:0<width$}", frac, width = decimals as usize);
        padded.parse().map_err(|_| invalid("must be a decimal number"))?
    };

    let value = whole_value
        .checked_mul(scale)
        .and_then(|v| v.checked_add(frac_value))
        .ok_or_else(|| invalid("value too large"))?;

    Ok(if negative { -value } else { value })
}
