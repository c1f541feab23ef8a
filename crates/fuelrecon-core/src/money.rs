//! # Money Module
//!
//! Provides the `Money` type for handling rupee amounts safely.
//!
//! ## Why Integer Paise?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE FLOATING POINT PROBLEM                                             │
//! │                                                                         │
//! │    50.0 L × ₹102.63/L = 5131.499999999999   ❌ rounds the wrong way     │
//! │                                                                         │
//! │  OUR SOLUTION: Integer paise + integer millilitres                      │
//! │    50_000 ml × 10_263 paise/L = 513_150_000 / 1000 = 513_150 paise      │
//! │    Exact. Rounding happens once, explicitly, half-up.                   │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use fuelrecon_core::money::Money;
//! use fuelrecon_core::volume::Volume;
//!
//! let price = Money::from_paise(10_000); // ₹100.00 per litre
//! let total = Money::for_volume(Volume::from_litres(50), price).unwrap();
//! assert_eq!(total.paise(), 500_000); // ₹5000.00
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, AddAssign, Sub, SubAssign};
use ts_rs::TS;

use crate::error::ValidationError;
use crate::volume::{Volume, ML_PER_LITRE};

/// Number of paise in one rupee.
pub const PAISE_PER_RUPEE: i64 = 100;

// =============================================================================
// Money Type
// =============================================================================

/// A monetary value in the smallest currency unit (paise).
///
/// ## Design Decisions
/// - **i64 (signed)**: differences between tendered and expected can be negative
/// - **Single field tuple struct**: Zero-cost abstraction over i64
///
/// ## Where Money is Used
/// ```text
/// PriceRecord.price_per_litre_paise ──► Reading.unit_price_paise (frozen)
///                                               │
///                    delta volume ──────────────┤
///                                               ▼
///                                     Reading.total_paise
///                                               │
///            PaymentBreakdown (cash/upi/card/…) ─┴──► must sum to total
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from paise.
    ///
    /// ## Example
    /// ```rust
    /// use fuelrecon_core::money::Money;
    ///
    /// let price = Money::from_paise(10_263); // ₹102.63
    /// assert_eq!(price.paise(), 10_263);
    /// ```
    #[inline]
    pub const fn from_paise(paise: i64) -> Self {
        Money(paise)
    }

    /// Creates a Money value from rupees and paise.
    ///
    /// For negative amounts only the rupee part carries the sign:
    /// `from_rupees_paise(-5, 50)` is -₹5.50.
    #[inline]
    pub const fn from_rupees_paise(rupees: i64, paise: i64) -> Self {
        if rupees < 0 {
            Money(rupees * PAISE_PER_RUPEE - paise)
        } else {
            Money(rupees * PAISE_PER_RUPEE + paise)
        }
    }

    /// Parses a decimal rupee string such as `"5000.00"` or `"102.6"`.
    ///
    /// ## Rules
    /// - At most two fractional digits (anything finer is not a real amount)
    /// - Thousands separators (`,`) are ignored
    /// - A leading `-` is allowed
    ///
    /// ## Example
    /// ```rust
    /// use fuelrecon_core::money::Money;
    ///
    /// assert_eq!(Money::parse("5,000.50").unwrap().paise(), 500_050);
    /// assert!(Money::parse("1.005").is_err());
    /// ```
    pub fn parse(text: &str) -> Result<Self, ValidationError> {
        let paise = crate::volume::parse_scaled(text, 2, "amount")?;
        Ok(Money(paise))
    }

    /// Returns the value in paise.
    #[inline]
    pub const fn paise(&self) -> i64 {
        self.0
    }

    /// Returns the whole-rupee portion.
    #[inline]
    pub const fn rupees(&self) -> i64 {
        self.0 / PAISE_PER_RUPEE
    }

    /// Returns the paise portion (always 0-99).
    #[inline]
    pub const fn paise_part(&self) -> i64 {
        (self.0 % PAISE_PER_RUPEE).abs()
    }

    /// Returns zero money value.
    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    /// Checks if the value is zero.
    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Checks if the value is negative (less than zero).
    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Absolute difference between two amounts, saturating at `i64::MAX`.
    #[inline]
    pub fn abs_diff(&self, other: Money) -> Money {
        let diff = (self.0 as i128 - other.0 as i128).unsigned_abs();
        Money(i64::try_from(diff).unwrap_or(i64::MAX))
    }

    /// Adds two amounts, `None` on overflow.
    #[inline]
    pub const fn checked_add(self, other: Money) -> Option<Money> {
        match self.0.checked_add(other.0) {
            Some(paise) => Some(Money(paise)),
            None => None,
        }
    }

    /// Subtracts `other`, `None` on overflow.
    #[inline]
    pub const fn checked_sub(self, other: Money) -> Option<Money> {
        match self.0.checked_sub(other.0) {
            Some(paise) => Some(Money(paise)),
            None => None,
        }
    }

    /// Sums amounts, `None` as soon as the running total overflows.
    ///
    /// ## Example
    /// ```rust
    /// use fuelrecon_core::money::Money;
    ///
    /// let parts = [Money::from_paise(300_000), Money::from_paise(200_000)];
    /// assert_eq!(Money::checked_sum(parts), Some(Money::from_paise(500_000)));
    /// assert_eq!(Money::checked_sum([Money::from_paise(i64::MAX), Money::from_paise(1)]), None);
    /// ```
    pub fn checked_sum<I: IntoIterator<Item = Money>>(amounts: I) -> Option<Money> {
        amounts
            .into_iter()
            .try_fold(Money::zero(), |acc, amount| acc.checked_add(amount))
    }

    /// Prices a dispensed volume at a per-litre rate.
    ///
    /// ## Rounding: half-up to the paisa
    /// ```text
    /// ┌─────────────────────────────────────────────────────────────────────┐
    /// │  raw = volume_ml × paise_per_litre            (exact, i128)        │
    /// │  total = (raw + 500) / 1000                   (half rounds up)     │
    /// │                                                                     │
    /// │  1_234 ml × 10_263 = 12_664_542  → 12_665 paise  (₹126.65)          │
    /// │    500 ml ×      1 =        500  →      1 paisa                     │
    /// │    499 ml ×      1 =        499  →      0 paise                     │
    /// └─────────────────────────────────────────────────────────────────────┘
    /// ```
    ///
    /// Volumes are never negative after validation; a negative input rounds
    /// half away from zero so the function stays symmetric. A total that does
    /// not fit in `i64` paise is refused.
    pub fn for_volume(volume: Volume, price_per_litre: Money) -> Result<Money, ValidationError> {
        let raw = volume.ml() as i128 * price_per_litre.paise() as i128;
        let scale = ML_PER_LITRE as i128;
        let half = scale / 2;
        let rounded = if raw >= 0 {
            (raw + half) / scale
        } else {
            (raw - half) / scale
        };
        i64::try_from(rounded)
            .map(Money)
            .map_err(|_| ValidationError::OutOfRange {
                field: "total".to_string(),
                min: i64::MIN,
                max: i64::MAX,
            })
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(f, "{}₹{}.{:02}", sign, self.rupees().abs(), self.paise_part())
    }
}

impl Default for Money {
    fn default() -> Self {
        Money::zero()
    }
}

// Operators saturate at the i64 bounds. Sums over caller-supplied amounts
// go through `checked_add` / `checked_sum` instead.

impl Add for Money {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Money(self.0.saturating_add(other.0))
    }
}

impl AddAssign for Money {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.0 = self.0.saturating_add(other.0);
    }
}

impl Sub for Money {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Money(self.0.saturating_sub(other.0))
    }
}

impl SubAssign for Money {
    #[inline]
    fn sub_assign(&mut self, other: Self) {
        self.0 = self.0.saturating_sub(other.0);
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
