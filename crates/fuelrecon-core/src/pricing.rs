//! # Price Resolver
//!
//! Point-in-time lookup over time-bounded [`PriceRecord`]s.
//!
//! ## Validity Windows
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  petrol @ station S-1                                                   │
//! │                                                                         │
//! │  ₹100.00  [06:00 ─────────── 18:00)                                     │
//! │  ₹102.50                    [18:00 ───────────────── open ──►           │
//! │                                                                         │
//! │  resolve(17:59) → ₹100.00     resolve(18:00) → ₹102.50                  │
//! │  resolve(05:00) → PriceNotSet (never default to a stale or zero price)  │
//! │                                                                         │
//! │  Overlap (corrupt data): latest valid_from wins, then highest id.       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The resolver is built from the records it may choose from, so tests and
//! callers hand it fixtures instead of it reaching into shared state.

use chrono::{DateTime, Utc};

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::Money;
use crate::types::{FuelType, PriceRecord};

/// Resolves the price effective at an instant.
#[derive(Debug, Clone, Default)]
pub struct PriceResolver {
    records: Vec<PriceRecord>,
}

impl PriceResolver {
    pub fn new(records: Vec<PriceRecord>) -> Self {
        PriceResolver { records }
    }

    /// Returns the record for `(station_id, fuel_type)` covering `at`.
    ///
    /// Deterministic: the same inputs always select the same record.
    pub fn resolve(
        &self,
        station_id: &str,
        fuel_type: FuelType,
        at: DateTime<Utc>,
    ) -> CoreResult<&PriceRecord> {
        self.records
            .iter()
            .filter(|r| r.station_id == station_id && r.fuel_type == fuel_type && r.covers(at))
            .max_by(|a, b| {
                a.valid_from
                    .cmp(&b.valid_from)
                    .then_with(|| a.id.cmp(&b.id))
            })
            .ok_or_else(|| CoreError::PriceNotSet {
                station_id: station_id.to_string(),
                fuel_type,
                at,
            })
    }
}

/// Checks a new price against the currently open record before it is set.
///
/// ## Rules
/// - Price must be positive
/// - `valid_from` must be strictly after the open record's `valid_from`,
///   so closing the open record at `valid_from` leaves no overlap
pub fn check_price_change(
    open: Option<&PriceRecord>,
    fuel_type: FuelType,
    price_per_litre: Money,
    valid_from: DateTime<Utc>,
) -> CoreResult<()> {
    if price_per_litre.paise() <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "price_per_litre".to_string(),
        }
        .into());
    }

    if let Some(open) = open {
        if valid_from <= open.valid_from {
            return Err(CoreError::PriceWindowOverlap {
                fuel_type,
                open_from: open.valid_from,
                requested_from: valid_from,
            });
        }
    }

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, h, 0, 0).unwrap()
    }

    fn record(id: &str, paise: i64, from: u32, until: Option<u32>) -> PriceRecord {
        PriceRecord {
            id: id.to_string(),
            station_id: "S-1".to_string(),
            fuel_type: FuelType::Petrol,
            price_per_litre_paise: paise,
            valid_from: at(from),
            valid_until: until.map(at),
            set_by: "owner-1".to_string(),
        }
    }

    fn resolver() -> PriceResolver {
        PriceResolver::new(vec![
            record("p1", 10_000, 6, Some(18)),
            record("p2", 10_250, 18, None),
        ])
    }

    #[test]
    fn test_resolve_within_window() {
        let r = resolver();
        assert_eq!(r.resolve("S-1", FuelType::Petrol, at(10)).unwrap().id, "p1");
        assert_eq!(r.resolve("S-1", FuelType::Petrol, at(18)).unwrap().id, "p2");
        assert_eq!(r.resolve("S-1", FuelType::Petrol, at(23)).unwrap().id, "p2");
    }

    #[test]
    fn test_resolve_not_set() {
        let r = resolver();
        assert!(matches!(
            r.resolve("S-1", FuelType::Petrol, at(5)),
            Err(CoreError::PriceNotSet { .. })
        ));
        assert!(r.resolve("S-1", FuelType::Diesel, at(10)).is_err());
        assert!(r.resolve("S-2", FuelType::Petrol, at(10)).is_err());
    }

    #[test]
    fn test_overlap_latest_valid_from_wins() {
        let r = PriceResolver::new(vec![
            record("old", 9_900, 1, None),
            record("new", 10_100, 8, None),
        ]);
        let chosen = r.resolve("S-1", FuelType::Petrol, at(12)).unwrap();
        assert_eq!(chosen.id, "new");
        assert_eq!(chosen.price_per_litre().paise(), 10_100);
    }

    #[test]
    fn test_resolve_is_idempotent() {
        let r = PriceResolver::new(vec![
            record("b", 10_000, 6, None),
            record("a", 10_100, 6, None),
        ]);
        let first = r.resolve("S-1", FuelType::Petrol, at(9)).unwrap().clone();
        let second = r.resolve("S-1", FuelType::Petrol, at(9)).unwrap().clone();
        assert_eq!(first, second);
        assert_eq!(first.id, "b");
    }

    #[test]
    fn test_check_price_change() {
        let open = record("p2", 10_250, 18, None);
        assert!(check_price_change(Some(&open), FuelType::Petrol, Money::from_paise(10_300), at(19)).is_ok());
        assert!(matches!(
            check_price_change(Some(&open), FuelType::Petrol, Money::from_paise(10_300), at(18)),
            Err(CoreError::PriceWindowOverlap { .. })
        ));
        assert!(check_price_change(None, FuelType::Petrol, Money::zero(), at(1)).is_err());
    }
}
