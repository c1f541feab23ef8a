//! # Inventory Ledger Rules
//!
//! Pure planning for tank stock movements. The database layer applies the
//! planned movement inside the commit transaction; this module decides
//! whether it is allowed and which level signals it raises.
//!
//! ## Negative Stock Policy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  stock 300 L, sale 500 L                                                │
//! │                                                                         │
//! │  AllowAndFlag (default)              Reject                             │
//! │  ──────────────────────              ──────                             │
//! │  stock → -200 L                      TankInsufficient                   │
//! │  went_negative = true                commit aborted                     │
//! │  alert: Negative                                                        │
//! │                                                                         │
//! │  Fuel already left the nozzle; the default keeps the book honest and   │
//! │  flags it for a dip check instead of refusing a sale that happened.    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::types::{FuelType, Tank, TankLevel};
use crate::volume::Volume;

/// What to do when a sale would take book stock below zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NegativeStockPolicy {
    /// Record the movement and flag the tank.
    #[default]
    AllowAndFlag,
    /// Refuse the commit with `TankInsufficient`.
    Reject,
}

impl std::str::FromStr for NegativeStockPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "allow_and_flag" | "allow" => Ok(NegativeStockPolicy::AllowAndFlag),
            "reject" | "deny" => Ok(NegativeStockPolicy::Reject),
            other => Err(format!(
                "Unknown negative stock policy: '{}'. Valid options: allow_and_flag, reject",
                other
            )),
        }
    }
}

/// Advisory signal emitted when a tank moves into a worse level band.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TankAlert {
    pub tank_id: String,
    pub station_id: String,
    pub fuel_type: FuelType,
    pub previous_level: TankLevel,
    pub level: TankLevel,
    pub stock: Volume,
}

/// Outcome of a stock movement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryResult {
    pub tank_id: String,
    pub previous_stock: Volume,
    pub new_stock: Volume,
    pub level: TankLevel,
    /// Book stock is below zero after this movement.
    pub went_negative: bool,
    pub alert: Option<TankAlert>,
}

/// Applies the negative-stock policy and level thresholds.
#[derive(Debug, Clone, Copy, Default)]
pub struct InventoryLedger {
    policy: NegativeStockPolicy,
}

impl InventoryLedger {
    pub fn new(policy: NegativeStockPolicy) -> Self {
        InventoryLedger { policy }
    }

    pub fn policy(&self) -> NegativeStockPolicy {
        self.policy
    }

    /// Plans `tank.current_stock - delta`.
    pub fn plan_consumption(&self, tank: &Tank, delta: Volume) -> CoreResult<InventoryResult> {
        let previous = tank.current_stock();
        let new_stock = previous - delta;

        if new_stock.is_negative() && self.policy == NegativeStockPolicy::Reject {
            return Err(CoreError::TankInsufficient {
                tank_id: tank.id.clone(),
                available: previous,
                requested: delta,
            });
        }

        Ok(Self::outcome(tank, previous, new_stock))
    }

    /// Plans a delivery into the tank.
    pub fn plan_refill(&self, tank: &Tank, volume: Volume) -> CoreResult<InventoryResult> {
        if volume.ml() <= 0 {
            return Err(ValidationError::MustBePositive {
                field: "refill_volume".to_string(),
            }
            .into());
        }

        let previous = tank.current_stock();
        let new_stock = previous + volume;
        if new_stock.ml() > tank.capacity_ml {
            return Err(ValidationError::OutOfRange {
                field: "refill_volume".to_string(),
                min: 1,
                max: tank.capacity_ml - previous.ml(),
            }
            .into());
        }

        Ok(Self::outcome(tank, previous, new_stock))
    }

    /// Builds the result for a movement from `previous` to `new_stock`.
    pub fn outcome(tank: &Tank, previous: Volume, new_stock: Volume) -> InventoryResult {
        let previous_level = tank.level_for(previous);
        let level = tank.level_for(new_stock);

        let alert = (level > previous_level && level >= TankLevel::Low).then(|| TankAlert {
            tank_id: tank.id.clone(),
            station_id: tank.station_id.clone(),
            fuel_type: tank.fuel_type,
            previous_level,
            level,
            stock: new_stock,
        });

        InventoryResult {
            tank_id: tank.id.clone(),
            previous_stock: previous,
            new_stock,
            level,
            went_negative: new_stock.is_negative(),
            alert,
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TankStatus;
    use chrono::Utc;

    fn tank(stock_litres: i64) -> Tank {
        Tank {
            id: "T-1".to_string(),
            station_id: "S-1".to_string(),
            fuel_type: FuelType::Petrol,
            capacity_ml: Volume::from_litres(20_000).ml(),
            current_stock_ml: Volume::from_litres(stock_litres).ml(),
            low_level_ml: Volume::from_litres(2_000).ml(),
            critical_level_ml: Volume::from_litres(500).ml(),
            status: TankStatus::Active,
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_plain_consumption() {
        let ledger = InventoryLedger::default();
        let result = ledger.plan_consumption(&tank(10_000), Volume::from_litres(50)).unwrap();

        assert_eq!(result.new_stock, Volume::from_litres(9_950));
        assert_eq!(result.level, TankLevel::Normal);
        assert!(result.alert.is_none());
        assert!(!result.went_negative);
    }

    #[test]
    fn test_crossing_low_raises_alert_once() {
        let ledger = InventoryLedger::default();
        let result = ledger.plan_consumption(&tank(2_010), Volume::from_litres(20)).unwrap();
        let alert = result.alert.expect("should alert on crossing into low");
        assert_eq!(alert.previous_level, TankLevel::Normal);
        assert_eq!(alert.level, TankLevel::Low);

        // Already low: staying low is not a new signal
        let result = ledger.plan_consumption(&tank(1_900), Volume::from_litres(20)).unwrap();
        assert_eq!(result.level, TankLevel::Low);
        assert!(result.alert.is_none());
    }

    #[test]
    fn test_crossing_critical() {
        let ledger = InventoryLedger::default();
        let result = ledger.plan_consumption(&tank(600), Volume::from_litres(200)).unwrap();
        assert_eq!(result.alert.map(|a| a.level), Some(TankLevel::Critical));
    }

    #[test]
    fn test_default_policy_allows_negative_and_flags() {
        let ledger = InventoryLedger::default();
        assert_eq!(ledger.policy(), NegativeStockPolicy::AllowAndFlag);

        let result = ledger.plan_consumption(&tank(300), Volume::from_litres(500)).unwrap();
        assert_eq!(result.new_stock, Volume::from_litres(-200));
        assert!(result.went_negative);
        assert_eq!(result.level, TankLevel::Negative);
        assert_eq!(result.alert.map(|a| a.level), Some(TankLevel::Negative));
    }

    #[test]
    fn test_reject_policy() {
        let ledger = InventoryLedger::new(NegativeStockPolicy::Reject);
        let err = ledger.plan_consumption(&tank(300), Volume::from_litres(500)).unwrap_err();
        assert!(matches!(err, CoreError::TankInsufficient { .. }));

        // Exactly emptying the tank is still allowed
        assert!(ledger.plan_consumption(&tank(300), Volume::from_litres(300)).is_ok());
    }

    #[test]
    fn test_refill() {
        let ledger = InventoryLedger::default();
        let result = ledger.plan_refill(&tank(1_000), Volume::from_litres(5_000)).unwrap();
        assert_eq!(result.new_stock, Volume::from_litres(6_000));
        assert!(result.alert.is_none());

        assert!(ledger.plan_refill(&tank(18_000), Volume::from_litres(5_000)).is_err());
        assert!(ledger.plan_refill(&tank(1_000), Volume::zero()).is_err());
    }

    #[test]
    fn test_policy_parsing() {
        assert_eq!("reject".parse::<NegativeStockPolicy>().unwrap(), NegativeStockPolicy::Reject);
        assert_eq!(
            "allow_and_flag".parse::<NegativeStockPolicy>().unwrap(),
            NegativeStockPolicy::AllowAndFlag
        );
        assert!("maybe".parse::<NegativeStockPolicy>().is_err());
    }
}
