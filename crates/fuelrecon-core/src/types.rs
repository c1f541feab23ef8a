//! # Domain Types
//!
//! Core domain types used throughout FuelRecon.
//!
//! ## Type Map
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │     Nozzle      │   │   PriceRecord   │   │      Tank       │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  fuel_type      │   │  station+fuel   │   │  station+fuel   │       │
//! │  │  status         │   │  valid_from     │   │  current_stock  │       │
//! │  │  last_cumulative│   │  valid_until?   │   │  low/critical   │       │
//! │  └────────┬────────┘   └────────┬────────┘   └────────┬────────┘       │
//! │           │ previous            │ unit price          │ decrement      │
//! │           ▼                     ▼                     ▼                │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     Reading  (= the sale)                       │   │
//! │  │  previous/new cumulative · delta · unit price (frozen) · total  │   │
//! │  │  PaymentBreakdown · ApprovalStatus · submitted/approved by      │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Persisted records keep raw integer columns (`*_ml`, `*_paise`) so they map
//! one-to-one onto SQLite rows; accessor methods hand out [`Money`] and
//! [`Volume`] values.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use ts_rs::TS;

use crate::money::Money;
use crate::volume::Volume;

// =============================================================================
// Fuel Type
// =============================================================================

/// Grade of fuel dispensed by a nozzle and stored in a tank.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum FuelType {
    Petrol,
    Diesel,
    PremiumPetrol,
    PremiumDiesel,
    Cng,
    Lpg,
}

impl FuelType {
    /// Stable lowercase code, as stored in the database.
    pub const fn code(&self) -> &'static str {
        match self {
            FuelType::Petrol => "petrol",
            FuelType::Diesel => "diesel",
            FuelType::PremiumPetrol => "premium_petrol",
            FuelType::PremiumDiesel => "premium_diesel",
            FuelType::Cng => "cng",
            FuelType::Lpg => "lpg",
        }
    }
}

impl fmt::Display for FuelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

// =============================================================================
// Nozzle
// =============================================================================

/// Operational state of a nozzle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum NozzleStatus {
    Active,
    Inactive,
    Maintenance,
}

impl fmt::Display for NozzleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NozzleStatus::Active => write!(f, "active"),
            NozzleStatus::Inactive => write!(f, "inactive"),
            NozzleStatus::Maintenance => write!(f, "maintenance"),
        }
    }
}

/// A single dispensing point with a cumulative (odometer-style) meter.
///
/// `last_cumulative_ml` starts at the meter value recorded when the nozzle
/// was installed and only moves through committed readings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Nozzle {
    pub id: String,
    pub station_id: String,
    pub pump_id: String,
    /// Position of the nozzle on its pump (1-based, as printed on receipts).
    pub nozzle_number: i64,
    pub fuel_type: FuelType,
    pub status: NozzleStatus,
    /// Last recorded cumulative meter value in millilitres.
    pub last_cumulative_ml: i64,
    #[ts(as = "Option<String>")]
    pub last_reading_at: Option<DateTime<Utc>>,
}

impl Nozzle {
    /// Returns the last recorded cumulative volume.
    #[inline]
    pub fn last_cumulative(&self) -> Volume {
        Volume::from_ml(self.last_cumulative_ml)
    }

    #[inline]
    pub fn is_active(&self) -> bool {
        self.status == NozzleStatus::Active
    }
}

// =============================================================================
// Price Record
// =============================================================================

/// A per-litre price for one fuel type at one station, valid over a window.
///
/// `valid_until` is `None` while the record is the current price; setting a
/// new price closes it rather than deleting it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct PriceRecord {
    pub id: String,
    pub station_id: String,
    pub fuel_type: FuelType,
    pub price_per_litre_paise: i64,
    #[ts(as = "String")]
    pub valid_from: DateTime<Utc>,
    #[ts(as = "Option<String>")]
    pub valid_until: Option<DateTime<Utc>>,
    pub set_by: String,
}

impl PriceRecord {
    /// Returns the per-litre price.
    #[inline]
    pub fn price_per_litre(&self) -> Money {
        Money::from_paise(self.price_per_litre_paise)
    }

    /// Whether this record is authoritative at `at`.
    ///
    /// The window is half-open: `valid_from <= at < valid_until`.
    pub fn covers(&self, at: DateTime<Utc>) -> bool {
        self.valid_from <= at && self.valid_until.map_or(true, |until| until > at)
    }
}

// =============================================================================
// Roles & Actors
// =============================================================================

/// Station staff roles, ordered by authority.
///
/// ## Hierarchy
/// ```text
/// Attendant (1) < Manager (2) < Owner (3) < SuperAdmin (4)
/// ```
/// Authorization is a plain comparison of [`Role::level`] values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Attendant,
    Manager,
    Owner,
    SuperAdmin,
}

impl Role {
    /// Position in the hierarchy.
    pub const fn level(&self) -> u8 {
        match self {
            Role::Attendant => 1,
            Role::Manager => 2,
            Role::Owner => 3,
            Role::SuperAdmin => 4,
        }
    }

    /// Returns true if this role is at least as senior as `required`.
    #[inline]
    pub const fn satisfies(&self, required: Role) -> bool {
        self.level() >= required.level()
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Attendant => write!(f, "attendant"),
            Role::Manager => write!(f, "manager"),
            Role::Owner => write!(f, "owner"),
            Role::SuperAdmin => write!(f, "super_admin"),
        }
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "attendant" => Ok(Role::Attendant),
            "manager" => Ok(Role::Manager),
            "owner" => Ok(Role::Owner),
            "super_admin" | "superadmin" => Ok(Role::SuperAdmin),
            other => Err(format!(
                "Unknown role: '{}'. Valid options: attendant, manager, owner, super_admin",
                other
            )),
        }
    }
}

/// An authenticated user acting on the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Actor {
    pub id: String,
    pub role: Role,
}

impl Actor {
    pub fn new(id: impl Into<String>, role: Role) -> Self {
        Actor {
            id: id.into(),
            role,
        }
    }
}

// =============================================================================
// Approval Status
// =============================================================================

/// Lifecycle state of a committed reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum ApprovalStatus {
    /// Committed, waiting for a manager decision.
    Pending,
    /// Accepted (terminal).
    Approved,
    /// Refused with a reason (terminal).
    Rejected,
}

impl ApprovalStatus {
    /// Returns true for states no transition leaves.
    #[inline]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, ApprovalStatus::Approved | ApprovalStatus::Rejected)
    }
}

impl Default for ApprovalStatus {
    fn default() -> Self {
        ApprovalStatus::Pending
    }
}

impl fmt::Display for ApprovalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApprovalStatus::Pending => write!(f, "pending"),
            ApprovalStatus::Approved => write!(f, "approved"),
            ApprovalStatus::Rejected => write!(f, "rejected"),
        }
    }
}

// =============================================================================
// Payment Method & Breakdown
// =============================================================================

/// A payment channel a sale can be settled through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    Upi,
    Card,
    Credit,
    FleetCard,
    Wallet,
}

impl PaymentMethod {
    /// All channels, in breakdown column order.
    pub const ALL: [PaymentMethod; 6] = [
        PaymentMethod::Cash,
        PaymentMethod::Upi,
        PaymentMethod::Card,
        PaymentMethod::Credit,
        PaymentMethod::FleetCard,
        PaymentMethod::Wallet,
    ];
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PaymentMethod::Cash => write!(f, "cash"),
            PaymentMethod::Upi => write!(f, "upi"),
            PaymentMethod::Card => write!(f, "card"),
            PaymentMethod::Credit => write!(f, "credit"),
            PaymentMethod::FleetCard => write!(f, "fleet_card"),
            PaymentMethod::Wallet => write!(f, "wallet"),
        }
    }
}

impl std::str::FromStr for PaymentMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "cash" => Ok(PaymentMethod::Cash),
            "upi" => Ok(PaymentMethod::Upi),
            "card" => Ok(PaymentMethod::Card),
            "credit" => Ok(PaymentMethod::Credit),
            "fleet_card" | "fleet" => Ok(PaymentMethod::FleetCard),
            "wallet" => Ok(PaymentMethod::Wallet),
            other => Err(format!(
                "Unknown payment method: '{}'. Valid options: cash, upi, card, credit, fleet_card, wallet",
                other
            )),
        }
    }
}

/// Allocation of a sale's total across payment channels, in paise.
///
/// Stored as six columns on the reading row.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct PaymentBreakdown {
    #[serde(default)]
    pub cash_paise: i64,
    #[serde(default)]
    pub upi_paise: i64,
    #[serde(default)]
    pub card_paise: i64,
    #[serde(default)]
    pub credit_paise: i64,
    #[serde(default)]
    pub fleet_card_paise: i64,
    #[serde(default)]
    pub wallet_paise: i64,
}

impl PaymentBreakdown {
    /// A breakdown that puts the whole amount on one channel.
    pub fn single(method: PaymentMethod, amount: Money) -> Self {
        PaymentBreakdown::default().with(method, amount)
    }

    /// Returns a copy with `method` set to `amount`.
    pub fn with(mut self, method: PaymentMethod, amount: Money) -> Self {
        *self.slot_mut(method) = amount.paise();
        self
    }

    /// Amount allocated to one channel.
    pub fn get(&self, method: PaymentMethod) -> Money {
        let paise = match method {
            PaymentMethod::Cash => self.cash_paise,
            PaymentMethod::Upi => self.upi_paise,
            PaymentMethod::Card => self.card_paise,
            PaymentMethod::Credit => self.credit_paise,
            PaymentMethod::FleetCard => self.fleet_card_paise,
            PaymentMethod::Wallet => self.wallet_paise,
        };
        Money::from_paise(paise)
    }

    fn slot_mut(&mut self, method: PaymentMethod) -> &mut i64 {
        match method {
            PaymentMethod::Cash => &mut self.cash_paise,
            PaymentMethod::Upi => &mut self.upi_paise,
            PaymentMethod::Card => &mut self.card_paise,
            PaymentMethod::Credit => &mut self.credit_paise,
            PaymentMethod::FleetCard => &mut self.fleet_card_paise,
            PaymentMethod::Wallet => &mut self.wallet_paise,
        }
    }

    /// Every channel with its amount, zero amounts included.
    pub fn entries(&self) -> impl Iterator<Item = (PaymentMethod, Money)> + '_ {
        PaymentMethod::ALL.into_iter().map(move |m| (m, self.get(m)))
    }

    /// Sum of all channels, `None` if it does not fit in `i64` paise.
    pub fn total(&self) -> Option<Money> {
        Money::checked_sum(self.entries().map(|(_, amount)| amount))
    }

    /// Adds another breakdown channel by channel.
    ///
    /// Leaves `self` untouched and returns `false` if any channel would
    /// overflow.
    pub fn accumulate(&mut self, other: &PaymentBreakdown) -> bool {
        let mut merged = *self;
        for method in PaymentMethod::ALL {
            match self.get(method).checked_add(other.get(method)) {
                Some(sum) => *merged.slot_mut(method) = sum.paise(),
                None => return false,
            }
        }
        *self = merged;
        true
    }
}

// =============================================================================
// Reading (the persisted sale)
// =============================================================================

/// Where a reading came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum ReadingSource {
    Manual,
    Ocr,
}

impl fmt::Display for ReadingSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReadingSource::Manual => write!(f, "manual"),
            ReadingSource::Ocr => write!(f, "ocr"),
        }
    }
}

/// A committed meter reading and the sale derived from it.
///
/// ## Snapshot Pattern
/// `unit_price_paise` is copied from the price record at commit time. Later
/// price changes never touch committed readings.
///
/// Only the approval fields (`status`, `approved_by`, `rejection_reason`,
/// `decided_at`) change after commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Reading {
    pub id: String,
    pub station_id: String,
    pub nozzle_id: String,
    pub fuel_type: FuelType,
    pub source: ReadingSource,
    /// OCR upload this reading was extracted from.
    pub source_upload_id: Option<String>,
    pub previous_cumulative_ml: i64,
    pub cumulative_ml: i64,
    pub delta_ml: i64,
    /// Meter reset detected between the previous and this reading.
    pub is_rollover: bool,
    #[ts(as = "String")]
    pub reading_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub reading_date: NaiveDate,
    /// Unit price in paise per litre at time of commit (frozen).
    pub unit_price_paise: i64,
    pub price_record_id: String,
    pub total_paise: i64,
    #[cfg_attr(feature = "sqlx", sqlx(flatten))]
    pub payments: PaymentBreakdown,
    pub status: ApprovalStatus,
    pub submitted_by: String,
    pub approved_by: Option<String>,
    pub rejection_reason: Option<String>,
    /// Tank debited by this sale, if one was configured.
    pub tank_id: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "Option<String>")]
    pub decided_at: Option<DateTime<Utc>>,
}

impl Reading {
    #[inline]
    pub fn delta(&self) -> Volume {
        Volume::from_ml(self.delta_ml)
    }

    #[inline]
    pub fn total(&self) -> Money {
        Money::from_paise(self.total_paise)
    }

    #[inline]
    pub fn unit_price(&self) -> Money {
        Money::from_paise(self.unit_price_paise)
    }
}

// =============================================================================
// Tank
// =============================================================================

/// Whether a tank is in service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum TankStatus {
    Active,
    Inactive,
}

/// Stock level band of a tank, from healthy to overdrawn.
///
/// Ordered by severity so a worsening level compares greater.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum TankLevel {
    Normal,
    Low,
    Critical,
    /// Book stock below zero: sales recorded that the ledger could not cover.
    Negative,
}

impl fmt::Display for TankLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TankLevel::Normal => write!(f, "normal"),
            TankLevel::Low => write!(f, "low"),
            TankLevel::Critical => write!(f, "critical"),
            TankLevel::Negative => write!(f, "negative"),
        }
    }
}

/// Station storage tank for one fuel type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Tank {
    pub id: String,
    pub station_id: String,
    pub fuel_type: FuelType,
    pub capacity_ml: i64,
    pub current_stock_ml: i64,
    /// At or below this stock the tank is `Low`.
    pub low_level_ml: i64,
    /// At or below this stock the tank is `Critical`.
    pub critical_level_ml: i64,
    pub status: TankStatus,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Tank {
    #[inline]
    pub fn current_stock(&self) -> Volume {
        Volume::from_ml(self.current_stock_ml)
    }

    /// Level band for the current stock.
    pub fn level(&self) -> TankLevel {
        self.level_for(self.current_stock())
    }

    /// Level band a given stock value would fall into for this tank.
    pub fn level_for(&self, stock: Volume) -> TankLevel {
        let ml = stock.ml();
        if ml < 0 {
            TankLevel::Negative
        } else if ml <= self.critical_level_ml {
            TankLevel::Critical
        } else if ml <= self.low_level_ml {
            TankLevel::Low
        } else {
            TankLevel::Normal
        }
    }
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

    #[test]
    fn test_role_hierarchy() {
        assert!(Role::Manager.satisfies(Role::Manager));
        assert!(Role::Owner.satisfies(Role::Manager));
        assert!(Role::SuperAdmin.satisfies(Role::Owner));
        assert!(!Role::Attendant.satisfies(Role::Manager));
        assert_eq!("Owner".parse::<Role>().unwrap(), Role::Owner);
        assert!("cashier".parse::<Role>().is_err());
    }

    #[test]
    fn test_price_record_window_is_half_open() {
        let record = PriceRecord {
            id: "p1".to_string(),
            station_id: "s1".to_string(),
            fuel_type: FuelType::Petrol,
            price_per_litre_paise: 10_000,
            valid_from: at(6),
            valid_until: Some(at(18)),
            set_by: "owner".to_string(),
        };

        assert!(!record.covers(at(5)));
        assert!(record.covers(at(6)));
        assert!(record.covers(at(17)));
        assert!(!record.covers(at(18)));
    }

    #[test]
    fn test_payment_breakdown_total() {
        let breakdown = PaymentBreakdown::single(PaymentMethod::Cash, Money::from_paise(300_000))
            .with(PaymentMethod::Upi, Money::from_paise(100_000))
            .with(PaymentMethod::FleetCard, Money::from_paise(50));

        assert_eq!(breakdown.total(), Some(Money::from_paise(400_050)));
        assert_eq!(breakdown.get(PaymentMethod::Upi).paise(), 100_000);
        assert_eq!(breakdown.get(PaymentMethod::Wallet).paise(), 0);

        let mut summary = PaymentBreakdown::default();
        assert!(summary.accumulate(&breakdown));
        assert!(summary.accumulate(&breakdown));
        assert_eq!(summary.cash_paise, 600_000);
    }

    #[test]
    fn test_payment_breakdown_overflow() {
        let huge = PaymentBreakdown::single(PaymentMethod::Cash, Money::from_paise(i64::MAX))
            .with(PaymentMethod::Upi, Money::from_paise(i64::MAX))
            .with(PaymentMethod::Card, Money::from_paise(500_002));
        assert_eq!(huge.total(), None);

        let mut summary = PaymentBreakdown::single(PaymentMethod::Upi, Money::from_paise(10));
        assert!(!summary.accumulate(&huge));
        // Unchanged after a refused merge
        assert_eq!(summary.upi_paise, 10);
        assert_eq!(summary.cash_paise, 0);
    }

    #[test]
    fn test_tank_levels() {
        let tank = Tank {
            id: "t1".to_string(),
            station_id: "s1".to_string(),
            fuel_type: FuelType::Diesel,
            capacity_ml: 20_000_000,
            current_stock_ml: 5_000_000,
            low_level_ml: 2_000_000,
            critical_level_ml: 500_000,
            status: TankStatus::Active,
            updated_at: at(0),
        };

        assert_eq!(tank.level(), TankLevel::Normal);
        assert_eq!(tank.level_for(Volume::from_ml(2_000_000)), TankLevel::Low);
        assert_eq!(tank.level_for(Volume::from_ml(500_000)), TankLevel::Critical);
        assert_eq!(tank.level_for(Volume::from_ml(-1)), TankLevel::Negative);
        assert!(TankLevel::Critical > TankLevel::Low);
    }

    #[test]
    fn test_approval_status_terminal() {
        assert!(!ApprovalStatus::Pending.is_terminal());
        assert!(ApprovalStatus::Approved.is_terminal());
        assert!(ApprovalStatus::Rejected.is_terminal());
        assert_eq!(ApprovalStatus::default(), ApprovalStatus::Pending);
    }
}
