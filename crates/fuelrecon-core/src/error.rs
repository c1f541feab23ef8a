//! # Error Types
//!
//! Domain-specific error types for fuelrecon-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  fuelrecon-core errors (this file)                                     │
//! │  ├── CoreError        - Business rule violations                       │
//! │  └── ValidationError  - Input shape failures (→ MalformedCandidate)    │
//! │                                                                         │
//! │  fuelrecon-db errors (separate crate)                                  │
//! │  └── DbError          - Database operation failures                    │
//! │                                                                         │
//! │  fuelrecon-engine errors                                               │
//! │  └── EngineError      - Adds LockTimeout, PlanLimitExceeded, ...       │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → EngineError → Rejection           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Design Principles
//! 1. Use `thiserror` for derive macros (not manual impl)
//! 2. Include context in error messages (nozzle, volumes, amounts)
//! 3. Each variant maps to one rejection kind the caller can render

use chrono::{DateTime, NaiveDate, Utc};
use thiserror::Error;

use crate::money::Money;
use crate::types::{ApprovalStatus, FuelType, NozzleStatus, Role};
use crate::volume::Volume;

// =============================================================================
// Core Error
// =============================================================================

/// Business rule violations raised while turning a reading into a sale.
#[derive(Debug, Error)]
pub enum CoreError {
    /// The candidate is missing a required field or a field is unreadable.
    #[error("Malformed reading: {0}")]
    MalformedCandidate(#[from] ValidationError),

    /// A reading with the same nozzle, date and cumulative value exists.
    ///
    /// ## When This Occurs
    /// - The attendant submits the same form twice
    /// - The OCR pipeline re-delivers an upload
    ///
    /// The engine reports this as "already recorded", not as a failure.
    #[error("Reading already recorded for nozzle {nozzle_id} on {reading_date}: {existing_id}")]
    DuplicateReading {
        nozzle_id: String,
        reading_date: NaiveDate,
        existing_id: String,
    },

    /// The meter went backwards by less than the rollover threshold.
    ///
    /// ## User Workflow
    /// ```text
    /// Previous: 1050.000 L
    /// Entered:   200.000 L   (drop of 850 L, threshold 500000 L)
    ///      │
    ///      ▼
    /// ReadingMustIncrease → UI: "Reading must be at least 1050.000 L"
    /// ```
    #[error("Reading for nozzle {nozzle_id} must be at least {previous}, got {new}")]
    ReadingMustIncrease {
        nozzle_id: String,
        previous: Volume,
        new: Volume,
    },

    /// Nozzle is not in service.
    #[error("Nozzle {nozzle_id} is {status}")]
    NozzleInactive {
        nozzle_id: String,
        status: NozzleStatus,
    },

    /// Nozzle cannot be found.
    #[error("Nozzle not found: {0}")]
    NozzleNotFound(String),

    /// No price record covers the reading time.
    #[error("No {fuel_type} price set for station {station_id} at {at}")]
    PriceNotSet {
        station_id: String,
        fuel_type: FuelType,
        at: DateTime<Utc>,
    },

    /// A new price would start inside or before the current open window.
    #[error("Price for {fuel_type} must start after {open_from}, got {requested_from}")]
    PriceWindowOverlap {
        fuel_type: FuelType,
        open_from: DateTime<Utc>,
        requested_from: DateTime<Utc>,
    },

    /// Payment channels do not add up to the sale total.
    #[error("Payment breakdown {actual} does not match sale total {expected}")]
    PaymentBreakdownMismatch { expected: Money, actual: Money },

    /// Tank stock would go negative and the ledger is configured to refuse.
    #[error("Tank {tank_id} has {available}, cannot dispense {requested}")]
    TankInsufficient {
        tank_id: String,
        available: Volume,
        requested: Volume,
    },

    /// Approval transition attempted on an already decided reading.
    #[error("Reading {reading_id} is {status}, not pending")]
    HandoverNotPending {
        reading_id: String,
        status: ApprovalStatus,
    },

    /// Actor's role is below the level the action requires.
    #[error("{actor_id} ({role}) cannot perform this action; requires {required}")]
    InsufficientRole {
        actor_id: String,
        role: Role,
        required: Role,
    },

    /// Rejection attempted without a reason.
    #[error("A rejection reason is required")]
    RejectionReasonRequired,

    /// Reading cannot be found.
    #[error("Reading not found: {0}")]
    ReadingNotFound(String),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// These occur while normalizing a payload, before any business rule runs.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Invalid format (e.g., unparseable volume or date).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },
}

impl ValidationError {
    pub fn required(field: impl Into<String>) -> Self {
        ValidationError::Required {
            field: field.into(),
        }
    }

    pub fn invalid_format(field: impl Into<String>, reason: impl Into<String>) -> Self {
        ValidationError::InvalidFormat {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================
