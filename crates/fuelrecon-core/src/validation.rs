//! # Reading Validator
//!
//! Checks a [`ReadingCandidate`] against the nozzle's last known meter value.
//!
//! ## Rule Order
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Reading Validation                                 │
//! │                                                                         │
//! │  candidate ──► 1. Duplicate?  same nozzle + date + cumulative           │
//! │                   └── yes → DuplicateReading (already recorded)         │
//! │                                                                         │
//! │            ──► 2. Meter movement                                        │
//! │                   ├── new ≥ previous          → delta = new - previous  │
//! │                   ├── drop ≥ threshold and                              │
//! │                   │   new ≤ max throughput    → rollover, delta = new   │
//! │                   └── otherwise               → ReadingMustIncrease     │
//! │                                                                         │
//! │            ──► 3. Nozzle active?                                        │
//! │                   └── no → NozzleInactive                               │
//! │                                                                         │
//! │            ──► ValidatedDelta                                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};
use crate::normalizer::ReadingCandidate;
use crate::types::{FuelType, Nozzle};
use crate::volume::Volume;

// =============================================================================
// Rollover Policy
// =============================================================================

/// Tunables for telling a meter reset apart from a mistyped reading.
///
/// A backwards reading counts as a rollover only when the drop is at least
/// `threshold` (a reset throws away most of the counter) and the new value is
/// no more than `max_period_throughput` (a fresh counter cannot have
/// dispensed more than a nozzle plausibly sells between two readings).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RolloverPolicy {
    pub threshold: Volume,
    pub max_period_throughput: Volume,
}

impl Default for RolloverPolicy {
    fn default() -> Self {
        RolloverPolicy {
            threshold: Volume::from_litres(500_000),
            max_period_throughput: Volume::from_litres(100_000),
        }
    }
}

/// How the meter moved between two readings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MeterMovement {
    /// Counter advanced (or stayed put).
    Forward(Volume),
    /// Counter reset; the new value is the volume dispensed since the reset.
    Rollover(Volume),
    /// Counter went backwards without looking like a reset.
    Backward,
}

// =============================================================================
// Validated Delta
// =============================================================================

/// Output of a successful validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedDelta {
    pub nozzle_id: String,
    pub station_id: String,
    pub fuel_type: FuelType,
    pub previous: Volume,
    pub cumulative: Volume,
    pub delta: Volume,
    pub is_rollover: bool,
    pub reading_at: DateTime<Utc>,
}

// =============================================================================
// Validator
// =============================================================================

/// Applies duplicate, monotonicity and nozzle-state rules.
#[derive(Debug, Clone, Default)]
pub struct ReadingValidator {
    policy: RolloverPolicy,
}

impl ReadingValidator {
    pub fn new(policy: RolloverPolicy) -> Self {
        ReadingValidator { policy }
    }

    pub fn policy(&self) -> &RolloverPolicy {
        &self.policy
    }

    /// Classifies the movement from `previous` to `new`.
    ///
    /// ## Example
    /// ```rust
    /// use fuelrecon_core::validation::{MeterMovement, ReadingValidator};
    /// use fuelrecon_core::volume::Volume;
    ///
    /// let validator = ReadingValidator::default();
    /// assert_eq!(
    ///     validator.classify(Volume::from_litres(1000), Volume::from_litres(1050)),
    ///     MeterMovement::Forward(Volume::from_litres(50))
    /// );
    /// assert_eq!(
    ///     validator.classify(Volume::from_litres(1050), Volume::from_litres(200)),
    ///     MeterMovement::Backward
    /// );
    /// ```
    pub fn classify(&self, previous: Volume, new: Volume) -> MeterMovement {
        if new >= previous {
            return MeterMovement::Forward(new - previous);
        }

        let drop = previous - new;
        if drop >= self.policy.threshold && new <= self.policy.max_period_throughput {
            MeterMovement::Rollover(new)
        } else {
            MeterMovement::Backward
        }
    }

    /// Validates `candidate` against `nozzle`.
    ///
    /// `duplicate_of` is the id of an existing reading with the same nozzle,
    /// reading date and cumulative value, if the caller found one.
    pub fn validate(
        &self,
        candidate: &ReadingCandidate,
        nozzle: &Nozzle,
        duplicate_of: Option<&str>,
    ) -> CoreResult<ValidatedDelta> {
        if let Some(existing_id) = duplicate_of {
            return Err(CoreError::DuplicateReading {
                nozzle_id: nozzle.id.clone(),
                reading_date: candidate.reading_date(),
                existing_id: existing_id.to_string(),
            });
        }

        let previous = nozzle.last_cumulative();
        let (delta, is_rollover) = match self.classify(previous, candidate.cumulative) {
            MeterMovement::Forward(delta) => (delta, false),
            MeterMovement::Rollover(delta) => (delta, true),
            MeterMovement::Backward => {
                return Err(CoreError::ReadingMustIncrease {
                    nozzle_id: nozzle.id.clone(),
                    previous,
                    new: candidate.cumulative,
                })
            }
        };

        if !nozzle.is_active() {
            return Err(CoreError::NozzleInactive {
                nozzle_id: nozzle.id.clone(),
                status: nozzle.status,
            });
        }

        Ok(ValidatedDelta {
            nozzle_id: nozzle.id.clone(),
            station_id: nozzle.station_id.clone(),
            fuel_type: nozzle.fuel_type,
            previous,
            cumulative: candidate.cumulative,
            delta,
            is_rollover,
            reading_at: candidate.reading_at,
        })
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
