//! # Sale Calculator
//!
//! Prices a validated delta and reconciles the payment breakdown.
//!
//! ## Calculation
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  ValidatedDelta (50.000 L, reading_at)                                  │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  PriceResolver.resolve(station, fuel, reading_at) → ₹100.00/L           │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  total = round_half_up(50.000 × 100.00) = ₹5000.00                      │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  breakdown given?                                                       │
//! │   ├── no  → { default_method: ₹5000.00 }      (default: cash)           │
//! │   └── yes → |Σ channels − total| ≤ tolerance ?                          │
//! │              ├── yes → SaleComputation                                  │
//! │              └── no  → PaymentBreakdownMismatch                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::Money;
use crate::pricing::PriceResolver;
use crate::types::{PaymentBreakdown, PaymentMethod};
use crate::validation::ValidatedDelta;

/// Default absolute tolerance between payment sum and total (1 paisa).
pub const DEFAULT_PAYMENT_TOLERANCE_PAISE: i64 = 1;

/// Channel that receives the full amount when no breakdown is supplied.
pub const DEFAULT_PAYMENT_METHOD: PaymentMethod = PaymentMethod::Cash;

/// Settings injected into [`SaleCalculator`] at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalculatorConfig {
    /// Largest accepted |Σ breakdown − total|.
    pub payment_tolerance: Money,
    /// Channel used when a reading arrives without a breakdown.
    pub default_method: PaymentMethod,
}

impl Default for CalculatorConfig {
    fn default() -> Self {
        CalculatorConfig {
            payment_tolerance: Money::from_paise(DEFAULT_PAYMENT_TOLERANCE_PAISE),
            default_method: DEFAULT_PAYMENT_METHOD,
        }
    }
}

/// A priced, reconciled sale ready to persist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaleComputation {
    pub price_record_id: String,
    pub unit_price: Money,
    pub total: Money,
    pub payments: PaymentBreakdown,
    /// True when the breakdown was filled in from `default_method`.
    pub payment_defaulted: bool,
}

/// Computes totals and checks payment allocation.
#[derive(Debug, Clone, Default)]
pub struct SaleCalculator {
    config: CalculatorConfig,
}

impl SaleCalculator {
    pub fn new(config: CalculatorConfig) -> Self {
        SaleCalculator { config }
    }

    pub fn config(&self) -> &CalculatorConfig {
        &self.config
    }

    /// Prices `delta` at its reading time and validates `payments`.
    pub fn compute(
        &self,
        delta: &ValidatedDelta,
        prices: &PriceResolver,
        payments: Option<PaymentBreakdown>,
    ) -> CoreResult<SaleComputation> {
        let record = prices.resolve(&delta.station_id, delta.fuel_type, delta.reading_at)?;
        let unit_price = record.price_per_litre();
        let total = Money::for_volume(delta.delta, unit_price)?;

        let (payments, payment_defaulted) = match payments {
            Some(breakdown) => {
                self.reconcile(&breakdown, total)?;
                (breakdown, false)
            }
            None => (PaymentBreakdown::single(self.config.default_method, total), true),
        };

        Ok(SaleComputation {
            price_record_id: record.id.clone(),
            unit_price,
            total,
            payments,
            payment_defaulted,
        })
    }

    /// Checks that `breakdown` covers `total` within tolerance.
    pub fn reconcile(&self, breakdown: &PaymentBreakdown, total: Money) -> CoreResult<()> {
        for (method, amount) in breakdown.entries() {
            if amount.is_negative() {
                return Err(ValidationError::OutOfRange {
                    field: format!("payment.{}", method),
                    min: 0,
                    max: i64::MAX,
                }
                .into());
            }
        }

        let actual = breakdown.total().ok_or_else(|| ValidationError::OutOfRange {
            field: "payment_breakdown".to_string(),
            min: 0,
            max: i64::MAX,
        })?;
        if actual.abs_diff(total) > self.config.payment_tolerance {
            return Err(CoreError::PaymentBreakdownMismatch {
                expected: total,
                actual,
            });
        }

        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
