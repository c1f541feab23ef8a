//! # fuelrecon-core: Pure Reconciliation Rules
//!
//! Everything that decides whether a meter reading becomes a sale, and what
//! that sale is worth, lives here as plain functions over plain data.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        FuelRecon Architecture                           │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │        Inbound: attendant form · OCR receipt pipeline           │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │          fuelrecon-engine (ReconciliationEngine)                │   │
//! │  │    locks · transaction boundary · quota · events · config      │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │             ★ fuelrecon-core (THIS CRATE) ★                     │   │
//! │  │                                                                 │   │
//! │  │  normalizer ─► validation ─► pricing ─► calculator ─► inventory │   │
//! │  │                                                      approval   │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO CLOCK • NO LOCKS                   │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                fuelrecon-db (SQLite repositories)               │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Nozzles, prices, readings, tanks, roles
//! - [`money`] / [`volume`] - Integer paise and millilitres
//! - [`normalizer`] - Manual and OCR payloads to one candidate shape
//! - [`validation`] - Duplicate, monotonicity and rollover rules
//! - [`pricing`] - Point-in-time price lookup
//! - [`calculator`] - Sale total and payment reconciliation
//! - [`inventory`] - Tank stock movement planning
//! - [`approval`] - Pending → approved / rejected
//! - [`error`] - Domain error types
//!
//! ## Example Usage
//!
//! ```rust
//! use fuelrecon_core::{Money, Volume};
//!
//! // 50 L at ₹100.00/L
//! let total = Money::for_volume(Volume::from_litres(50), Money::from_paise(10_000)).unwrap();
//! assert_eq!(total.paise(), 500_000);
//!
//! // Sub-paisa results round half up: 0.005 L × ₹1.00 = 0.5 paisa → 1 paisa
//! let tiny = Money::for_volume(Volume::from_ml(5), Money::from_paise(100)).unwrap();
//! assert_eq!(tiny.paise(), 1);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod approval;
pub mod calculator;
pub mod error;
pub mod inventory;
pub mod money;
pub mod normalizer;
pub mod pricing;
pub mod types;
pub mod validation;
pub mod volume;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use approval::{ApprovalWorkflow, Decision};
pub use calculator::{CalculatorConfig, SaleCalculator, SaleComputation};
pub use error::{CoreError, CoreResult, ValidationError};
pub use inventory::{InventoryLedger, InventoryResult, NegativeStockPolicy, TankAlert};
pub use money::Money;
pub use normalizer::{
    ManualReadingInput, NozzleRef, OcrReadingInput, ReadingCandidate, ReadingNormalizer,
    UploadContext,
};
pub use pricing::PriceResolver;
pub use types::*;
pub use validation::{ReadingValidator, RolloverPolicy, ValidatedDelta};
pub use volume::Volume;
