//! # fuelrecon-engine: Reconciliation Engine for FuelRecon
//!
//! Turns a nozzle meter reading into a priced, payment-allocated sale and a
//! tank decrement, committed together or not at all.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Manual entry handler        OCR pipeline                               │
//! │        │ ManualReadingInput        │ OcrReadingInput                    │
//! │        ▼                           ▼                                    │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                fuelrecon-engine (THIS CRATE)                    │   │
//! │  │                                                                 │   │
//! │  │   ReconciliationEngine ──► KeyedLocks (nozzle, tank)            │   │
//! │  │        │        │                                               │   │
//! │  │        │        └──► ports: EventSink, QuotaChecker             │   │
//! │  │        ▼                                                        │   │
//! │  │   fuelrecon-core rules  +  fuelrecon-db transaction             │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │        │                                                                │
//! │        ▼                                                                │
//! │  CommitOutcome / Rejection { code, message }                            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`engine`] - Commit orchestration, approvals, reports
//! - [`config`] - engine.toml + environment configuration
//! - [`locks`] - Bounded-wait keyed locks
//! - [`ports`] - Audit, alert and quota collaborators
//! - [`error`] - Engine errors and caller-facing codes
//!
//! ## Usage
//!
//! ```rust,ignore
//! use fuelrecon_db::{Database, DbConfig};
//! use fuelrecon_engine::{EngineConfig, ReconciliationEngine};
//!
//! let db = Database::new(DbConfig::new("station.db")).await?;
//! let engine = ReconciliationEngine::new(db, EngineConfig::load(None)?);
//!
//! match engine.commit_manual(&input, Utc::now()).await {
//!     Ok(outcome) => println!("recorded {}", outcome.reading_id()),
//!     Err(err) => return Err(Rejection::from(err)),
//! }
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod config;
pub mod engine;
pub mod error;
pub mod locks;
pub mod ports;

// =============================================================================
// Re-exports
// =============================================================================

pub use config::EngineConfig;
pub use engine::{CommitOutcome, CommittedReading, ReconciliationEngine, TankStatusView};
pub use error::{EngineError, EngineResult, ErrorKind, Rejection};
pub use locks::KeyedLocks;
pub use ports::{
    AuditOutcome, ChannelSink, CommitAuditEvent, EngineEvent, EventSink, NoOpSink,
    QuotaChecker, QuotaDecision, TracingSink, Unlimited,
};
