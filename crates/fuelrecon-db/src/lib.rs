//! # fuelrecon-db: Database Layer for FuelRecon
//!
//! SQLite storage for nozzles, price windows, tanks and committed readings,
//! using sqlx for async access.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        FuelRecon Data Flow                              │
//! │                                                                         │
//! │  ReconciliationEngine::commit(candidate)                               │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                  fuelrecon-db (THIS CRATE)                      │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌────────────────┐    ┌──────────────┐  │   │
//! │  │   │   Database    │    │  Repositories  │    │  Migrations  │  │   │
//! │  │   │   (pool.rs)   │    │                │    │  (embedded)  │  │   │
//! │  │   │               │    │ NozzleRepo     │    │ 001_initial_ │  │   │
//! │  │   │ SqlitePool    │◄───│ PriceRepo      │    │   schema.sql │  │   │
//! │  │   │ begin() → tx  │    │ ReadingRepo    │    │              │  │   │
//! │  │   │               │    │ TankRepo       │    │              │  │   │
//! │  │   └───────────────┘    └────────────────┘    └──────────────┘  │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite database file (WAL)                                             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`repository`] - Repository implementations
//!
//! ## Usage
//!
//! ```rust,ignore
//! use fuelrecon_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("station.db")).await?;
//! let pending = db.readings().pending("station-1").await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};

pub use repository::nozzle::NozzleRepository;
pub use repository::price::PriceRepository;
pub use repository::reading::{DailySummary, FuelSummary, ReadingFilter, ReadingRepository};
pub use repository::tank::TankRepository;
