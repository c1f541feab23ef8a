//! # Repository Module
//!
//! Database repository implementations for FuelRecon.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  ReconciliationEngine                                                   │
//! │       │                                                                 │
//! │       ├── db.nozzles()  → NozzleRepository   pumps + nozzles            │
//! │       ├── db.prices()   → PriceRepository    validity windows           │
//! │       ├── db.readings() → ReadingRepository  readings / sales, reports  │
//! │       └── db.tanks()    → TankRepository     stock ledger               │
//! │                                                                         │
//! │  Methods taking `&self` borrow a pooled connection per call.            │
//! │  Associated functions taking `&mut SqliteConnection` run on a caller's  │
//! │  transaction; the commit path uses only these.                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

pub mod nozzle;
pub mod price;
pub mod reading;
pub mod tank;
