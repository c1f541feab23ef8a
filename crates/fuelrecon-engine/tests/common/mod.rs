//! Shared fixture for engine integration tests.
//!
//! One station `S-1` with pump `MPD-0042`:
//!
//! | Nozzle | # | Fuel   | Meter        | Priced | Tank                 |
//! |--------|---|--------|--------------|--------|----------------------|
//! | N-1    | 1 | petrol | 1,000 L      | ₹100/L | T-PET, 20,000 L cap  |
//! | N-2    | 2 | petrol | 999,900 L    | ₹100/L | T-PET                |
//! | N-3    | 3 | diesel | 500 L        | no     | none                 |

#![allow(dead_code)]

use std::sync::{Arc, Once};

use chrono::{DateTime, TimeZone, Utc};
use tempfile::TempDir;
use tokio::sync::mpsc::UnboundedReceiver;

use fuelrecon_core::{
    Actor, FuelType, Money, Nozzle, NozzleRef, NozzleStatus, PaymentBreakdown, ReadingCandidate,
    ReadingSource, Role, Tank, TankStatus, Volume,
};
use fuelrecon_db::{Database, DbConfig};
use fuelrecon_engine::{
    ChannelSink, EngineConfig, EngineEvent, KeyedLocks, QuotaChecker, ReconciliationEngine,
    Unlimited,
};

pub const STATION: &str = "S-1";
pub const PUMP_SERIAL: &str = "MPD-0042";
pub const PETROL_TANK: &str = "T-PET";

static INIT: Once = Once::new();

pub fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter("warn,fuelrecon_engine=debug")
            .with_test_writer()
            .try_init()
            .ok();
    });
}

pub fn at(hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, hour, minute, 0).unwrap()
}

pub fn attendant() -> Actor {
    Actor::new("att-1", Role::Attendant)
}

pub fn manager() -> Actor {
    Actor::new("mgr-1", Role::Manager)
}

pub fn owner() -> Actor {
    Actor::new("own-1", Role::Owner)
}

pub fn rupees(amount: i64) -> Money {
    Money::from_paise(amount * 100)
}

/// Manual candidate at 10:00 on the fixture day.
pub fn candidate(nozzle_id: &str, litres: i64, payments: Option<PaymentBreakdown>) -> ReadingCandidate {
    ReadingCandidate {
        nozzle: NozzleRef::Id(nozzle_id.to_string()),
        cumulative: Volume::from_litres(litres),
        reading_at: at(10, 0),
        source: ReadingSource::Manual,
        source_upload_id: None,
        submitted_by: attendant(),
        payments,
    }
}

pub fn nozzle(id: &str, number: i64, fuel_type: FuelType, litres: i64) -> Nozzle {
    Nozzle {
        id: id.to_string(),
        station_id: STATION.to_string(),
        pump_id: "P-1".to_string(),
        nozzle_number: number,
        fuel_type,
        status: NozzleStatus::Active,
        last_cumulative_ml: Volume::from_litres(litres).ml(),
        last_reading_at: None,
    }
}

pub struct Fixture {
    pub engine: Arc<ReconciliationEngine>,
    pub locks: Arc<KeyedLocks>,
    pub events: UnboundedReceiver<EngineEvent>,
    /// Keeps the database file alive for file-backed fixtures.
    _dir: Option<TempDir>,
}

impl Fixture {
    pub async fn new() -> Self {
        Self::build(EngineConfig::default(), 10_000, Arc::new(Unlimited)).await
    }

    pub async fn with_config(config: EngineConfig) -> Self {
        Self::build(config, 10_000, Arc::new(Unlimited)).await
    }

    pub async fn build(
        config: EngineConfig,
        petrol_stock_litres: i64,
        quota: Arc<dyn QuotaChecker>,
    ) -> Self {
        init_tracing();

        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        Self::assemble(db, None, config, petrol_stock_litres, quota).await
    }

    /// Same station on a WAL database file behind a multi-connection pool,
    /// so concurrent commits really hold separate connections.
    pub async fn on_file() -> Self {
        init_tracing();

        let dir = tempfile::tempdir().unwrap();
        let db = Database::new(
            DbConfig::new(dir.path().join("station.db"))
                .max_connections(8)
                .min_connections(2),
        )
        .await
        .unwrap();
        Self::assemble(db, Some(dir), EngineConfig::default(), 10_000, Arc::new(Unlimited)).await
    }

    async fn assemble(
        db: Database,
        dir: Option<TempDir>,
        config: EngineConfig,
        petrol_stock_litres: i64,
        quota: Arc<dyn QuotaChecker>,
    ) -> Self {
        seed(&db, petrol_stock_litres).await;

        let (sink, events) = ChannelSink::channel();
        let locks = Arc::new(KeyedLocks::new());
        let engine = ReconciliationEngine::with_ports(db, config, Arc::new(sink), quota)
            .with_locks(locks.clone());

        Fixture {
            engine: Arc::new(engine),
            locks,
            events,
            _dir: dir,
        }
    }

    /// Adds a station with one pump, one priced petrol nozzle at 0 L and its
    /// own tank holding `stock_litres`. Returns the nozzle id.
    pub async fn add_station(&self, station_id: &str, stock_litres: i64) -> String {
        let db = self.db();
        let pump_id = format!("{station_id}-P");
        let nozzle_id = format!("{station_id}-N");

        db.nozzles()
            .insert_pump(&pump_id, station_id, &format!("{station_id}-SERIAL"), None)
            .await
            .unwrap();
        db.nozzles()
            .insert(&Nozzle {
                id: nozzle_id.clone(),
                station_id: station_id.to_string(),
                pump_id,
                nozzle_number: 1,
                fuel_type: FuelType::Petrol,
                status: NozzleStatus::Active,
                last_cumulative_ml: 0,
                last_reading_at: None,
            })
            .await
            .unwrap();
        db.prices()
            .set_price(station_id, FuelType::Petrol, rupees(100), at(0, 0), "own-1")
            .await
            .unwrap();
        db.tanks()
            .insert(&petrol_tank(&format!("{station_id}-T"), station_id, stock_litres))
            .await
            .unwrap();

        nozzle_id
    }

    pub async fn tank_stock(&self, tank_id: &str) -> Volume {
        self.db()
            .tanks()
            .get(tank_id)
            .await
            .unwrap()
            .unwrap()
            .current_stock()
    }

    pub fn db(&self) -> &Database {
        self.engine.db()
    }

    /// Everything emitted so far.
    pub fn drain_events(&mut self) -> Vec<EngineEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            events.push(event);
        }
        events
    }

    pub async fn petrol_stock(&self) -> Volume {
        self.db()
            .tanks()
            .get(PETROL_TANK)
            .await
            .unwrap()
            .unwrap()
            .current_stock()
    }

    pub async fn meter(&self, nozzle_id: &str) -> Volume {
        self.db()
            .nozzles()
            .get(nozzle_id)
            .await
            .unwrap()
            .unwrap()
            .last_cumulative()
    }

    pub async fn reading_count(&self, nozzle_id: &str) -> i64 {
        self.db().readings().count_for_nozzle(nozzle_id).await.unwrap()
    }
}

async fn seed(db: &Database, petrol_stock_litres: i64) {
    db.nozzles()
        .insert_pump("P-1", STATION, PUMP_SERIAL, Some("Island 1"))
        .await
        .unwrap();

    db.nozzles().insert(&nozzle("N-1", 1, FuelType::Petrol, 1_000)).await.unwrap();
    db.nozzles().insert(&nozzle("N-2", 2, FuelType::Petrol, 999_900)).await.unwrap();
    db.nozzles().insert(&nozzle("N-3", 3, FuelType::Diesel, 500)).await.unwrap();

    db.prices()
        .set_price(STATION, FuelType::Petrol, rupees(100), at(0, 0), "own-1")
        .await
        .unwrap();

    db.tanks()
        .insert(&petrol_tank(PETROL_TANK, STATION, petrol_stock_litres))
        .await
        .unwrap();
}

fn petrol_tank(id: &str, station_id: &str, stock_litres: i64) -> Tank {
    Tank {
        id: id.to_string(),
        station_id: station_id.to_string(),
        fuel_type: FuelType::Petrol,
        capacity_ml: Volume::from_litres(20_000).ml(),
        current_stock_ml: Volume::from_litres(stock_litres).ml(),
        low_level_ml: Volume::from_litres(2_000).ml(),
        critical_level_ml: Volume::from_litres(500).ml(),
        status: TankStatus::Active,
        updated_at: at(0, 0),
    }
}
