//! # Seed Data Generator
//!
//! Populates a database with a development station.
//!
//! ## Usage
//! ```bash
//! # Seed one station with 4 pumps (default)
//! cargo run -p fuelrecon-db --bin seed
//!
//! # More pumps, custom station and database path
//! cargo run -p fuelrecon-db --bin seed -- --pumps 8 --station stn-2 --db ./data/fuelrecon.db
//! ```
//!
//! ## Generated Data
//! - Pumps `MPD-0001..` with two nozzles each (petrol, diesel)
//! - Nozzles starting at realistic non-zero meter values
//! - One open price per fuel type from midnight today
//! - One tank per fuel type with low/critical thresholds
//!
//! Logging follows `RUST_LOG` (default `info`).

use chrono::Utc;
use std::env;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use fuelrecon_core::{FuelType, Money, Nozzle, NozzleStatus, Tank, TankStatus, Volume};
use fuelrecon_db::{Database, DbConfig};

/// Fuel grades seeded per station: (fuel, price paise/L, tank capacity L).
const GRADES: &[(FuelType, i64, i64)] = &[
    (FuelType::Petrol, 10_272, 20_000),
    (FuelType::Diesel, 8_962, 25_000),
];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args: Vec<String> = env::args().collect();

    let mut pumps: usize = 4;
    let mut station_id = String::from("stn-dev-1");
    let mut db_path = String::from("./fuelrecon_dev.db");

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--pumps" | "-p" => {
                if i + 1 < args.len() {
                    pumps = args[i + 1].parse().unwrap_or(4);
                    i += 1;
                }
            }
            "--station" | "-s" => {
                if i + 1 < args.len() {
                    station_id = args[i + 1].clone();
                    i += 1;
                }
            }
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = args[i + 1].clone();
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("FuelRecon Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -p, --pumps <N>      Number of pumps to create (default: 4)");
                println!("  -s, --station <ID>   Station id (default: stn-dev-1)");
                println!("  -d, --db <PATH>      Database file path (default: ./fuelrecon_dev.db)");
                println!("  -h, --help           Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    info!(db = %db_path, station_id = %station_id, pumps, "Seeding station");

    let db = Database::new(DbConfig::new(&db_path)).await?;

    let existing = db.nozzles().list_by_station(&station_id).await?;
    if !existing.is_empty() {
        warn!(
            nozzles = existing.len(),
            "Station already has nozzles; skipping seed. Delete the database file to regenerate."
        );
        return Ok(());
    }

    let now = Utc::now();
    let midnight = now
        .date_naive()
        .and_hms_opt(0, 0, 0)
        .map(|dt| dt.and_utc())
        .unwrap_or(now);

    for (fuel_type, price_paise, capacity_litres) in GRADES {
        db.prices()
            .set_price(&station_id, *fuel_type, Money::from_paise(*price_paise), midnight, "seed")
            .await?;

        let capacity = Volume::from_litres(*capacity_litres);
        db.tanks()
            .insert(&Tank {
                id: Uuid::new_v4().to_string(),
                station_id: station_id.clone(),
                fuel_type: *fuel_type,
                capacity_ml: capacity.ml(),
                current_stock_ml: capacity.ml() * 3 / 4,
                low_level_ml: capacity.ml() / 10,
                critical_level_ml: capacity.ml() / 40,
                status: TankStatus::Active,
                updated_at: now,
            })
            .await?;
    }

    let mut nozzle_count = 0;
    for pump_idx in 1..=pumps {
        let pump_id = Uuid::new_v4().to_string();
        let serial = format!("MPD-{:04}", pump_idx);
        db.nozzles()
            .insert_pump(&pump_id, &station_id, &serial, Some(&format!("Island {}", pump_idx)))
            .await?;

        for (position, (fuel_type, _, _)) in GRADES.iter().enumerate() {
            // Meters left the factory long ago
            let start = Volume::from_ml(((pump_idx * 7_919 + position * 104_729) % 900_000) as i64 * 1_000);
            db.nozzles()
                .insert(&Nozzle {
                    id: Uuid::new_v4().to_string(),
                    station_id: station_id.clone(),
                    pump_id: pump_id.clone(),
                    nozzle_number: position as i64 + 1,
                    fuel_type: *fuel_type,
                    status: NozzleStatus::Active,
                    last_cumulative_ml: start.ml(),
                    last_reading_at: None,
                })
                .await?;
            nozzle_count += 1;
        }
    }

    info!(
        pumps,
        nozzles = nozzle_count,
        grades = GRADES.len(),
        "Seed complete"
    );

    Ok(())
}
