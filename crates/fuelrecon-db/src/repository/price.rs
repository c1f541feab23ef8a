//! # Price Repository
//!
//! Time-bounded price records per station and fuel type.
//!
//! ## Setting a Price
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  BEGIN                                                                  │
//! │    open = record with valid_until IS NULL                               │
//! │    check: new.valid_from > open.valid_from   (else PriceWindowOverlap)  │
//! │    UPDATE open SET valid_until = new.valid_from                         │
//! │    INSERT new (valid_until NULL)                                        │
//! │  COMMIT                                                                 │
//! │                                                                         │
//! │  Records are closed, never deleted; committed readings keep pointing   │
//! │  at the record whose price they snapshot.                               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::DbResult;
use crate::pool::begin_write;
use fuelrecon_core::pricing::check_price_change;
use fuelrecon_core::{FuelType, Money, PriceRecord, PriceResolver};

const PRICE_COLUMNS: &str =
    "id, station_id, fuel_type, price_per_litre_paise, valid_from, valid_until, set_by";

/// Repository for price record operations.
#[derive(Debug, Clone)]
pub struct PriceRepository {
    pool: SqlitePool,
}

impl PriceRepository {
    /// Creates a new PriceRepository.
    pub fn new(pool: SqlitePool) -> Self {
        PriceRepository { pool }
    }

    /// Inserts a record as-is. Used for imports and fixtures; day-to-day
    /// changes go through [`PriceRepository::set_price`].
    pub async fn insert(&self, record: &PriceRecord) -> DbResult<()> {
        let mut conn = self.pool.acquire().await?;
        insert_record(&mut conn, record).await
    }

    /// Sets a new price from `valid_from`, closing the open record.
    pub async fn set_price(
        &self,
        station_id: &str,
        fuel_type: FuelType,
        price_per_litre: Money,
        valid_from: DateTime<Utc>,
        set_by: &str,
    ) -> DbResult<PriceRecord> {
        let mut tx = begin_write(&self.pool).await?;

        let open = open_record(&mut tx, station_id, fuel_type).await?;
        check_price_change(open.as_ref(), fuel_type, price_per_litre, valid_from)?;

        if let Some(open) = &open {
            sqlx::query("UPDATE price_records SET valid_until = ?2 WHERE id = ?1")
                .bind(&open.id)
                .bind(valid_from)
                .execute(&mut *tx)
                .await?;
        }

        let record = PriceRecord {
            id: Uuid::new_v4().to_string(),
            station_id: station_id.to_string(),
            fuel_type,
            price_per_litre_paise: price_per_litre.paise(),
            valid_from,
            valid_until: None,
            set_by: set_by.to_string(),
        };
        insert_record(&mut tx, &record).await?;

        tx.commit().await?;

        info!(
            station_id = %station_id,
            fuel_type = %fuel_type,
            price = %price_per_litre,
            valid_from = %valid_from,
            closed = ?open.map(|r| r.id),
            "Price set"
        );

        Ok(record)
    }

    /// All records for a station and fuel type, newest first.
    pub async fn history(&self, station_id: &str, fuel_type: FuelType) -> DbResult<Vec<PriceRecord>> {
        let sql = format!(
            "SELECT {PRICE_COLUMNS} FROM price_records \
             WHERE station_id = ?1 AND fuel_type = ?2 \
             ORDER BY valid_from DESC, id DESC"
        );

        let records = sqlx::query_as::<_, PriceRecord>(&sql)
            .bind(station_id)
            .bind(fuel_type)
            .fetch_all(&self.pool)
            .await?;

        Ok(records)
    }

    /// Builds a resolver over a station's records for one fuel type.
    pub async fn resolver_for(&self, station_id: &str, fuel_type: FuelType) -> DbResult<PriceResolver> {
        let records = self.history(station_id, fuel_type).await?;
        debug!(
            station_id = %station_id,
            fuel_type = %fuel_type,
            records = records.len(),
            "Loaded price records"
        );
        Ok(PriceResolver::new(records))
    }

    /// The currently open record, if any.
    pub async fn current(&self, station_id: &str, fuel_type: FuelType) -> DbResult<Option<PriceRecord>> {
        let mut conn = self.pool.acquire().await?;
        open_record(&mut conn, station_id, fuel_type).await
    }
}

async fn open_record(
    conn: &mut SqliteConnection,
    station_id: &str,
    fuel_type: FuelType,
) -> DbResult<Option<PriceRecord>> {
    let sql = format!(
        "SELECT {PRICE_COLUMNS} FROM price_records \
         WHERE station_id = ?1 AND fuel_type = ?2 AND valid_until IS NULL \
         ORDER BY valid_from DESC, id DESC \
         LIMIT 1"
    );

    let record = sqlx::query_as::<_, PriceRecord>(&sql)
        .bind(station_id)
        .bind(fuel_type)
        .fetch_optional(conn)
        .await?;

    Ok(record)
}

async fn insert_record(conn: &mut SqliteConnection, record: &PriceRecord) -> DbResult<()> {
    debug!(id = %record.id, fuel_type = %record.fuel_type, "Inserting price record");

    sqlx::query(
        r#"
        INSERT INTO price_records (
            id, station_id, fuel_type, price_per_litre_paise,
            valid_from, valid_until, set_by
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
        "#,
    )
    .bind(&record.id)
    .bind(&record.station_id)
    .bind(record.fuel_type)
    .bind(record.price_per_litre_paise)
    .bind(record.valid_from)
    .bind(record.valid_until)
    .bind(&record.set_by)
    .execute(conn)
    .await?;

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DbError;
    use crate::pool::{Database, DbConfig};
    use chrono::TimeZone;
    use fuelrecon_core::CoreError;

    fn at(h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, h, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn test_set_price_closes_open_record() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.prices();

        let first = repo
            .set_price("S-1", FuelType::Petrol, Money::from_paise(10_000), at(6), "own-1")
            .await
            .unwrap();
        let second = repo
            .set_price("S-1", FuelType::Petrol, Money::from_paise(10_250), at(18), "own-1")
            .await
            .unwrap();

        let history = repo.history("S-1", FuelType::Petrol).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].id, second.id);
        assert_eq!(history[0].valid_until, None);
        assert_eq!(history[1].id, first.id);
        assert_eq!(history[1].valid_until, Some(at(18)));

        let current = repo.current("S-1", FuelType::Petrol).await.unwrap().unwrap();
        assert_eq!(current.id, second.id);
    }

    #[tokio::test]
    async fn test_set_price_rejects_overlap() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.prices();

        repo.set_price("S-1", FuelType::Diesel, Money::from_paise(9_000), at(10), "own-1")
            .await
            .unwrap();
        let err = repo
            .set_price("S-1", FuelType::Diesel, Money::from_paise(9_100), at(10), "own-1")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DbError::Domain(CoreError::PriceWindowOverlap { .. })
        ));

        // Failed change left the open record untouched
        let history = repo.history("S-1", FuelType::Diesel).await.unwrap();
        assert_eq!(history.len(), 1);
        assert!(history[0].valid_until.is_none());
    }

    #[tokio::test]
    async fn test_resolver_reads_back_windows() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.prices();

        repo.set_price("S-1", FuelType::Petrol, Money::from_paise(10_000), at(6), "own-1")
            .await
            .unwrap();
        repo.set_price("S-1", FuelType::Petrol, Money::from_paise(10_250), at(18), "own-1")
            .await
            .unwrap();

        let resolver = repo.resolver_for("S-1", FuelType::Petrol).await.unwrap();
        let morning = resolver.resolve("S-1", FuelType::Petrol, at(9)).unwrap();
        assert_eq!(morning.price_per_litre_paise, 10_000);
        let evening = resolver.resolve("S-1", FuelType::Petrol, at(20)).unwrap();
        assert_eq!(evening.price_per_litre_paise, 10_250);
        assert!(resolver.resolve("S-1", FuelType::Petrol, at(5)).is_err());
    }
}
