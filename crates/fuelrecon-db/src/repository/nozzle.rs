//! # Nozzle Repository
//!
//! Lookups for nozzles and the pumps that carry them, plus the one write a
//! committed reading makes: moving the nozzle's last cumulative value.
//!
//! ## Identity
//! ```text
//! manual entry  ── nozzle id ──────────────────────────► get()
//! OCR receipt   ── pump serial + nozzle number ─► pumps ⋈ nozzles
//!                                                       find_by_pump_slot()
//! ```

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use fuelrecon_core::{Nozzle, NozzleStatus};

const NOZZLE_COLUMNS: &str = "n.id, n.station_id, n.pump_id, n.nozzle_number, n.fuel_type, \
     n.status, n.last_cumulative_ml, n.last_reading_at";

/// Repository for nozzle database operations.
#[derive(Debug, Clone)]
pub struct NozzleRepository {
    pool: SqlitePool,
}

impl NozzleRepository {
    /// Creates a new NozzleRepository.
    pub fn new(pool: SqlitePool) -> Self {
        NozzleRepository { pool }
    }

    /// Registers a pump.
    pub async fn insert_pump(
        &self,
        id: &str,
        station_id: &str,
        serial: &str,
        name: Option<&str>,
    ) -> DbResult<()> {
        debug!(id = %id, serial = %serial, "Inserting pump");

        sqlx::query(
            r#"
            INSERT INTO pumps (id, station_id, serial, name, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
        )
        .bind(id)
        .bind(station_id)
        .bind(serial)
        .bind(name)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Inserts a nozzle with its installation meter value.
    pub async fn insert(&self, nozzle: &Nozzle) -> DbResult<()> {
        debug!(id = %nozzle.id, pump_id = %nozzle.pump_id, "Inserting nozzle");

        sqlx::query(
            r#"
            INSERT INTO nozzles (
                id, station_id, pump_id, nozzle_number, fuel_type,
                status, last_cumulative_ml, last_reading_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )
        .bind(&nozzle.id)
        .bind(&nozzle.station_id)
        .bind(&nozzle.pump_id)
        .bind(nozzle.nozzle_number)
        .bind(nozzle.fuel_type)
        .bind(nozzle.status)
        .bind(nozzle.last_cumulative_ml)
        .bind(nozzle.last_reading_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Gets a nozzle by ID.
    pub async fn get(&self, id: &str) -> DbResult<Option<Nozzle>> {
        let mut conn = self.pool.acquire().await?;
        Self::get_in(&mut conn, id).await
    }

    /// Gets a nozzle by ID on an existing connection or transaction.
    pub async fn get_in(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<Nozzle>> {
        let sql = format!("SELECT {NOZZLE_COLUMNS} FROM nozzles n WHERE n.id = ?1");

        let nozzle = sqlx::query_as::<_, Nozzle>(&sql)
            .bind(id)
            .fetch_optional(conn)
            .await?;

        Ok(nozzle)
    }

    /// Resolves a receipt's pump serial and nozzle position to a nozzle.
    ///
    /// A serial registered at more than one station is ambiguous and
    /// reported as a duplicate rather than guessed.
    pub async fn find_by_pump_slot(
        &self,
        pump_serial: &str,
        nozzle_number: i64,
    ) -> DbResult<Option<Nozzle>> {
        let sql = format!(
            "SELECT {NOZZLE_COLUMNS} FROM nozzles n \
             JOIN pumps p ON p.id = n.pump_id \
             WHERE p.serial = ?1 AND n.nozzle_number = ?2 \
             ORDER BY n.id"
        );

        let mut matches = sqlx::query_as::<_, Nozzle>(&sql)
            .bind(pump_serial)
            .bind(nozzle_number)
            .fetch_all(&self.pool)
            .await?;

        match matches.len() {
            0 => Ok(None),
            1 => Ok(matches.pop()),
            _ => Err(DbError::duplicate("pumps.serial", pump_serial)),
        }
    }

    /// Lists a station's nozzles in pump / position order.
    pub async fn list_by_station(&self, station_id: &str) -> DbResult<Vec<Nozzle>> {
        let sql = format!(
            "SELECT {NOZZLE_COLUMNS} FROM nozzles n \
             WHERE n.station_id = ?1 \
             ORDER BY n.pump_id, n.nozzle_number"
        );

        let nozzles = sqlx::query_as::<_, Nozzle>(&sql)
            .bind(station_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(nozzles)
    }

    /// Changes the operational status of a nozzle.
    pub async fn set_status(&self, id: &str, status: NozzleStatus) -> DbResult<()> {
        debug!(id = %id, status = %status, "Updating nozzle status");

        let result = sqlx::query("UPDATE nozzles SET status = ?2 WHERE id = ?1")
            .bind(id)
            .bind(status)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Nozzle", id));
        }

        Ok(())
    }

    /// Moves the nozzle's last cumulative value. Called only from inside a
    /// reading commit transaction.
    pub async fn record_reading(
        conn: &mut SqliteConnection,
        id: &str,
        cumulative_ml: i64,
        reading_at: DateTime<Utc>,
    ) -> DbResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE nozzles
            SET last_cumulative_ml = ?2,
                last_reading_at = ?3
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(cumulative_ml)
        .bind(reading_at)
        .execute(conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Nozzle", id));
        }

        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
