//! # Tank Repository
//!
//! Storage tanks and their running stock.
//!
//! ## Exclusive Update Discipline
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Stock only moves through relative updates inside a transaction:       │
//! │                                                                         │
//! │    UPDATE tanks SET current_stock_ml = current_stock_ml + ?            │
//! │                                                                         │
//! │  sale     → movement = -delta_ml   (apply_movement, commit tx)          │
//! │  delivery → movement = +volume_ml  (refill, own tx)                     │
//! │                                                                         │
//! │  The engine additionally serializes writers per (station, fuel), so    │
//! │  the stock read used for level planning is the stock being updated.    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use crate::pool::begin_write;
use fuelrecon_core::{FuelType, InventoryLedger, InventoryResult, Tank, Volume};

const TANK_COLUMNS: &str = "id, station_id, fuel_type, capacity_ml, current_stock_ml, \
     low_level_ml, critical_level_ml, status, updated_at";

/// Repository for tank operations.
#[derive(Debug, Clone)]
pub struct TankRepository {
    pool: SqlitePool,
}

impl TankRepository {
    /// Creates a new TankRepository.
    pub fn new(pool: SqlitePool) -> Self {
        TankRepository { pool }
    }

    /// Inserts a tank.
    pub async fn insert(&self, tank: &Tank) -> DbResult<()> {
        debug!(id = %tank.id, fuel_type = %tank.fuel_type, "Inserting tank");

        sqlx::query(
            r#"
            INSERT INTO tanks (
                id, station_id, fuel_type, capacity_ml, current_stock_ml,
                low_level_ml, critical_level_ml, status, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
        )
        .bind(&tank.id)
        .bind(&tank.station_id)
        .bind(tank.fuel_type)
        .bind(tank.capacity_ml)
        .bind(tank.current_stock_ml)
        .bind(tank.low_level_ml)
        .bind(tank.critical_level_ml)
        .bind(tank.status)
        .bind(tank.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Gets a tank by ID.
    pub async fn get(&self, id: &str) -> DbResult<Option<Tank>> {
        let mut conn = self.pool.acquire().await?;
        Self::get_in(&mut conn, id).await
    }

    /// Gets a tank by ID on an existing connection or transaction.
    pub async fn get_in(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<Tank>> {
        let sql = format!("SELECT {TANK_COLUMNS} FROM tanks WHERE id = ?1");

        let tank = sqlx::query_as::<_, Tank>(&sql)
            .bind(id)
            .fetch_optional(conn)
            .await?;

        Ok(tank)
    }

    /// Active tank backing a station's fuel type.
    pub async fn find_for_fuel(&self, station_id: &str, fuel_type: FuelType) -> DbResult<Option<Tank>> {
        let mut conn = self.pool.acquire().await?;
        Self::find_for_fuel_in(&mut conn, station_id, fuel_type).await
    }

    /// Active tank backing a station's fuel type, on an existing connection.
    pub async fn find_for_fuel_in(
        conn: &mut SqliteConnection,
        station_id: &str,
        fuel_type: FuelType,
    ) -> DbResult<Option<Tank>> {
        let sql = format!(
            "SELECT {TANK_COLUMNS} FROM tanks \
             WHERE station_id = ?1 AND fuel_type = ?2 AND status = 'active'"
        );

        let tank = sqlx::query_as::<_, Tank>(&sql)
            .bind(station_id)
            .bind(fuel_type)
            .fetch_optional(conn)
            .await?;

        Ok(tank)
    }

    /// Lists a station's tanks.
    pub async fn list_by_station(&self, station_id: &str) -> DbResult<Vec<Tank>> {
        let sql = format!(
            "SELECT {TANK_COLUMNS} FROM tanks WHERE station_id = ?1 ORDER BY fuel_type, id"
        );

        let tanks = sqlx::query_as::<_, Tank>(&sql)
            .bind(station_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(tanks)
    }

    /// Applies a signed stock movement relative to the stored value.
    pub async fn apply_movement(
        conn: &mut SqliteConnection,
        id: &str,
        movement_ml: i64,
    ) -> DbResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE tanks
            SET current_stock_ml = current_stock_ml + ?2,
                updated_at = ?3
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(movement_ml)
        .bind(Utc::now())
        .execute(conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Tank", id));
        }

        Ok(())
    }

    /// Records a delivery into a tank.
    ///
    /// Capacity and positivity are checked by [`InventoryLedger::plan_refill`]
    /// against the stock read inside the same transaction.
    pub async fn refill(
        &self,
        id: &str,
        volume: Volume,
        ledger: &InventoryLedger,
    ) -> DbResult<InventoryResult> {
        let mut tx = begin_write(&self.pool).await?;

        let tank = Self::get_in(&mut tx, id)
            .await?
            .ok_or_else(|| DbError::not_found("Tank", id))?;

        let result = ledger.plan_refill(&tank, volume)?;
        Self::apply_movement(&mut tx, id, volume.ml()).await?;

        tx.commit().await?;

        info!(
            tank_id = %id,
            volume = %volume,
            new_stock = %result.new_stock,
            level = %result.level,
            "Tank refilled"
        );

        Ok(result)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
