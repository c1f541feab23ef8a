//! # Reading Repository
//!
//! Committed readings (each one is also the sale it produced) and the
//! queries reporting runs over them.
//!
//! ## Reading Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Reading Lifecycle                                 │
//! │                                                                         │
//! │  1. COMMIT (inside the engine's transaction)                           │
//! │     └── find_duplicate() → None                                        │
//! │     └── insert()         → Reading { status: pending }                 │
//! │                                                                         │
//! │  2. DECIDE (own statement, no commit locks)                            │
//! │     └── apply_decision() → UPDATE ... WHERE status = 'pending'         │
//! │         rows_affected = 0 → someone else decided first                 │
//! │                                                                         │
//! │  Nothing else is ever updated; nothing is ever deleted.                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use fuelrecon_core::{
    ApprovalStatus, Decision, FuelType, Money, PaymentBreakdown, Reading, Volume,
};

const READING_COLUMNS: &str = "id, station_id, nozzle_id, fuel_type, source, source_upload_id, \
     previous_cumulative_ml, cumulative_ml, delta_ml, is_rollover, reading_at, reading_date, \
     unit_price_paise, price_record_id, total_paise, \
     cash_paise, upi_paise, card_paise, credit_paise, fleet_card_paise, wallet_paise, \
     status, submitted_by, approved_by, rejection_reason, tank_id, created_at, decided_at";

/// Rows returned by [`ReadingRepository::list`] when no limit is given.
pub const DEFAULT_LIST_LIMIT: i64 = 100;

// =============================================================================
// Query Types
// =============================================================================

/// Filter for reading listings. Unset fields match everything.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadingFilter {
    pub station_id: Option<String>,
    pub nozzle_id: Option<String>,
    pub status: Option<ApprovalStatus>,
    /// Inclusive lower bound on reading date.
    pub from_date: Option<NaiveDate>,
    /// Inclusive upper bound on reading date.
    pub to_date: Option<NaiveDate>,
    pub limit: Option<i64>,
}

impl ReadingFilter {
    pub fn station(station_id: impl Into<String>) -> Self {
        ReadingFilter {
            station_id: Some(station_id.into()),
            ..ReadingFilter::default()
        }
    }
}

/// Litres and takings for one fuel type on one day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FuelSummary {
    pub fuel_type: FuelType,
    pub volume: Volume,
    pub amount: Money,
    pub readings: i64,
}

/// One station's day. Rejected readings are left out of every total.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailySummary {
    pub station_id: String,
    pub date: NaiveDate,
    pub by_fuel: Vec<FuelSummary>,
    pub payments: PaymentBreakdown,
    pub total_amount: Money,
    pub reading_count: i64,
    pub pending_count: i64,
}

#[derive(sqlx::FromRow)]
struct FuelTotalsRow {
    fuel_type: FuelType,
    delta_ml: i64,
    total_paise: i64,
    readings: i64,
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for reading operations.
#[derive(Debug, Clone)]
pub struct ReadingRepository {
    pool: SqlitePool,
}

impl ReadingRepository {
    /// Creates a new ReadingRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ReadingRepository { pool }
    }

    /// Gets a reading by ID.
    pub async fn get(&self, id: &str) -> DbResult<Option<Reading>> {
        let sql = format!("SELECT {READING_COLUMNS} FROM readings WHERE id = ?1");

        let reading = sqlx::query_as::<_, Reading>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(reading)
    }

    /// Id of an existing reading with the same nozzle, date and meter value.
    pub async fn find_duplicate(
        conn: &mut SqliteConnection,
        nozzle_id: &str,
        reading_date: NaiveDate,
        cumulative_ml: i64,
    ) -> DbResult<Option<String>> {
        let id: Option<String> = sqlx::query_scalar(
            r#"
            SELECT id FROM readings
            WHERE nozzle_id = ?1 AND reading_date = ?2 AND cumulative_ml = ?3
            "#,
        )
        .bind(nozzle_id)
        .bind(reading_date)
        .bind(cumulative_ml)
        .fetch_optional(conn)
        .await?;

        Ok(id)
    }

    /// Inserts a committed reading. Called only inside a commit transaction.
    pub async fn insert(conn: &mut SqliteConnection, reading: &Reading) -> DbResult<()> {
        debug!(id = %reading.id, nozzle_id = %reading.nozzle_id, "Inserting reading");

        let p = &reading.payments;
        sqlx::query(
            r#"
            INSERT INTO readings (
                id, station_id, nozzle_id, fuel_type, source, source_upload_id,
                previous_cumulative_ml, cumulative_ml, delta_ml, is_rollover,
                reading_at, reading_date,
                unit_price_paise, price_record_id, total_paise,
                cash_paise, upi_paise, card_paise, credit_paise, fleet_card_paise, wallet_paise,
                status, submitted_by, approved_by, rejection_reason, tank_id,
                created_at, decided_at
            ) VALUES (
                ?1, ?2, ?3, ?4, ?5, ?6,
                ?7, ?8, ?9, ?10,
                ?11, ?12,
                ?13, ?14, ?15,
                ?16, ?17, ?18, ?19, ?20, ?21,
                ?22, ?23, ?24, ?25, ?26,
                ?27, ?28
            )
            "#,
        )
        .bind(&reading.id)
        .bind(&reading.station_id)
        .bind(&reading.nozzle_id)
        .bind(reading.fuel_type)
        .bind(reading.source)
        .bind(&reading.source_upload_id)
        .bind(reading.previous_cumulative_ml)
        .bind(reading.cumulative_ml)
        .bind(reading.delta_ml)
        .bind(reading.is_rollover)
        .bind(reading.reading_at)
        .bind(reading.reading_date)
        .bind(reading.unit_price_paise)
        .bind(&reading.price_record_id)
        .bind(reading.total_paise)
        .bind(p.cash_paise)
        .bind(p.upi_paise)
        .bind(p.card_paise)
        .bind(p.credit_paise)
        .bind(p.fleet_card_paise)
        .bind(p.wallet_paise)
        .bind(reading.status)
        .bind(&reading.submitted_by)
        .bind(&reading.approved_by)
        .bind(&reading.rejection_reason)
        .bind(&reading.tank_id)
        .bind(reading.created_at)
        .bind(reading.decided_at)
        .execute(conn)
        .await?;

        Ok(())
    }

    /// Writes an approval decision if the reading is still pending.
    ///
    /// Returns `false` when the reading was already decided (or is missing);
    /// the caller re-reads it to report the current status.
    pub async fn apply_decision(&self, decision: &Decision) -> DbResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE readings
            SET status = ?2,
                approved_by = ?3,
                rejection_reason = ?4,
                decided_at = ?5
            WHERE id = ?1 AND status = 'pending'
            "#,
        )
        .bind(&decision.reading_id)
        .bind(decision.status)
        .bind(&decision.decided_by)
        .bind(&decision.reason)
        .bind(decision.decided_at)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Lists readings matching `filter`, newest first.
    pub async fn list(&self, filter: &ReadingFilter) -> DbResult<Vec<Reading>> {
        let mut qb: QueryBuilder<Sqlite> =
            QueryBuilder::new(format!("SELECT {READING_COLUMNS} FROM readings WHERE 1 = 1"));

        if let Some(station_id) = &filter.station_id {
            qb.push(" AND station_id = ").push_bind(station_id.clone());
        }
        if let Some(nozzle_id) = &filter.nozzle_id {
            qb.push(" AND nozzle_id = ").push_bind(nozzle_id.clone());
        }
        if let Some(status) = filter.status {
            qb.push(" AND status = ").push_bind(status);
        }
        if let Some(from) = filter.from_date {
            qb.push(" AND reading_date >= ").push_bind(from);
        }
        if let Some(to) = filter.to_date {
            qb.push(" AND reading_date <= ").push_bind(to);
        }

        let limit = filter.limit.unwrap_or(DEFAULT_LIST_LIMIT).max(1);
        qb.push(" ORDER BY reading_at DESC, id DESC LIMIT ").push_bind(limit);

        let readings = qb.build_query_as::<Reading>().fetch_all(&self.pool).await?;
        Ok(readings)
    }

    /// Readings awaiting a decision at a station, oldest first.
    pub async fn pending(&self, station_id: &str) -> DbResult<Vec<Reading>> {
        let sql = format!(
            "SELECT {READING_COLUMNS} FROM readings \
             WHERE station_id = ?1 AND status = 'pending' \
             ORDER BY reading_at ASC, id ASC"
        );

        let readings = sqlx::query_as::<_, Reading>(&sql)
            .bind(station_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(readings)
    }

    /// Number of readings recorded against a nozzle.
    pub async fn count_for_nozzle(&self, nozzle_id: &str) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM readings WHERE nozzle_id = ?1")
            .bind(nozzle_id)
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }

    /// Per-fuel and per-payment-method totals for one station day.
    pub async fn daily_summary(&self, station_id: &str, date: NaiveDate) -> DbResult<DailySummary> {
        let fuel_rows = sqlx::query_as::<_, FuelTotalsRow>(
            r#"
            SELECT
                fuel_type,
                SUM(delta_ml)    AS delta_ml,
                SUM(total_paise) AS total_paise,
                COUNT(*)         AS readings
            FROM readings
            WHERE station_id = ?1 AND reading_date = ?2 AND status <> 'rejected'
            GROUP BY fuel_type
            ORDER BY fuel_type
            "#,
        )
        .bind(station_id)
        .bind(date)
        .fetch_all(&self.pool)
        .await?;

        let payments = sqlx::query_as::<_, PaymentBreakdown>(
            r#"
            SELECT
                COALESCE(SUM(cash_paise), 0)       AS cash_paise,
                COALESCE(SUM(upi_paise), 0)        AS upi_paise,
                COALESCE(SUM(card_paise), 0)       AS card_paise,
                COALESCE(SUM(credit_paise), 0)     AS credit_paise,
                COALESCE(SUM(fleet_card_paise), 0) AS fleet_card_paise,
                COALESCE(SUM(wallet_paise), 0)     AS wallet_paise
            FROM readings
            WHERE station_id = ?1 AND reading_date = ?2 AND status <> 'rejected'
            "#,
        )
        .bind(station_id)
        .bind(date)
        .fetch_one(&self.pool)
        .await?;

        let (reading_count, pending_count): (i64, i64) = sqlx::query_as(
            r#"
            SELECT
                COALESCE(SUM(CASE WHEN status <> 'rejected' THEN 1 ELSE 0 END), 0),
                COALESCE(SUM(CASE WHEN status = 'pending' THEN 1 ELSE 0 END), 0)
            FROM readings
            WHERE station_id = ?1 AND reading_date = ?2
            "#,
        )
        .bind(station_id)
        .bind(date)
        .fetch_one(&self.pool)
        .await?;

        let by_fuel: Vec<FuelSummary> = fuel_rows
            .into_iter()
            .map(|row| FuelSummary {
                fuel_type: row.fuel_type,
                volume: Volume::from_ml(row.delta_ml),
                amount: Money::from_paise(row.total_paise),
                readings: row.readings,
            })
            .collect();
        let total_amount = Money::checked_sum(by_fuel.iter().map(|f| f.amount))
            .ok_or_else(|| DbError::Internal("daily total exceeds i64 paise".to_string()))?;

        Ok(DailySummary {
            station_id: station_id.to_string(),
            date,
            by_fuel,
            payments,
            total_amount,
            reading_count,
            pending_count,
        })
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
