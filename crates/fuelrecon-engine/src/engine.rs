//! # Reconciliation Engine
//!
//! Commits meter readings as sales, all or nothing.
//!
//! ## Commit Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          commit(candidate)                              │
//! │                                                                         │
//! │  ── no locks held ────────────────────────────────────────────────────  │
//! │  1. Resolve nozzle (id, or pump serial + nozzle number)                │
//! │  2. Manual entry? QuotaChecker::check ──── denied ──► PlanLimitExceeded │
//! │  3. Load price windows; resolve at reading time ──► PriceNotSet        │
//! │                                                                         │
//! │  ── locks: nozzle:<id>, tank:<station>:<fuel> (bounded wait) ──────────  │
//! │  4. BEGIN                                                               │
//! │  5. Re-read nozzle + duplicate lookup ──── found ──► AlreadyRecorded   │
//! │  6. ReadingValidator  → delta, rollover                                 │
//! │  7. SaleCalculator    → price snapshot, total, payments                 │
//! │  8. InventoryLedger   → tank stock - delta (policy, level)              │
//! │  9. INSERT reading (pending) · UPDATE nozzle · UPDATE tank             │
//! │ 10. COMMIT            (any earlier error drops the transaction)        │
//! │  ── locks released ───────────────────────────────────────────────────  │
//! │                                                                         │
//! │ 11. Audit event (every attempt) · tank alert (if level worsened)       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Approval
//! Decisions touch one stored reading and take no commit locks; the
//! conditional update in the reading repository settles races.

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::locks::{nozzle_key, tank_key, KeyedLocks};
use crate::ports::{AuditOutcome, CommitAuditEvent, EventSink, NoOpSink, QuotaChecker, Unlimited};
use fuelrecon_core::{
    Actor, ApprovalStatus, ApprovalWorkflow, CoreError, Decision, InventoryLedger,
    InventoryResult, ManualReadingInput, Nozzle, NozzleRef, OcrReadingInput, Reading,
    ReadingCandidate, ReadingNormalizer, ReadingSource, ReadingValidator, SaleCalculator, Tank,
    TankLevel, UploadContext, Volume,
};
use fuelrecon_db::{
    DailySummary, Database, NozzleRepository, ReadingFilter, ReadingRepository, TankRepository,
};

// =============================================================================
// Results
// =============================================================================

/// A reading that was written, with the tank movement it caused.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommittedReading {
    pub reading: Reading,
    /// `None` when the station has no active tank for the fuel type.
    pub inventory: Option<InventoryResult>,
}

/// Result of a commit that was not refused.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CommitOutcome {
    Committed(CommittedReading),
    /// Same nozzle, date and meter value already stored. Nothing was written.
    AlreadyRecorded { existing_id: String },
}

impl CommitOutcome {
    pub fn reading_id(&self) -> &str {
        match self {
            CommitOutcome::Committed(committed) => &committed.reading.id,
            CommitOutcome::AlreadyRecorded { existing_id } => existing_id,
        }
    }

    pub fn committed(&self) -> Option<&CommittedReading> {
        match self {
            CommitOutcome::Committed(committed) => Some(committed),
            CommitOutcome::AlreadyRecorded { .. } => None,
        }
    }
}

/// A tank with its current level band.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TankStatusView {
    pub tank: Tank,
    pub level: TankLevel,
}

// =============================================================================
// Engine
// =============================================================================

/// Orchestrates normalization, validation, pricing, inventory and approval
/// around one database transaction per commit.
pub struct ReconciliationEngine {
    db: Database,
    config: EngineConfig,
    validator: ReadingValidator,
    calculator: SaleCalculator,
    ledger: InventoryLedger,
    workflow: ApprovalWorkflow,
    locks: Arc<KeyedLocks>,
    sink: Arc<dyn EventSink>,
    quota: Arc<dyn QuotaChecker>,
}

impl ReconciliationEngine {
    /// Creates an engine with no event sink and no quota limits.
    pub fn new(db: Database, config: EngineConfig) -> Self {
        Self::with_ports(db, config, Arc::new(NoOpSink), Arc::new(Unlimited))
    }

    /// Creates an engine with custom collaborators.
    pub fn with_ports(
        db: Database,
        config: EngineConfig,
        sink: Arc<dyn EventSink>,
        quota: Arc<dyn QuotaChecker>,
    ) -> Self {
        ReconciliationEngine {
            validator: ReadingValidator::new(config.rollover_policy()),
            calculator: SaleCalculator::new(config.calculator_config()),
            ledger: config.ledger(),
            workflow: config.workflow(),
            locks: Arc::new(KeyedLocks::new()),
            db,
            config,
            sink,
            quota,
        }
    }

    pub fn with_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn with_quota(mut self, quota: Arc<dyn QuotaChecker>) -> Self {
        self.quota = quota;
        self
    }

    /// Shares a lock registry with other engines over the same database.
    pub fn with_locks(mut self, locks: Arc<KeyedLocks>) -> Self {
        self.locks = locks;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Underlying database, for setup work the engine does not wrap
    /// (registering pumps, setting prices).
    pub fn db(&self) -> &Database {
        &self.db
    }

    // =========================================================================
    // Commit
    // =========================================================================

    /// Commits a normalized candidate.
    pub async fn commit(&self, candidate: ReadingCandidate) -> EngineResult<CommitOutcome> {
        let label = candidate.nozzle.to_string();
        let result = self.commit_candidate(&candidate).await;

        match &result {
            Ok((outcome, nozzle_id)) => {
                let audit_outcome = match outcome {
                    CommitOutcome::Committed(_) => AuditOutcome::Committed,
                    CommitOutcome::AlreadyRecorded { .. } => AuditOutcome::AlreadyRecorded,
                };
                self.sink.emit_audit(&CommitAuditEvent {
                    actor: candidate.submitted_by.clone(),
                    nozzle: nozzle_id.clone(),
                    outcome: audit_outcome,
                    reading_id: Some(outcome.reading_id().to_string()),
                    code: None,
                    reason: None,
                    at: Utc::now(),
                });

                if let Some(alert) = outcome
                    .committed()
                    .and_then(|c| c.inventory.as_ref())
                    .and_then(|inv| inv.alert.as_ref())
                {
                    self.sink.emit_tank_alert(alert);
                }
            }
            Err(err) => self.audit_refusal(&candidate.submitted_by, label, err),
        }

        result.map(|(outcome, _)| outcome)
    }

    /// Normalizes and commits a manual entry.
    pub async fn commit_manual(
        &self,
        input: &ManualReadingInput,
        received_at: DateTime<Utc>,
    ) -> EngineResult<CommitOutcome> {
        match ReadingNormalizer::normalize_manual(input, received_at) {
            Ok(candidate) => self.commit(candidate).await,
            Err(err) => {
                let err = EngineError::from(err);
                let label = input.nozzle_id.clone().unwrap_or_default();
                self.audit_refusal(&input.submitted_by, label, &err);
                Err(err)
            }
        }
    }

    /// Normalizes and commits OCR output.
    pub async fn commit_ocr(
        &self,
        input: &OcrReadingInput,
        upload: &UploadContext,
    ) -> EngineResult<CommitOutcome> {
        match ReadingNormalizer::normalize_ocr(input, upload) {
            Ok(candidate) => self.commit(candidate).await,
            Err(err) => {
                let err = EngineError::from(err);
                let label = format!(
                    "{}#{}",
                    input.pump_serial.as_deref().unwrap_or_default(),
                    input.nozzle_number.as_deref().unwrap_or_default()
                );
                self.audit_refusal(&upload.uploaded_by, label, &err);
                Err(err)
            }
        }
    }

    async fn commit_candidate(
        &self,
        candidate: &ReadingCandidate,
    ) -> EngineResult<(CommitOutcome, String)> {
        let nozzle = self.resolve_nozzle(&candidate.nozzle).await?;
        debug!(
            nozzle_id = %nozzle.id,
            source = %candidate.source,
            cumulative = %candidate.cumulative,
            "Commit started"
        );

        if candidate.source == ReadingSource::Manual {
            let decision = self
                .quota
                .check(&nozzle.station_id, &candidate.submitted_by)
                .await?;
            if !decision.allowed {
                return Err(EngineError::PlanLimitExceeded {
                    station_id: nozzle.station_id.clone(),
                    actor_id: candidate.submitted_by.id.clone(),
                });
            }
            debug!(remaining = decision.remaining, "Quota check passed");
        }

        // Refuse unpriced readings before waiting on any lock
        let prices = self
            .db
            .prices()
            .resolver_for(&nozzle.station_id, nozzle.fuel_type)
            .await?;
        prices.resolve(&nozzle.station_id, nozzle.fuel_type, candidate.reading_at)?;

        let keys = [
            nozzle_key(&nozzle.id),
            tank_key(&nozzle.station_id, nozzle.fuel_type),
        ];
        let _locks = self.locks.acquire(&keys, self.config.lock_timeout()).await?;

        let mut tx = self.db.begin().await?;

        let nozzle = NozzleRepository::get_in(&mut tx, &nozzle.id)
            .await?
            .ok_or_else(|| CoreError::NozzleNotFound(nozzle.id.clone()))?;

        let duplicate = ReadingRepository::find_duplicate(
            &mut tx,
            &nozzle.id,
            candidate.reading_date(),
            candidate.cumulative.ml(),
        )
        .await?;

        let delta = match self.validator.validate(candidate, &nozzle, duplicate.as_deref()) {
            Ok(delta) => delta,
            Err(CoreError::DuplicateReading { existing_id, .. }) => {
                info!(
                    nozzle_id = %nozzle.id,
                    existing_id = %existing_id,
                    "Reading already recorded"
                );
                return Ok((CommitOutcome::AlreadyRecorded { existing_id }, nozzle.id));
            }
            Err(err) => return Err(err.into()),
        };

        let sale = self.calculator.compute(&delta, &prices, candidate.payments)?;
        if sale.payment_defaulted {
            debug!(method = %self.config.payments.default_method, "No payment breakdown; defaulted");
        }

        let inventory = match TankRepository::find_for_fuel_in(
            &mut tx,
            &nozzle.station_id,
            nozzle.fuel_type,
        )
        .await?
        {
            Some(tank) => {
                let result = self.ledger.plan_consumption(&tank, delta.delta)?;
                TankRepository::apply_movement(&mut tx, &tank.id, -delta.delta.ml()).await?;
                if result.went_negative {
                    warn!(
                        tank_id = %tank.id,
                        stock = %result.new_stock,
                        "Tank book stock is negative"
                    );
                }
                Some(result)
            }
            None => {
                warn!(
                    station_id = %nozzle.station_id,
                    fuel_type = %nozzle.fuel_type,
                    "No active tank; committing without inventory movement"
                );
                None
            }
        };

        let now = Utc::now();
        let reading = Reading {
            id: Uuid::new_v4().to_string(),
            station_id: nozzle.station_id.clone(),
            nozzle_id: nozzle.id.clone(),
            fuel_type: nozzle.fuel_type,
            source: candidate.source,
            source_upload_id: candidate.source_upload_id.clone(),
            previous_cumulative_ml: delta.previous.ml(),
            cumulative_ml: delta.cumulative.ml(),
            delta_ml: delta.delta.ml(),
            is_rollover: delta.is_rollover,
            reading_at: delta.reading_at,
            reading_date: candidate.reading_date(),
            unit_price_paise: sale.unit_price.paise(),
            price_record_id: sale.price_record_id,
            total_paise: sale.total.paise(),
            payments: sale.payments,
            status: ApprovalStatus::Pending,
            submitted_by: candidate.submitted_by.id.clone(),
            approved_by: None,
            rejection_reason: None,
            tank_id: inventory.as_ref().map(|inv| inv.tank_id.clone()),
            created_at: now,
            decided_at: None,
        };

        ReadingRepository::insert(&mut tx, &reading).await?;
        NozzleRepository::record_reading(&mut tx, &nozzle.id, reading.cumulative_ml, reading.reading_at)
            .await?;

        tx.commit().await?;

        info!(
            reading_id = %reading.id,
            nozzle_id = %reading.nozzle_id,
            delta = %reading.delta(),
            total = %reading.total(),
            rollover = reading.is_rollover,
            "Reading committed"
        );

        let nozzle_id = reading.nozzle_id.clone();
        Ok((
            CommitOutcome::Committed(CommittedReading { reading, inventory }),
            nozzle_id,
        ))
    }

    async fn resolve_nozzle(&self, nozzle: &NozzleRef) -> EngineResult<Nozzle> {
        let found = match nozzle {
            NozzleRef::Id(id) => self.db.nozzles().get(id).await?,
            NozzleRef::PumpSlot {
                pump_serial,
                nozzle_number,
            } => {
                self.db
                    .nozzles()
                    .find_by_pump_slot(pump_serial, *nozzle_number)
                    .await?
            }
        };

        found.ok_or_else(|| CoreError::NozzleNotFound(nozzle.to_string()).into())
    }

    fn audit_refusal(&self, actor: &Actor, nozzle: String, err: &EngineError) {
        let code = err.kind();
        if code.is_validation() {
            debug!(nozzle = %nozzle, code = ?code, "Commit refused");
        } else {
            warn!(nozzle = %nozzle, code = ?code, error = %err, "Commit refused");
        }

        self.sink.emit_audit(&CommitAuditEvent {
            actor: actor.clone(),
            nozzle,
            outcome: AuditOutcome::Rejected,
            reading_id: None,
            code: Some(code),
            reason: Some(err.to_string()),
            at: Utc::now(),
        });
    }

    // =========================================================================
    // Approval
    // =========================================================================

    /// Approves a pending reading.
    pub async fn approve(&self, reading_id: &str, actor: &Actor) -> EngineResult<Reading> {
        let reading = self.get_reading(reading_id).await?;
        let decision = self.workflow.approve(&reading, actor, Utc::now())?;
        self.settle(decision).await
    }

    /// Rejects a pending reading with a reason.
    pub async fn reject(&self, reading_id: &str, actor: &Actor, reason: &str) -> EngineResult<Reading> {
        let reading = self.get_reading(reading_id).await?;
        let decision = self.workflow.reject(&reading, actor, reason, Utc::now())?;
        self.settle(decision).await
    }

    async fn settle(&self, decision: Decision) -> EngineResult<Reading> {
        let applied = self.db.readings().apply_decision(&decision).await?;
        let stored = self.get_reading(&decision.reading_id).await?;

        if !applied {
            // Another decision landed between our read and the update
            return Err(CoreError::HandoverNotPending {
                reading_id: stored.id,
                status: stored.status,
            }
            .into());
        }

        info!(
            reading_id = %stored.id,
            status = %stored.status,
            decided_by = %decision.decided_by,
            "Reading decided"
        );

        Ok(stored)
    }

    // =========================================================================
    // Queries
    // =========================================================================

    pub async fn get_reading(&self, reading_id: &str) -> EngineResult<Reading> {
        self.db
            .readings()
            .get(reading_id)
            .await?
            .ok_or_else(|| CoreError::ReadingNotFound(reading_id.to_string()).into())
    }

    pub async fn list_readings(&self, filter: &ReadingFilter) -> EngineResult<Vec<Reading>> {
        Ok(self.db.readings().list(filter).await?)
    }

    /// Readings awaiting a decision, oldest first.
    pub async fn pending_approvals(&self, station_id: &str) -> EngineResult<Vec<Reading>> {
        Ok(self.db.readings().pending(station_id).await?)
    }

    pub async fn daily_summary(&self, station_id: &str, date: NaiveDate) -> EngineResult<DailySummary> {
        Ok(self.db.readings().daily_summary(station_id, date).await?)
    }

    pub async fn tank_status(&self, station_id: &str) -> EngineResult<Vec<TankStatusView>> {
        let tanks = self.db.tanks().list_by_station(station_id).await?;

        Ok(tanks
            .into_iter()
            .map(|tank| TankStatusView {
                level: tank.level(),
                tank,
            })
            .collect())
    }

    // =========================================================================
    // Inventory
    // =========================================================================

    /// Records a delivery under the same tank lock commits use.
    pub async fn refill_tank(&self, tank_id: &str, volume: Volume) -> EngineResult<InventoryResult> {
        let tank = self
            .db
            .tanks()
            .get(tank_id)
            .await?
            .ok_or_else(|| EngineError::not_found("Tank", tank_id))?;

        let keys = [tank_key(&tank.station_id, tank.fuel_type)];
        let _locks = self.locks.acquire(&keys, self.config.lock_timeout()).await?;

        let result = self.db.tanks().refill(tank_id, volume, &self.ledger).await?;

        if let Some(alert) = &result.alert {
            self.sink.emit_tank_alert(alert);
        }

        Ok(result)
    }
}
