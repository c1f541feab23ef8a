//! # Collaborator Ports
//!
//! The engine's narrow contracts with the outside world.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    ReconciliationEngine                                 │
//! │                                                                         │
//! │   before locks ──► QuotaChecker::check()        (manual entry only)    │
//! │                                                                         │
//! │   every attempt ─► EventSink::emit_audit()      (success or refusal)   │
//! │   level worsens ─► EventSink::emit_tank_alert() (after COMMIT)         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Delivery, storage and notification are the collaborator's concern. Sinks
//! are called after the transaction is settled and must not block.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::error::{EngineResult, ErrorKind};
use fuelrecon_core::{Actor, TankAlert};

// =============================================================================
// Events
// =============================================================================

/// How a commit attempt ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditOutcome {
    Committed,
    AlreadyRecorded,
    Rejected,
}

/// Audit record for one commit attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitAuditEvent {
    pub actor: Actor,
    /// Nozzle id, or `serial#number` when a receipt slot did not resolve.
    pub nozzle: String,
    pub outcome: AuditOutcome,
    /// New reading, or the existing one for `AlreadyRecorded`.
    pub reading_id: Option<String>,
    pub code: Option<ErrorKind>,
    pub reason: Option<String>,
    pub at: DateTime<Utc>,
}

/// Everything a [`ChannelSink`] forwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EngineEvent {
    Audit(CommitAuditEvent),
    TankAlert(TankAlert),
}

// =============================================================================
// Event Sink
// =============================================================================

/// Trait for receiving engine events.
pub trait EventSink: Send + Sync {
    /// Records a commit attempt.
    fn emit_audit(&self, event: &CommitAuditEvent);

    /// Signals a tank entering a worse level band.
    fn emit_tank_alert(&self, alert: &TankAlert);
}

/// No-op sink for testing.
pub struct NoOpSink;

impl EventSink for NoOpSink {
    fn emit_audit(&self, _event: &CommitAuditEvent) {}
    fn emit_tank_alert(&self, _alert: &TankAlert) {}
}

/// Writes events to the log.
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit_audit(&self, event: &CommitAuditEvent) {
        info!(
            target: "fuelrecon::audit",
            actor_id = %event.actor.id,
            role = %event.actor.role,
            nozzle = %event.nozzle,
            outcome = ?event.outcome,
            reading_id = ?event.reading_id,
            code = ?event.code,
            reason = ?event.reason,
            "Commit attempt"
        );
    }

    fn emit_tank_alert(&self, alert: &TankAlert) {
        warn!(
            target: "fuelrecon::inventory",
            tank_id = %alert.tank_id,
            station_id = %alert.station_id,
            fuel_type = %alert.fuel_type,
            level = %alert.level,
            stock = %alert.stock,
            "Tank level alert"
        );
    }
}

/// Forwards events to an unbounded channel.
///
/// A closed receiver drops events silently; the commit has already happened.
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<EngineEvent>,
}

impl ChannelSink {
    pub fn new(tx: mpsc::UnboundedSender<EngineEvent>) -> Self {
        ChannelSink { tx }
    }

    /// Creates a sink together with its receiving end.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<EngineEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (ChannelSink { tx }, rx)
    }
}

impl EventSink for ChannelSink {
    fn emit_audit(&self, event: &CommitAuditEvent) {
        let _ = self.tx.send(EngineEvent::Audit(event.clone()));
    }

    fn emit_tank_alert(&self, alert: &TankAlert) {
        let _ = self.tx.send(EngineEvent::TankAlert(alert.clone()));
    }
}

// =============================================================================
// Quota Checker
// =============================================================================

/// Plan quota answer for one station and actor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotaDecision {
    pub allowed: bool,
    /// Manual entries left in the current period.
    pub remaining: i64,
}

impl QuotaDecision {
    pub fn allow(remaining: i64) -> Self {
        QuotaDecision {
            allowed: true,
            remaining,
        }
    }

    pub fn deny() -> Self {
        QuotaDecision {
            allowed: false,
            remaining: 0,
        }
    }
}

/// Plan-quota collaborator consulted before a manual entry is committed.
#[async_trait]
pub trait QuotaChecker: Send + Sync {
    async fn check(&self, station_id: &str, actor: &Actor) -> EngineResult<QuotaDecision>;
}

/// Quota checker that always allows.
pub struct Unlimited;

#[async_trait]
impl QuotaChecker for Unlimited {
    async fn check(&self, _station_id: &str, _actor: &Actor) -> EngineResult<QuotaDecision> {
        Ok(QuotaDecision::allow(i64::MAX))
    }
}
