//! # Approval Workflow
//!
//! State machine for committed readings.
//!
//! ```text
//!                 approve (role ≥ min_role)
//!   ┌─────────┐ ─────────────────────────────► ┌──────────┐
//!   │ Pending │                                │ Approved │
//!   └─────────┘ ─────────────────────────────► └──────────┘
//!        │        reject (role ≥ min_role,      ┌──────────┐
//!        └──────── non-empty reason) ─────────► │ Rejected │
//!                                               └──────────┘
//!   Approved / Rejected are terminal: any further transition is
//!   HandoverNotPending.
//! ```
//!
//! Status checks run before role checks, so a decided reading reports
//! `HandoverNotPending` to everyone.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};
use crate::types::{Actor, ApprovalStatus, Reading, Role};

/// Minimum role allowed to decide a reading when nothing is configured.
pub const DEFAULT_APPROVER_ROLE: Role = Role::Manager;

/// A decision ready to be written back onto a reading.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decision {
    pub reading_id: String,
    pub status: ApprovalStatus,
    pub decided_by: String,
    pub reason: Option<String>,
    pub decided_at: DateTime<Utc>,
}

/// Role-gated transitions out of `Pending`.
#[derive(Debug, Clone, Copy)]
pub struct ApprovalWorkflow {
    min_role: Role,
}

impl Default for ApprovalWorkflow {
    fn default() -> Self {
        ApprovalWorkflow {
            min_role: DEFAULT_APPROVER_ROLE,
        }
    }
}

impl ApprovalWorkflow {
    pub fn new(min_role: Role) -> Self {
        ApprovalWorkflow { min_role }
    }

    pub fn min_role(&self) -> Role {
        self.min_role
    }

    pub fn approve(
        &self,
        reading: &Reading,
        actor: &Actor,
        now: DateTime<Utc>,
    ) -> CoreResult<Decision> {
        self.check(reading, actor)?;

        Ok(Decision {
            reading_id: reading.id.clone(),
            status: ApprovalStatus::Approved,
            decided_by: actor.id.clone(),
            reason: None,
            decided_at: now,
        })
    }

    /// Rejects with a reason; whitespace-only reasons count as missing.
    pub fn reject(
        &self,
        reading: &Reading,
        actor: &Actor,
        reason: &str,
        now: DateTime<Utc>,
    ) -> CoreResult<Decision> {
        self.check(reading, actor)?;

        let reason = reason.trim();
        if reason.is_empty() {
            return Err(CoreError::RejectionReasonRequired);
        }

        Ok(Decision {
            reading_id: reading.id.clone(),
            status: ApprovalStatus::Rejected,
            decided_by: actor.id.clone(),
            reason: Some(reason.to_string()),
            decided_at: now,
        })
    }

    fn check(&self, reading: &Reading, actor: &Actor) -> CoreResult<()> {
        if reading.status != ApprovalStatus::Pending {
            return Err(CoreError::HandoverNotPending {
                reading_id: reading.id.clone(),
                status: reading.status,
            });
        }

        if !actor.role.satisfies(self.min_role) {
            return Err(CoreError::InsufficientRole {
                actor_id: actor.id.clone(),
                role: actor.role,
                required: self.min_role,
            });
        }

        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{FuelType, PaymentBreakdown, ReadingSource};
    use chrono::TimeZone;

    fn reading(status: ApprovalStatus) -> Reading {
        let at = Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap();
        Reading {
            id: "R-1".to_string(),
            station_id: "S-1".to_string(),
            nozzle_id: "N-1".to_string(),
            fuel_type: FuelType::Petrol,
            source: ReadingSource::Manual,
            source_upload_id: None,
            previous_cumulative_ml: 1_000_000,
            cumulative_ml: 1_050_000,
            delta_ml: 50_000,
            is_rollover: false,
            reading_at: at,
            reading_date: at.date_naive(),
            unit_price_paise: 10_000,
            price_record_id: "price-1".to_string(),
            total_paise: 500_000,
            payments: PaymentBreakdown::default(),
            status,
            submitted_by: "att-1".to_string(),
            approved_by: None,
            rejection_reason: None,
            tank_id: None,
            created_at: at,
            decided_at: None,
        }
    }

    #[test]
    fn test_manager_approves() {
        let wf = ApprovalWorkflow::default();
        let decision = wf
            .approve(&reading(ApprovalStatus::Pending), &Actor::new("mgr-1", Role::Manager), Utc::now())
            .unwrap();
        assert_eq!(decision.status, ApprovalStatus::Approved);
        assert_eq!(decision.decided_by, "mgr-1");
        assert!(decision.reason.is_none());
    }

    #[test]
    fn test_attendant_cannot_approve() {
        let wf = ApprovalWorkflow::default();
        let err = wf
            .approve(&reading(ApprovalStatus::Pending), &Actor::new("att-1", Role::Attendant), Utc::now())
            .unwrap_err();
        assert!(matches!(
            err,
            CoreError::InsufficientRole {
                required: Role::Manager,
                ..
            }
        ));
    }

    #[test]
    fn test_senior_roles_satisfy() {
        let wf = ApprovalWorkflow::default();
        for role in [Role::Owner, Role::SuperAdmin] {
            assert!(wf
                .approve(&reading(ApprovalStatus::Pending), &Actor::new("x", role), Utc::now())
                .is_ok());
        }

        let strict = ApprovalWorkflow::new(Role::Owner);
        assert!(strict
            .approve(&reading(ApprovalStatus::Pending), &Actor::new("mgr", Role::Manager), Utc::now())
            .is_err());
    }

    #[test]
    fn test_terminal_states_are_final() {
        let wf = ApprovalWorkflow::default();
        let owner = Actor::new("own-1", Role::Owner);
        for status in [ApprovalStatus::Approved, ApprovalStatus::Rejected] {
            let err = wf.approve(&reading(status), &owner, Utc::now()).unwrap_err();
            assert!(matches!(err, CoreError::HandoverNotPending { .. }));
            let err = wf.reject(&reading(status), &owner, "late", Utc::now()).unwrap_err();
            assert!(matches!(err, CoreError::HandoverNotPending { .. }));
        }
    }

    #[test]
    fn test_reject_requires_reason() {
        let wf = ApprovalWorkflow::default();
        let mgr = Actor::new("mgr-1", Role::Manager);
        let err = wf
            .reject(&reading(ApprovalStatus::Pending), &mgr, "   ", Utc::now())
            .unwrap_err();
        assert!(matches!(err, CoreError::RejectionReasonRequired));

        let decision = wf
            .reject(&reading(ApprovalStatus::Pending), &mgr, " meter photo unreadable ", Utc::now())
            .unwrap();
        assert_eq!(decision.status, ApprovalStatus::Rejected);
        assert_eq!(decision.reason.as_deref(), Some("meter photo unreadable"));
    }
}
