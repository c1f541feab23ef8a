//! # Engine Error Types
//!
//! Everything a commit, decision or report can fail with, and the
//! caller-facing shape those failures take.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Engine Error Categories                            │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │  Business Rule  │  │   Concurrency   │  │     Configuration       │ │
//! │  │                 │  │                 │  │                         │ │
//! │  │  Core(..)       │  │  LockTimeout    │  │  InvalidConfig          │ │
//! │  │  PlanLimit-     │  │  (retryable)    │  │  ConfigLoadFailed       │ │
//! │  │    Exceeded     │  │                 │  │                         │ │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘ │
//! │                                                                         │
//! │  ┌─────────────────┐                                                   │
//! │  │    Storage      │   Db(Domain(..)) is unwrapped to the core kind;   │
//! │  │                 │   every other storage fault becomes a generic     │
//! │  │  Db(..)         │   DATABASE_ERROR without internals.               │
//! │  └─────────────────┘                                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Serialization
//! ```json
//! {
//!   "code": "READING_MUST_INCREASE",
//!   "message": "Reading for nozzle N-1 must be at least 1050.000 L, got 200.000 L"
//! }
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

use fuelrecon_core::CoreError;
use fuelrecon_db::DbError;

/// Result type alias for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Engine error type.
#[derive(Debug, Error)]
pub enum EngineError {
    // =========================================================================
    // Business Rule Errors
    // =========================================================================
    /// A domain rule rejected the operation.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// The station's plan does not allow another manual entry.
    #[error("Plan limit reached for station {station_id} (actor {actor_id})")]
    PlanLimitExceeded { station_id: String, actor_id: String },

    // =========================================================================
    // Concurrency Errors
    // =========================================================================
    /// Nozzle or tank lock not acquired within the configured wait.
    ///
    /// ## Caller Workflow
    /// ```text
    /// commit() ── LockTimeout ──► back off ──► commit() again
    /// ```
    /// Nothing was written; the engine never retries on its own.
    #[error("Timed out after {waited_ms} ms waiting for lock {key}")]
    LockTimeout { key: String, waited_ms: u64 },

    // =========================================================================
    // Storage Errors
    // =========================================================================
    #[error(transparent)]
    Db(DbError),

    // =========================================================================
    // Configuration Errors
    // =========================================================================
    /// Invalid engine configuration.
    #[error("Invalid engine configuration: {0}")]
    InvalidConfig(String),

    /// Failed to load config file.
    #[error("Failed to load config: {0}")]
    ConfigLoadFailed(String),
}

// =============================================================================
// Error Conversions
// =============================================================================

/// Lifts rule violations raised inside repository transactions back to
/// `Core`, so callers match one variant whichever layer detected them.
impl From<DbError> for EngineError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::Domain(core) => EngineError::Core(core),
            other => EngineError::Db(other),
        }
    }
}

impl From<sqlx::Error> for EngineError {
    fn from(err: sqlx::Error) -> Self {
        EngineError::from(DbError::from(err))
    }
}

impl From<std::io::Error> for EngineError {
    fn from(err: std::io::Error) -> Self {
        EngineError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::de::Error> for EngineError {
    fn from(err: toml::de::Error) -> Self {
        EngineError::ConfigLoadFailed(err.to_string())
    }
}

// =============================================================================
// Error Kinds
// =============================================================================

/// Machine-readable error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    MalformedCandidate,
    DuplicateReading,
    ReadingMustIncrease,
    NozzleInactive,
    NozzleNotFound,
    PriceNotSet,
    PriceWindowOverlap,
    PaymentBreakdownMismatch,
    TankInsufficient,
    PlanLimitExceeded,
    HandoverNotPending,
    InsufficientRole,
    RejectionReasonRequired,
    NotFound,
    LockTimeout,
    ConfigError,
    DatabaseError,
    InternalError,
}

impl ErrorKind {
    /// Returns true for failures caused by the submitted input itself.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            ErrorKind::MalformedCandidate
                | ErrorKind::ReadingMustIncrease
                | ErrorKind::NozzleInactive
                | ErrorKind::PaymentBreakdownMismatch
                | ErrorKind::PriceNotSet
        )
    }
}

impl From<&CoreError> for ErrorKind {
    fn from(err: &CoreError) -> Self {
        match err {
            CoreError::MalformedCandidate(_) => ErrorKind::MalformedCandidate,
            CoreError::DuplicateReading { .. } => ErrorKind::DuplicateReading,
            CoreError::ReadingMustIncrease { .. } => ErrorKind::ReadingMustIncrease,
            CoreError::NozzleInactive { .. } => ErrorKind::NozzleInactive,
            CoreError::NozzleNotFound(_) => ErrorKind::NozzleNotFound,
            CoreError::PriceNotSet { .. } => ErrorKind::PriceNotSet,
            CoreError::PriceWindowOverlap { .. } => ErrorKind::PriceWindowOverlap,
            CoreError::PaymentBreakdownMismatch { .. } => ErrorKind::PaymentBreakdownMismatch,
            CoreError::TankInsufficient { .. } => ErrorKind::TankInsufficient,
            CoreError::HandoverNotPending { .. } => ErrorKind::HandoverNotPending,
            CoreError::InsufficientRole { .. } => ErrorKind::InsufficientRole,
            CoreError::RejectionReasonRequired => ErrorKind::RejectionReasonRequired,
            CoreError::ReadingNotFound(_) => ErrorKind::NotFound,
        }
    }
}

// =============================================================================
// Error Categorization
// =============================================================================

impl EngineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            EngineError::Core(core) => ErrorKind::from(core),
            EngineError::PlanLimitExceeded { .. } => ErrorKind::PlanLimitExceeded,
            EngineError::LockTimeout { .. } => ErrorKind::LockTimeout,
            EngineError::Db(DbError::NotFound { .. }) => ErrorKind::NotFound,
            EngineError::Db(DbError::Domain(core)) => ErrorKind::from(core),
            EngineError::Db(_) => ErrorKind::DatabaseError,
            EngineError::InvalidConfig(_) | EngineError::ConfigLoadFailed(_) => {
                ErrorKind::ConfigError
            }
        }
    }

    /// Returns true if the caller may retry the same request after a backoff.
    ///
    /// ## Retryable Errors
    /// - Lock acquisition timeouts
    /// - Connection pool exhaustion
    /// - SQLite write-lock contention (`DbError::Busy`)
    ///
    /// Everything else either depends on the input (retrying cannot help) or
    /// is a storage fault that needs an operator.
    pub fn is_retryable(&self) -> bool {
        match self {
            EngineError::LockTimeout { .. } => true,
            EngineError::Db(db) => db.is_transient(),
            _ => false,
        }
    }

    /// Returns true if this error indicates a configuration problem.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            EngineError::InvalidConfig(_) | EngineError::ConfigLoadFailed(_)
        )
    }

    pub fn not_found(entity: &str, id: &str) -> Self {
        EngineError::Db(DbError::not_found(entity, id))
    }
}

// =============================================================================
// Caller-Facing Rejection
// =============================================================================

/// What a calling layer receives when an operation is refused.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rejection {
    /// Machine-readable error code for programmatic handling
    pub code: ErrorKind,

    /// Human-readable error message for display
    pub message: String,

    /// The same request may succeed if retried later.
    pub retryable: bool,
}

impl Rejection {
    pub fn new(code: ErrorKind, message: impl Into<String>) -> Self {
        Rejection {
            code,
            message: message.into(),
            retryable: false,
        }
    }
}

impl From<&EngineError> for Rejection {
    fn from(err: &EngineError) -> Self {
        let code = err.kind();
        let retryable = err.is_retryable();

        let message = match err {
            EngineError::Db(DbError::NotFound { .. }) => err.to_string(),
            EngineError::Db(DbError::PoolExhausted | DbError::Busy(_)) => {
                "Database is busy, try again".to_string()
            }
            EngineError::Db(DbError::ConnectionFailed(_)) => {
                "Database connection failed".to_string()
            }
            EngineError::Db(DbError::MigrationFailed(_)) => {
                "Database migration failed".to_string()
            }
            EngineError::Db(db) => {
                // Log the actual error but return a generic message
                tracing::error!(error = %db, "Storage fault");
                "Database operation failed".to_string()
            }
            _ => err.to_string(),
        };

        Rejection {
            code,
            message,
            retryable,
        }
    }
}

impl From<EngineError> for Rejection {
    fn from(err: EngineError) -> Self {
        Rejection::from(&err)
    }
}

impl std::fmt::Display for Rejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{:?}] {}", self.code, self.message)
    }
}

impl std::error::Error for Rejection {}

#[cfg(test)]
mod tests {
    use super::*;
    use fuelrecon_core::{ValidationError, Volume};

    #[test]
    fn test_retryable_errors() {
        assert!(EngineError::LockTimeout {
            key: "nozzle:N-1".into(),
            waited_ms: 5_000
        }
        .is_retryable());
        assert!(EngineError::from(DbError::PoolExhausted).is_retryable());

        let busy = EngineError::from(DbError::Busy("database is locked".into()));
        assert!(busy.is_retryable());
        assert_eq!(busy.kind(), ErrorKind::DatabaseError);
        let rejection = Rejection::from(&busy);
        assert!(rejection.retryable);
        assert_eq!(rejection.message, "Database is busy, try again");

        assert!(!EngineError::from(DbError::QueryFailed("syntax".into())).is_retryable());
        assert!(!EngineError::from(CoreError::RejectionReasonRequired).is_retryable());
        assert!(!EngineError::InvalidConfig("bad".into()).is_retryable());
    }

    #[test]
    fn test_domain_errors_are_lifted_out_of_db() {
        let err = EngineError::from(DbError::Domain(CoreError::NozzleNotFound("N-9".into())));
        assert!(matches!(err, EngineError::Core(CoreError::NozzleNotFound(_))));
        assert_eq!(err.kind(), ErrorKind::NozzleNotFound);
    }

    #[test]
    fn test_kind_mapping() {
        let err = EngineError::from(CoreError::ReadingMustIncrease {
            nozzle_id: "N-1".into(),
            previous: Volume::from_litres(1_050),
            new: Volume::from_litres(200),
        });
        assert_eq!(err.kind(), ErrorKind::ReadingMustIncrease);
        assert!(err.kind().is_validation());

        let err = EngineError::from(CoreError::from(ValidationError::required("nozzle_id")));
        assert_eq!(err.kind(), ErrorKind::MalformedCandidate);

        let err = EngineError::PlanLimitExceeded {
            station_id: "S-1".into(),
            actor_id: "u-1".into(),
        };
        assert_eq!(err.kind(), ErrorKind::PlanLimitExceeded);
        assert!(!err.kind().is_validation());

        assert_eq!(EngineError::not_found("Reading", "R-1").kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_rejection_hides_storage_internals() {
        let err = EngineError::from(DbError::QueryFailed("no such table: readings".into()));
        let rejection = Rejection::from(&err);

        assert_eq!(rejection.code, ErrorKind::DatabaseError);
        assert!(!rejection.message.contains("readings"));
        assert!(!rejection.retryable);
    }

    #[test]
    fn test_rejection_serialization() {
        let err = EngineError::LockTimeout {
            key: "tank:S-1:petrol".into(),
            waited_ms: 100,
        };
        let json = serde_json::to_value(Rejection::from(err)).unwrap();

        assert_eq!(json["code"], "LOCK_TIMEOUT");
        assert_eq!(json["retryable"], true);
        assert!(json["message"].as_str().unwrap().contains("tank:S-1:petrol"));
    }
}
