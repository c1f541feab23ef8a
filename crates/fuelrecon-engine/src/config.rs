//! # Engine Configuration
//!
//! Tunables for the reconciliation engine.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     FUELRECON_NEGATIVE_STOCK_POLICY=reject                             │
//! │     FUELRECON_LOCK_TIMEOUT_MS=2000                                     │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/fuelrecon/engine.toml (Linux)                            │
//! │     ~/Library/Application Support/com.fuelrecon.fuelrecon/engine.toml  │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! │     allow_and_flag, manager approves, 5 s lock wait                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! # engine.toml
//! [validation]
//! rollover_threshold_litres = 500000
//! max_period_throughput_litres = 100000
//!
//! [payments]
//! tolerance_paise = 1
//! default_method = "cash"
//!
//! [inventory]
//! negative_stock_policy = "allow_and_flag"  # allow_and_flag | reject
//!
//! [approval]
//! min_role = "manager"
//!
//! [locks]
//! acquire_timeout_ms = 5000
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::{EngineError, EngineResult};
use fuelrecon_core::approval::DEFAULT_APPROVER_ROLE;
use fuelrecon_core::calculator::{DEFAULT_PAYMENT_METHOD, DEFAULT_PAYMENT_TOLERANCE_PAISE};
use fuelrecon_core::{
    ApprovalWorkflow, CalculatorConfig, InventoryLedger, Money, NegativeStockPolicy,
    PaymentMethod, Role, RolloverPolicy, Volume,
};

// =============================================================================
// Validation Settings
// =============================================================================

/// Upper bound for litre settings (one billion litres). Keeps every derived
/// millilitre and paise figure well inside `i64`.
pub const MAX_LITRES_SETTING: i64 = 1_000_000_000;

/// Meter rollover detection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationSettings {
    /// Smallest backwards drop treated as a meter reset (litres).
    #[serde(default = "default_rollover_threshold")]
    pub rollover_threshold_litres: i64,

    /// Largest volume a reset counter may show on its first reading (litres).
    #[serde(default = "default_max_period_throughput")]
    pub max_period_throughput_litres: i64,
}

fn default_rollover_threshold() -> i64 {
    500_000
}

fn default_max_period_throughput() -> i64 {
    100_000
}

impl Default for ValidationSettings {
    fn default() -> Self {
        ValidationSettings {
            rollover_threshold_litres: default_rollover_threshold(),
            max_period_throughput_litres: default_max_period_throughput(),
        }
    }
}

// =============================================================================
// Payment Settings
// =============================================================================

/// Sale pricing and payment reconciliation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentSettings {
    /// Allowed absolute difference between breakdown and total (paise).
    #[serde(default = "default_tolerance")]
    pub tolerance_paise: i64,

    /// Method that absorbs the whole total when no breakdown is supplied.
    #[serde(default = "default_method")]
    pub default_method: PaymentMethod,
}

fn default_tolerance() -> i64 {
    DEFAULT_PAYMENT_TOLERANCE_PAISE
}

fn default_method() -> PaymentMethod {
    DEFAULT_PAYMENT_METHOD
}

impl Default for PaymentSettings {
    fn default() -> Self {
        PaymentSettings {
            tolerance_paise: default_tolerance(),
            default_method: default_method(),
        }
    }
}

// =============================================================================
// Inventory / Approval / Lock Settings
// =============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InventorySettings {
    #[serde(default)]
    pub negative_stock_policy: NegativeStockPolicy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalSettings {
    /// Lowest role allowed to approve or reject a reading.
    #[serde(default = "default_min_role")]
    pub min_role: Role,
}

fn default_min_role() -> Role {
    DEFAULT_APPROVER_ROLE
}

impl Default for ApprovalSettings {
    fn default() -> Self {
        ApprovalSettings {
            min_role: default_min_role(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockSettings {
    /// Bounded wait for nozzle and tank locks before `LockTimeout`.
    #[serde(default = "default_acquire_timeout")]
    pub acquire_timeout_ms: u64,
}

fn default_acquire_timeout() -> u64 {
    5_000
}

impl Default for LockSettings {
    fn default() -> Self {
        LockSettings {
            acquire_timeout_ms: default_acquire_timeout(),
        }
    }
}

// =============================================================================
// Main Engine Configuration
// =============================================================================

/// Complete engine configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub validation: ValidationSettings,

    #[serde(default)]
    pub payments: PaymentSettings,

    #[serde(default)]
    pub inventory: InventorySettings,

    #[serde(default)]
    pub approval: ApprovalSettings,

    #[serde(default)]
    pub locks: LockSettings,
}

impl EngineConfig {
    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (engine.toml)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> EngineResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading engine config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = Self::from_toml(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Loads config or returns default if load fails.
    pub fn load_or_default(config_path: Option<PathBuf>) -> Self {
        Self::load(config_path).unwrap_or_else(|e| {
            warn!("Failed to load engine config: {}. Using defaults.", e);
            Self::default()
        })
    }

    /// Parses a TOML document. Missing sections take their defaults.
    pub fn from_toml(contents: &str) -> EngineResult<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// Validates the configuration.
    pub fn validate(&self) -> EngineResult<()> {
        for (name, litres) in [
            ("rollover_threshold_litres", self.validation.rollover_threshold_litres),
            ("max_period_throughput_litres", self.validation.max_period_throughput_litres),
        ] {
            if litres <= 0 || litres > MAX_LITRES_SETTING {
                return Err(EngineError::InvalidConfig(format!(
                    "{} must be between 1 and {}",
                    name, MAX_LITRES_SETTING
                )));
            }
        }

        if self.payments.tolerance_paise < 0 {
            return Err(EngineError::InvalidConfig(
                "tolerance_paise cannot be negative".into(),
            ));
        }

        if self.locks.acquire_timeout_ms == 0 {
            return Err(EngineError::InvalidConfig(
                "acquire_timeout_ms must be greater than 0".into(),
            ));
        }

        Ok(())
    }

    /// Applies `FUELRECON_*` environment variable overrides.
    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Applies overrides from any key lookup. Unparseable values are logged
    /// and ignored.
    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(value) = lookup("FUELRECON_ROLLOVER_THRESHOLD_LITRES") {
            match value.trim().parse::<i64>() {
                Ok(litres) => self.validation.rollover_threshold_litres = litres,
                Err(_) => warn!(value = %value, "Invalid rollover threshold in environment"),
            }
        }

        if let Some(value) = lookup("FUELRECON_MAX_PERIOD_THROUGHPUT_LITRES") {
            match value.trim().parse::<i64>() {
                Ok(litres) => self.validation.max_period_throughput_litres = litres,
                Err(_) => warn!(value = %value, "Invalid max period throughput in environment"),
            }
        }

        if let Some(value) = lookup("FUELRECON_PAYMENT_TOLERANCE_PAISE") {
            match value.trim().parse::<i64>() {
                Ok(paise) => self.payments.tolerance_paise = paise,
                Err(_) => warn!(value = %value, "Invalid payment tolerance in environment"),
            }
        }

        if let Some(value) = lookup("FUELRECON_DEFAULT_PAYMENT_METHOD") {
            match value.parse::<PaymentMethod>() {
                Ok(method) => self.payments.default_method = method,
                Err(e) => warn!("{}", e),
            }
        }

        if let Some(value) = lookup("FUELRECON_NEGATIVE_STOCK_POLICY") {
            match value.parse::<NegativeStockPolicy>() {
                Ok(policy) => {
                    debug!(policy = ?policy, "Overriding negative stock policy from environment");
                    self.inventory.negative_stock_policy = policy;
                }
                Err(e) => warn!("{}", e),
            }
        }

        if let Some(value) = lookup("FUELRECON_APPROVER_ROLE") {
            match value.parse::<Role>() {
                Ok(role) => self.approval.min_role = role,
                Err(e) => warn!("{}", e),
            }
        }

        if let Some(value) = lookup("FUELRECON_LOCK_TIMEOUT_MS") {
            match value.trim().parse::<u64>() {
                Ok(ms) => self.locks.acquire_timeout_ms = ms,
                Err(_) => warn!(value = %value, "Invalid lock timeout in environment"),
            }
        }
    }

    /// Returns the default config file path.
    fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "fuelrecon", "fuelrecon")
            .map(|dirs| dirs.config_dir().join("engine.toml"))
    }

    // =========================================================================
    // Component Settings
    // =========================================================================

    pub fn rollover_policy(&self) -> RolloverPolicy {
        RolloverPolicy {
            threshold: litres_setting(self.validation.rollover_threshold_litres),
            max_period_throughput: litres_setting(self.validation.max_period_throughput_litres),
        }
    }

    pub fn calculator_config(&self) -> CalculatorConfig {
        CalculatorConfig {
            payment_tolerance: Money::from_paise(self.payments.tolerance_paise),
            default_method: self.payments.default_method,
        }
    }

    pub fn ledger(&self) -> InventoryLedger {
        InventoryLedger::new(self.inventory.negative_stock_policy)
    }

    pub fn workflow(&self) -> ApprovalWorkflow {
        ApprovalWorkflow::new(self.approval.min_role)
    }

    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.locks.acquire_timeout_ms)
    }
}

/// Litres to a volume, clamped for configs built without `validate()`.
fn litres_setting(litres: i64) -> Volume {
    Volume::from_litres(litres.clamp(0, MAX_LITRES_SETTING))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert_eq!(config.validation.rollover_threshold_litres, 500_000);
        assert_eq!(config.validation.max_period_throughput_litres, 100_000);
        assert_eq!(config.payments.tolerance_paise, 1);
        assert_eq!(config.payments.default_method, PaymentMethod::Cash);
        assert_eq!(
            config.inventory.negative_stock_policy,
            NegativeStockPolicy::AllowAndFlag
        );
        assert_eq!(config.approval.min_role, Role::Manager);
        assert_eq!(config.lock_timeout(), Duration::from_millis(5_000));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = EngineConfig::from_toml(
            r#"
            [inventory]
            negative_stock_policy = "reject"

            [approval]
            min_role = "owner"
            "#,
        )
        .unwrap();

        assert_eq!(config.inventory.negative_stock_policy, NegativeStockPolicy::Reject);
        assert_eq!(config.approval.min_role, Role::Owner);
        assert_eq!(config.locks.acquire_timeout_ms, 5_000);
        assert_eq!(config.payments.default_method, PaymentMethod::Cash);
    }

    #[test]
    fn test_bad_toml_is_config_error() {
        let err = EngineConfig::from_toml("[inventory]\nnegative_stock_policy = \"maybe\"")
            .unwrap_err();
        assert!(matches!(err, EngineError::ConfigLoadFailed(_)));
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [
            ("FUELRECON_NEGATIVE_STOCK_POLICY", "reject"),
            ("FUELRECON_LOCK_TIMEOUT_MS", "250"),
            ("FUELRECON_APPROVER_ROLE", "super_admin"),
            ("FUELRECON_DEFAULT_PAYMENT_METHOD", "upi"),
            ("FUELRECON_PAYMENT_TOLERANCE_PAISE", "not-a-number"),
        ]
        .into_iter()
        .collect();

        let mut config = EngineConfig::default();
        config.apply_overrides(|key| vars.get(key).map(|v| v.to_string()));

        assert_eq!(config.inventory.negative_stock_policy, NegativeStockPolicy::Reject);
        assert_eq!(config.locks.acquire_timeout_ms, 250);
        assert_eq!(config.approval.min_role, Role::SuperAdmin);
        assert_eq!(config.payments.default_method, PaymentMethod::Upi);
        // Unparseable value leaves the default in place
        assert_eq!(config.payments.tolerance_paise, 1);
    }

    #[test]
    fn test_config_validation() {
        let mut config = EngineConfig::default();
        config.locks.acquire_timeout_ms = 0;
        assert!(config.validate().is_err());

        let mut config = EngineConfig::default();
        config.validation.rollover_threshold_litres = 0;
        assert!(config.validate().is_err());

        let mut config = EngineConfig::default();
        config.payments.tolerance_paise = -1;
        assert!(matches!(config.validate(), Err(EngineError::InvalidConfig(_))));
    }

    #[test]
    fn test_huge_litre_settings_rejected() {
        let mut config = EngineConfig::default();
        config.validation.rollover_threshold_litres = i64::MAX;
        assert!(matches!(config.validate(), Err(EngineError::InvalidConfig(_))));

        let mut config = EngineConfig::default();
        config.validation.max_period_throughput_litres = MAX_LITRES_SETTING + 1;
        assert!(config.validate().is_err());

        let mut config = EngineConfig::default();
        config.validation.max_period_throughput_litres = MAX_LITRES_SETTING;
        assert!(config.validate().is_ok());

        // An unvalidated config still yields a usable policy
        let mut config = EngineConfig::default();
        config.validation.rollover_threshold_litres = i64::MAX;
        assert_eq!(
            config.rollover_policy().threshold,
            Volume::from_litres(MAX_LITRES_SETTING)
        );
    }

    #[test]
    fn test_huge_litre_setting_from_env_fails_load() {
        let mut config = EngineConfig::default();
        config.apply_overrides(|key| match key {
            "FUELRECON_ROLLOVER_THRESHOLD_LITRES" => Some("9223372036854775807".into()),
            _ => None,
        });
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_component_settings() {
        let config = EngineConfig::default();
        let policy = config.rollover_policy();
        assert_eq!(policy.threshold, Volume::from_litres(500_000));
        assert_eq!(config.calculator_config().payment_tolerance, Money::from_paise(1));
        assert_eq!(config.workflow().min_role(), Role::Manager);
        assert_eq!(config.ledger().policy(), NegativeStockPolicy::AllowAndFlag);
    }

    #[test]
    fn test_toml_serialization() {
        let config = EngineConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("[validation]"));
        assert!(toml_str.contains("[locks]"));
    }
}
