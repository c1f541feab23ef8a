//! # Keyed Commit Locks
//!
//! Exclusive, bounded-wait locks over named resources.
//!
//! ## Discipline
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  commit(N-1, petrol @ S-1)          commit(N-2, petrol @ S-1)          │
//! │     │                                   │                               │
//! │     ▼                                   ▼                               │
//! │  acquire ["nozzle:N-1",             acquire ["nozzle:N-2",             │
//! │           "tank:S-1:petrol"]                 "tank:S-1:petrol"]         │
//! │     │  (sorted, so every caller         │                               │
//! │     │   takes keys in one order)        │  waits on tank:S-1:petrol     │
//! │     ▼                                   │  up to acquire_timeout        │
//! │  read → write → COMMIT                  │                               │
//! │     │                                   │                               │
//! │  drop(LockSet) ───────────────────────► ▼ proceeds                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Locks are process-local: a single engine instance owns a station's
//! database.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tokio::time::{timeout_at, Instant};
use tracing::{debug, warn};

use crate::error::{EngineError, EngineResult};
use fuelrecon_core::FuelType;

/// Lock key for a nozzle's meter.
pub fn nozzle_key(nozzle_id: &str) -> String {
    format!("nozzle:{}", nozzle_id)
}

/// Lock key for the tank feeding a station's fuel type.
pub fn tank_key(station_id: &str, fuel_type: FuelType) -> String {
    format!("tank:{}:{}", station_id, fuel_type.code())
}

type Slot = Arc<AsyncMutex<()>>;

/// Registry of per-key async mutexes.
#[derive(Debug, Default)]
pub struct KeyedLocks {
    slots: Mutex<HashMap<String, Slot>>,
}

/// Held locks. Dropping the set releases every key.
#[derive(Debug)]
pub struct LockSet {
    keys: Vec<String>,
    _guards: Vec<OwnedMutexGuard<()>>,
}

impl LockSet {
    pub fn keys(&self) -> &[String] {
        &self.keys
    }
}

impl KeyedLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquires every key in `keys`, waiting at most `wait` in total.
    ///
    /// Keys are sorted and deduplicated first. On timeout nothing stays held.
    pub async fn acquire(&self, keys: &[String], wait: Duration) -> EngineResult<LockSet> {
        let mut keys: Vec<String> = keys.to_vec();
        keys.sort();
        keys.dedup();

        let deadline = Instant::now() + wait;
        let mut guards = Vec::with_capacity(keys.len());

        for key in &keys {
            let slot = self.slot(key);
            match timeout_at(deadline, slot.lock_owned()).await {
                Ok(guard) => guards.push(guard),
                Err(_) => {
                    warn!(key = %key, waited_ms = wait.as_millis() as u64, "Lock wait timed out");
                    return Err(EngineError::LockTimeout {
                        key: key.clone(),
                        waited_ms: wait.as_millis() as u64,
                    });
                }
            }
        }

        debug!(keys = ?keys, "Locks acquired");

        Ok(LockSet {
            keys,
            _guards: guards,
        })
    }

    /// Number of keys currently tracked.
    pub fn tracked(&self) -> usize {
        self.slots.lock().map(|slots| slots.len()).unwrap_or(0)
    }

    fn slot(&self, key: &str) -> Slot {
        // A poisoned registry still holds valid slots
        let mut slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());

        // Forget slots nobody holds or waits on
        slots.retain(|_, slot| Arc::strong_count(slot) > 1);

        slots
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys(names: &[&str]) -> Vec<String> {
        names.iter().map(|k| k.to_string()).collect()
    }

    #[test]
    fn test_key_format() {
        assert_eq!(nozzle_key("N-1"), "nozzle:N-1");
        assert_eq!(tank_key("S-1", FuelType::Diesel), format!("tank:S-1:{}", FuelType::Diesel.code()));
    }

    #[tokio::test]
    async fn test_acquire_sorts_and_dedups() {
        let locks = KeyedLocks::new();
        let set = locks
            .acquire(&keys(&["tank:b", "nozzle:a", "tank:b"]), Duration::from_millis(50))
            .await
            .unwrap();

        assert_eq!(set.keys(), &["nozzle:a".to_string(), "tank:b".to_string()]);
    }

    #[tokio::test]
    async fn test_held_key_times_out() {
        let locks = KeyedLocks::new();
        let _held = locks
            .acquire(&keys(&["tank:S-1:petrol"]), Duration::from_millis(50))
            .await
            .unwrap();

        let err = locks
            .acquire(&keys(&["nozzle:N-2", "tank:S-1:petrol"]), Duration::from_millis(20))
            .await
            .unwrap_err();

        assert!(matches!(err, EngineError::LockTimeout { ref key, .. } if key == "tank:S-1:petrol"));
        assert!(err.is_retryable());

        // The nozzle key taken before the timeout was released again
        assert!(locks
            .acquire(&keys(&["nozzle:N-2"]), Duration::from_millis(20))
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_release_on_drop() {
        let locks = KeyedLocks::new();
        let held = locks
            .acquire(&keys(&["nozzle:N-1"]), Duration::from_millis(50))
            .await
            .unwrap();
        drop(held);

        assert!(locks
            .acquire(&keys(&["nozzle:N-1"]), Duration::from_millis(20))
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_disjoint_keys_do_not_block() {
        let locks = KeyedLocks::new();
        let _a = locks
            .acquire(&keys(&["nozzle:N-1", "tank:S-1:petrol"]), Duration::from_millis(50))
            .await
            .unwrap();
        let b = locks
            .acquire(&keys(&["nozzle:N-3", "tank:S-1:diesel"]), Duration::from_millis(20))
            .await;

        assert!(b.is_ok());
    }

    #[tokio::test]
    async fn test_waiter_proceeds_after_release() {
        let locks = Arc::new(KeyedLocks::new());
        let held = locks
            .acquire(&keys(&["tank:S-1:petrol"]), Duration::from_millis(50))
            .await
            .unwrap();

        let waiter = {
            let locks = locks.clone();
            tokio::spawn(async move {
                locks
                    .acquire(&keys(&["tank:S-1:petrol"]), Duration::from_secs(2))
                    .await
                    .map(|_| ())
            })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        drop(held);

        assert!(waiter.await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn test_idle_slots_are_forgotten() {
        let locks = KeyedLocks::new();
        for i in 0..10 {
            let set = locks
                .acquire(&[format!("nozzle:N-{}", i)], Duration::from_millis(50))
                .await
                .unwrap();
            drop(set);
        }

        assert!(locks.tracked() <= 1);
    }
}
