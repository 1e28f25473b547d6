// SPDX-FileCopyrightText: 2026 Dmflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory state store for deterministic testing.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;

use dmflow_core::{AdapterType, DmflowError, HealthStatus, PluginAdapter, StateKey, StateStore};

/// A [`StateStore`] kept in a map.
///
/// Writes can be made to fail on demand to exercise storage-failure paths.
/// Share one instance (behind an `Arc`) between two harnesses to simulate a
/// process restart.
#[derive(Default)]
pub struct MemoryStore {
    records: Mutex<HashMap<StateKey, serde_json::Value>>,
    fail_writes: AtomicBool,
    writes: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent `set`/`remove` fail (or succeed again).
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Number of successful writes so far.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Raw copy of a record.
    pub async fn raw(&self, key: StateKey) -> Option<serde_json::Value> {
        self.records.lock().await.get(&key).cloned()
    }

    fn check_writable(&self) -> Result<(), DmflowError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(DmflowError::Storage {
                source: "injected write failure".into(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl PluginAdapter for MemoryStore {
    fn name(&self) -> &str {
        "memory"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Store
    }

    async fn health_check(&self) -> Result<HealthStatus, DmflowError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Ok(HealthStatus::Degraded("writes failing".to_string()));
        }
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), DmflowError> {
        Ok(())
    }
}

#[async_trait]
impl StateStore for MemoryStore {
    async fn get(&self, key: StateKey) -> Result<Option<serde_json::Value>, DmflowError> {
        Ok(self.records.lock().await.get(&key).cloned())
    }

    async fn set(&self, key: StateKey, value: serde_json::Value) -> Result<(), DmflowError> {
        self.check_writable()?;
        self.records.lock().await.insert(key, value);
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn remove(&self, key: StateKey) -> Result<(), DmflowError> {
        self.check_writable()?;
        self.records.lock().await.remove(&key);
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn injected_failures_leave_state_untouched() {
        let store = MemoryStore::new();
        store.set(StateKey::Logs, json!([1])).await.unwrap();
        store.set_fail_writes(true);
        assert!(store.set(StateKey::Logs, json!([2])).await.is_err());
        assert!(store.remove(StateKey::Logs).await.is_err());
        assert_eq!(store.get(StateKey::Logs).await.unwrap(), Some(json!([1])));
        assert_eq!(store.write_count(), 1);
    }
}
