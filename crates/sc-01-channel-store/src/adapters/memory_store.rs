//! In-Memory Store Adapter
//!
//! Implements the `StoreService` port over a hash map. Shared between node
//! restarts in tests to check that identity and snapshots survive.

use crate::domain::StoreError;
use crate::ports::outbound::{StoreRecord, StoreService};
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::debug;

/// In-memory key-value store.
#[derive(Default)]
pub struct InMemoryStoreService {
    entries: RwLock<HashMap<String, Value>>,
    /// When set, every write fails.
    fail_writes: AtomicBool,
}

impl InMemoryStoreService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent writes fail (or succeed again).
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl StoreService for InMemoryStoreService {
    fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        Ok(self.entries.read().get(key).cloned())
    }

    fn set(&self, records: Vec<StoreRecord>) -> Result<(), StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Persistence("store unavailable".to_string()));
        }
        let mut entries = self.entries.write();
        for record in records {
            debug!(key = %record.key, "[sc-01] Store write");
            entries.insert(record.key, record.value);
        }
        Ok(())
    }
}
