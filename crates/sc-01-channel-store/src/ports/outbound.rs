//! # Outbound Ports
//!
//! Key-value persistence collaborator. Used only to keep channel snapshots
//! and signing material; never consulted by protocol logic.

use crate::domain::StoreError;
use serde_json::Value;

/// One key/value pair written by [`StoreService::set`].
#[derive(Debug, Clone, PartialEq)]
pub struct StoreRecord {
    pub key: String,
    pub value: Value,
}

impl StoreRecord {
    pub fn new(key: impl Into<String>, value: Value) -> Self {
        Self {
            key: key.into(),
            value,
        }
    }
}

/// Blocking key-value store.
pub trait StoreService: Send + Sync {
    /// Read one key.
    fn get(&self, key: &str) -> Result<Option<Value>, StoreError>;

    /// Write a batch of records.
    fn set(&self, records: Vec<StoreRecord>) -> Result<(), StoreError>;
}
