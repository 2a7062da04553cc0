//! # Time-Bounded Duplicate Filter
//!
//! The transport delivers at least once, so the same envelope may arrive
//! more than once. Message ids are remembered for a bounded window and
//! anything older than the window is refused outright, which keeps the
//! cache small while still catching every redelivery it could see.

use std::collections::HashMap;
use thiserror::Error;
use uuid::Uuid;

use super::envelope::now_secs;

/// Why an inbound envelope was not accepted.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DedupError {
    /// The message id was already seen inside the window.
    #[error("Message {message_id} already delivered")]
    Duplicate { message_id: Uuid },

    /// The message is older than the window and cannot be checked.
    #[error("Message timestamp {timestamp} is older than {threshold}")]
    Expired { timestamp: u64, threshold: u64 },
}

/// Message-id cache with periodic garbage collection.
pub struct MessageDedupCache {
    /// Message id -> sender timestamp.
    seen: HashMap<Uuid, u64>,
    window_secs: u64,
    last_gc: u64,
    gc_interval_secs: u64,
}

impl MessageDedupCache {
    pub const DEFAULT_WINDOW: u64 = 120;
    pub const DEFAULT_GC_INTERVAL: u64 = 10;

    #[must_use]
    pub fn new() -> Self {
        Self::with_window(Self::DEFAULT_WINDOW)
    }

    #[must_use]
    pub fn with_window(window_secs: u64) -> Self {
        Self {
            seen: HashMap::new(),
            window_secs,
            last_gc: 0,
            gc_interval_secs: Self::DEFAULT_GC_INTERVAL.min(window_secs.max(1)),
        }
    }

    /// Accept `message_id` once.
    pub fn check_and_insert(&mut self, message_id: Uuid, timestamp: u64) -> Result<(), DedupError> {
        self.check_and_insert_at(message_id, timestamp, now_secs())
    }

    fn check_and_insert_at(
        &mut self,
        message_id: Uuid,
        timestamp: u64,
        now: u64,
    ) -> Result<(), DedupError> {
        let threshold = now.saturating_sub(self.window_secs);
        if timestamp < threshold {
            return Err(DedupError::Expired {
                timestamp,
                threshold,
            });
        }

        if now.saturating_sub(self.last_gc) >= self.gc_interval_secs {
            self.garbage_collect(threshold);
            self.last_gc = now;
        }

        if self.seen.contains_key(&message_id) {
            return Err(DedupError::Duplicate { message_id });
        }
        self.seen.insert(message_id, timestamp);
        Ok(())
    }

    fn garbage_collect(&mut self, threshold: u64) {
        self.seen.retain(|_, ts| *ts >= threshold);
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

impl Default for MessageDedupCache {
    fn default() -> Self {
        Self::new()
    }
}
