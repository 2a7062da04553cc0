//! # Pending Calls
//!
//! Outbound requests waiting for a response, keyed by correlation id.
//!
//! 1. `register()` before the request is posted
//! 2. the inbound pump calls `complete()` with the matching response
//! 3. `cancel()` when the transport refused the request

use super::envelope::ProtocolResponse;
use parking_lot::Mutex;
use std::collections::HashMap;
use tokio::sync::oneshot;
use tracing::debug;
use uuid::Uuid;

#[derive(Default)]
pub struct PendingCalls {
    pending: Mutex<HashMap<Uuid, oneshot::Sender<ProtocolResponse>>>,
}

impl PendingCalls {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, correlation_id: Uuid) -> oneshot::Receiver<ProtocolResponse> {
        let (tx, rx) = oneshot::channel();
        self.pending.lock().insert(correlation_id, tx);
        rx
    }

    /// Resolve a pending call. False when the id is unknown or the caller
    /// went away.
    pub fn complete(&self, correlation_id: Uuid, response: ProtocolResponse) -> bool {
        let Some(sender) = self.pending.lock().remove(&correlation_id) else {
            return false;
        };
        if sender.send(response).is_err() {
            debug!(correlation_id = %correlation_id, "[sc-05] Caller dropped before response");
            return false;
        }
        true
    }

    pub fn cancel(&self, correlation_id: &Uuid) -> bool {
        self.pending.lock().remove(correlation_id).is_some()
    }

    pub fn len(&self) -> usize {
        self.pending.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.lock().is_empty()
    }
}
