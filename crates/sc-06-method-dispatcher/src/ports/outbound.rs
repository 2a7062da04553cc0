//! # Outbound Ports
//!
//! Call accounting hook. The runtime plugs its metrics in here so this
//! crate stays free of any telemetry backend.

use shared_types::{ErrorCode, MethodName};
use std::time::Duration;

pub trait CallObserver: Send + Sync {
    /// Invoked once per completed call.
    fn on_call(&self, method: MethodName, outcome: Result<(), ErrorCode>, elapsed: Duration);
}

/// Observer that records nothing.
pub struct NoopCallObserver;

impl CallObserver for NoopCallObserver {
    fn on_call(&self, _method: MethodName, _outcome: Result<(), ErrorCode>, _elapsed: Duration) {}
}
