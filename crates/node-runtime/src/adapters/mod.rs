//! # Adapter Implementations
//!
//! Runtime-side implementations of subsystem ports: Prometheus observers
//! and the persisted signing identity.

pub mod identity;
pub mod metrics;

pub use identity::load_or_create_seed;
pub use metrics::{PrometheusCallObserver, PrometheusMessageObserver};
