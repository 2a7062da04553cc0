//! # Subsystem Wiring
//!
//! Connects the channel subsystems of one node.
//!
//! ```text
//!   caller ──► [6] Dispatcher ──► [3] Lifecycle ──┬──► [1] Store
//!                    │            [4] Router ─────┤    [2] Free balance
//!                    │                            └──► [5] Bridge ◄──► peers
//!                    ▼                                     │
//!               event bus ◄──────── inbound handlers ◄─────┘
//! ```

pub mod event_metrics;
pub mod protocol;

pub use event_metrics::register_metric_listeners;
pub use protocol::register_protocol_handlers;
