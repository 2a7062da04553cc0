//! Ports for the Method Dispatcher.

pub mod outbound;

pub use outbound::{CallObserver, NoopCallObserver};
