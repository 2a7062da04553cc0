//! # Method Dispatcher (Subsystem 6)
//!
//! The public surface of a node:
//!
//! - `call(method, request) -> response` for every method
//! - `on` / `off` / `emit` / `subscribe` on the node's event bus
//! - `emit_request` for callers that want the response as an event
//!
//! Direct-channel methods and queries go to the lifecycle manager, the
//! `*_VIRTUAL` methods to the virtual router.

pub mod ports;
pub mod service;

pub use ports::{CallObserver, NoopCallObserver};
pub use service::MethodDispatcher;
