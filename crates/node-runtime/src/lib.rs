//! # Node Runtime Library
//!
//! Composition root of the state channel node. The binary in `main.rs` runs
//! a three-node demonstration on top of it.
//!
//! ## Modules
//!
//! - `container/` - configuration and subsystem construction
//! - `adapters/` - Prometheus observers and the persisted signing identity
//! - `wiring/` - protocol handler registration and event metrics
//! - `apps/` - reference app definitions (tic-tac-toe, payment)
//! - `node` - the caller-facing `Node` facade

pub mod adapters;
pub mod apps;
pub mod container;
pub mod node;
pub mod wiring;

pub use container::{ChannelSubsystems, Collaborators, ConfigError, NodeConfig};
pub use node::Node;
