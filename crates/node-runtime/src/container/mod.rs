//! # Node Container
//!
//! Configuration and construction of one node's subsystems.

pub mod config;
pub mod subsystems;

pub use config::{ConfigError, NodeConfig};
pub use subsystems::{ChannelSubsystems, Collaborators};
