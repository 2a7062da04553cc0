//! Adapters for the Peer Messaging Bridge.

pub mod memory_hub;

pub use memory_hub::InMemoryMessagingHub;
