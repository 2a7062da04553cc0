//! Adapters for the Free-Balance Reconciler ports.

pub mod in_memory_chain;

pub use in_memory_chain::InMemoryChain;
