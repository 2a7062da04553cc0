//! Adapters for the Channel State Store ports.

pub mod memory_store;

pub use memory_store::InMemoryStoreService;
