//! Ports for the Channel State Store.

pub mod outbound;

pub use outbound::{StoreRecord, StoreService};
