//! Ports for the Free-Balance Reconciler.

pub mod outbound;

pub use outbound::BlockchainClient;
