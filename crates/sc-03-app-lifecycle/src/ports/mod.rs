//! Ports for the App-Instance Lifecycle Manager.

pub mod inbound;
pub mod outbound;

pub use inbound::AppLifecycleApi;
pub use outbound::{AppDefinition, CommitmentSigner};
