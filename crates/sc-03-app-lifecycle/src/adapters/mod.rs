//! Adapters for the App-Instance Lifecycle Manager.

pub mod ed25519_signer;

pub use ed25519_signer::Ed25519Signer;
