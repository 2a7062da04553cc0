//! # App-Instance Lifecycle Manager (Subsystem 3)
//!
//! Drives every structural transition of a direct channel and the state
//! updates of every app a node is an end party of.
//!
//! ## Transitions
//!
//! | Method | Effect on the channel |
//! |--------|-----------------------|
//! | CREATE_CHANNEL | new replica on both sides, nonce 0 |
//! | DEPOSIT | free balance of the depositor grows |
//! | PROPOSE_INSTALL / REJECT_INSTALL | pending proposal only |
//! | INSTALL | collateral moves into the app, dependency nonce +1 |
//! | TAKE_ACTION / UPDATE_STATE | app state and local nonce +1 |
//! | UNINSTALL | final balances released, dependency nonce +1 |
//!
//! Every transition is confirmed by a countersigned commitment before the
//! initiator commits it locally.

pub mod adapters;
pub mod context;
pub mod domain;
mod handlers;
pub mod ports;
pub mod registry;
pub mod service;

pub use adapters::Ed25519Signer;
pub use context::ChannelContext;
pub use domain::{AppError, Commitment, LifecycleError};
pub use ports::{AppDefinition, AppLifecycleApi, CommitmentSigner};
pub use registry::AppRegistry;
pub use service::AppLifecycleManager;
