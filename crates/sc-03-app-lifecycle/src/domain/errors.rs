//! # Domain Errors
//!
//! Error types for the App-Instance Lifecycle Manager.

use sc_01_channel_store::StoreError;
use sc_02_free_balance::{BalanceError, ChainError};
use sc_05_peer_messaging::BridgeError;
use shared_types::{Address, ApiError, AppInstanceId, ErrorCode, PeerIdentity};
use thiserror::Error;

/// Failure reported by an app definition.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AppError {
    #[error("Invalid app state: {0}")]
    InvalidState(String),

    #[error("Invalid app action: {0}")]
    InvalidAction(String),
}

/// Lifecycle error types.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum LifecycleError {
    /// Take-action request naming an empty or unknown app instance.
    #[error("No app instance for take action: {0:?}")]
    NoAppInstanceForTakeAction(AppInstanceId),

    /// Install request without an app instance id.
    #[error("No app instance id to install")]
    NoAppInstanceIdToInstall,

    #[error("No such app instance: {0}")]
    NoSuchAppInstance(AppInstanceId),

    /// No channel is shared with this peer.
    #[error("No state channel with {0}")]
    NoChannelWith(PeerIdentity),

    #[error("Invalid multisig owners: {0}")]
    InvalidOwners(String),

    #[error("Invalid parameters: {0}")]
    InvalidParams(String),

    #[error("Invalid final balances: {0}")]
    InvalidFinalBalances(String),

    #[error("No app definition registered at {0:?}")]
    NoAppDefinition(Address),

    #[error(transparent)]
    App(#[from] AppError),

    /// Update nonce is not exactly one above the local copy.
    #[error("Stale nonce: expected {expected}, got {got}")]
    StaleNonce { expected: u64, got: u64 },

    #[error("Invalid signature from {0}")]
    InvalidSignature(PeerIdentity),

    #[error("State hash mismatch for {0}")]
    StateHashMismatch(AppInstanceId),

    /// Local and remote replicas diverged. The channel is faulted.
    #[error("Consistency violation: {0}")]
    Consistency(String),

    #[error("Commitment encoding failed: {0}")]
    Encoding(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Balance(#[from] BalanceError),

    #[error(transparent)]
    Chain(#[from] ChainError),

    #[error(transparent)]
    Bridge(#[from] BridgeError),
}

impl LifecycleError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::NoAppInstanceForTakeAction(_) => ErrorCode::NoAppInstanceForTakeAction,
            Self::NoAppInstanceIdToInstall => ErrorCode::NoAppInstanceIdToInstall,
            Self::NoSuchAppInstance(_) => ErrorCode::NoSuchAppInstance,
            Self::NoChannelWith(_) => ErrorCode::NoStateChannel,
            Self::InvalidOwners(_) => ErrorCode::InvalidOwners,
            Self::InvalidParams(_) => ErrorCode::InvalidParams,
            Self::InvalidFinalBalances(_) => ErrorCode::InvalidFinalBalances,
            Self::NoAppDefinition(_) => ErrorCode::NoAppDefinition,
            Self::App(AppError::InvalidState(_)) => ErrorCode::InvalidState,
            Self::App(AppError::InvalidAction(_)) => ErrorCode::InvalidAction,
            Self::StaleNonce { .. } => ErrorCode::StaleNonce,
            Self::InvalidSignature(_) => ErrorCode::InvalidSignature,
            Self::StateHashMismatch(_) => ErrorCode::StateHashMismatch,
            Self::Consistency(_) => ErrorCode::ConsistencyViolation,
            Self::Encoding(_) => ErrorCode::Internal,
            Self::Store(e) => e.code(),
            Self::Balance(e) => e.code(),
            Self::Chain(e) => e.code(),
            Self::Bridge(e) => e.code(),
        }
    }

    pub fn is_consistency(&self) -> bool {
        matches!(self, Self::Consistency(_))
            || matches!(self, Self::Balance(BalanceError::ConservationViolated { .. }))
    }
}

impl From<LifecycleError> for ApiError {
    fn from(err: LifecycleError) -> Self {
        match err {
            LifecycleError::Bridge(e) => e.into(),
            other => ApiError::new(other.code(), other.to_string()),
        }
    }
}
