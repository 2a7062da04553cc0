//! # Error Types
//!
//! Stable, caller-visible error identifiers. Every subsystem error maps to
//! exactly one [`ErrorCode`], and every code belongs to exactly one
//! [`ErrorClass`].

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Error taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorClass {
    /// Malformed or missing parameters. Nothing was mutated or sent.
    Validation,
    /// The counterparty rejected or failed to confirm a transition.
    Protocol,
    /// Local and remote replicas diverged. Fatal for the channel.
    Consistency,
    /// A messaging, store or chain collaborator failed. Retryable.
    Io,
}

/// Stable error identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Validation
    NoAppInstanceForTakeAction,
    NoAppInstanceIdToInstall,
    NoSuchAppInstance,
    NoSuchProposal,
    NoStateChannel,
    ChannelAlreadyExists,
    InvalidOwners,
    InvalidParams,
    InvalidAction,
    InvalidState,
    InvalidFinalBalances,
    InsufficientFreeBalance,
    NoAppDefinition,
    InvalidRoute,
    // Protocol
    PeerRejected,
    StaleNonce,
    InvalidSignature,
    StateHashMismatch,
    DepositNotConfirmed,
    ChannelFaulted,
    // Consistency
    ConsistencyViolation,
    ConservationViolated,
    // I/O
    TransportFailure,
    StoreFailure,
    ChainFailure,
    Internal,
}

impl ErrorCode {
    /// The class this code belongs to.
    pub fn class(self) -> ErrorClass {
        use ErrorCode::*;
        match self {
            NoAppInstanceForTakeAction
            | NoAppInstanceIdToInstall
            | NoSuchAppInstance
            | NoSuchProposal
            | NoStateChannel
            | ChannelAlreadyExists
            | InvalidOwners
            | InvalidParams
            | InvalidAction
            | InvalidState
            | InvalidFinalBalances
            | InsufficientFreeBalance
            | NoAppDefinition
            | InvalidRoute => ErrorClass::Validation,
            PeerRejected | StaleNonce | InvalidSignature | StateHashMismatch
            | DepositNotConfirmed | ChannelFaulted => ErrorClass::Protocol,
            ConsistencyViolation | ConservationViolated => ErrorClass::Consistency,
            TransportFailure | StoreFailure | ChainFailure | Internal => ErrorClass::Io,
        }
    }

    /// Wire identifier, e.g. `NO_APP_INSTANCE_FOR_TAKE_ACTION`.
    pub fn as_str(self) -> &'static str {
        use ErrorCode::*;
        match self {
            NoAppInstanceForTakeAction => "NO_APP_INSTANCE_FOR_TAKE_ACTION",
            NoAppInstanceIdToInstall => "NO_APP_INSTANCE_ID_TO_INSTALL",
            NoSuchAppInstance => "NO_SUCH_APP_INSTANCE",
            NoSuchProposal => "NO_SUCH_PROPOSAL",
            NoStateChannel => "NO_STATE_CHANNEL",
            ChannelAlreadyExists => "CHANNEL_ALREADY_EXISTS",
            InvalidOwners => "INVALID_OWNERS",
            InvalidParams => "INVALID_PARAMS",
            InvalidAction => "INVALID_ACTION",
            InvalidState => "INVALID_STATE",
            InvalidFinalBalances => "INVALID_FINAL_BALANCES",
            InsufficientFreeBalance => "INSUFFICIENT_FREE_BALANCE",
            NoAppDefinition => "NO_APP_DEFINITION",
            InvalidRoute => "INVALID_ROUTE",
            PeerRejected => "PEER_REJECTED",
            StaleNonce => "STALE_NONCE",
            InvalidSignature => "INVALID_SIGNATURE",
            StateHashMismatch => "STATE_HASH_MISMATCH",
            DepositNotConfirmed => "DEPOSIT_NOT_CONFIRMED",
            ChannelFaulted => "CHANNEL_FAULTED",
            ConsistencyViolation => "CONSISTENCY_VIOLATION",
            ConservationViolated => "CONSERVATION_VIOLATED",
            TransportFailure => "TRANSPORT_FAILURE",
            StoreFailure => "STORE_FAILURE",
            ChainFailure => "CHAIN_FAILURE",
            Internal => "INTERNAL",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured error carried in method responses and protocol replies.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{code}: {message}")]
pub struct ApiError {
    pub code: ErrorCode,
    pub class: ErrorClass,
    pub message: String,
}

impl ApiError {
    /// Build an error whose class follows from its code.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            class: code.class(),
            message: message.into(),
        }
    }

    /// Re-class an error received from a counterparty.
    ///
    /// The peer's code is kept; for the local caller it is a rejected
    /// transition.
    pub fn rejected_by_peer(self) -> Self {
        Self {
            class: ErrorClass::Protocol,
            ..self
        }
    }
}
