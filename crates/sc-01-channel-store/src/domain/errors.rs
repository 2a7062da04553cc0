//! # Domain Errors
//!
//! Error types for the Channel State Store.

use shared_types::{Address, AppInstanceId, ErrorCode, PeerIdentity};
use thiserror::Error;

/// Channel store error types.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    /// No channel under this multisig address.
    #[error("No state channel at {0:?}")]
    NoStateChannel(Address),

    /// A channel under this address already exists.
    #[error("State channel already exists at {0:?}")]
    ChannelExists(Address),

    /// The channel was faulted and accepts no further transitions.
    #[error("State channel {multisig:?} is faulted: {reason}")]
    ChannelFaulted {
        /// Multisig address of the channel
        multisig: Address,
        /// Why it was faulted
        reason: String,
    },

    /// A conflicting transition is already in flight on the channel.
    #[error("Transition by {originator} already in flight on {multisig:?}")]
    TransitionInFlight {
        /// Multisig address of the channel
        multisig: Address,
        /// Party that started the transition holding the channel
        originator: PeerIdentity,
    },

    /// No pending proposal with this id.
    #[error("No proposal for app instance {0}")]
    NoSuchProposal(AppInstanceId),

    /// The persistence collaborator failed.
    #[error("Persistence failure: {0}")]
    Persistence(String),

    /// A stored snapshot could not be decoded.
    #[error("Corrupt snapshot under {key}: {reason}")]
    Corrupt {
        /// Store key
        key: String,
        /// Decoder message
        reason: String,
    },
}

impl StoreError {
    /// Stable identifier for callers.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::NoStateChannel(_) => ErrorCode::NoStateChannel,
            Self::ChannelExists(_) => ErrorCode::ChannelAlreadyExists,
            Self::ChannelFaulted { .. } => ErrorCode::ChannelFaulted,
            Self::TransitionInFlight { .. } => ErrorCode::StaleNonce,
            Self::NoSuchProposal(_) => ErrorCode::NoSuchProposal,
            Self::Persistence(_) | Self::Corrupt { .. } => ErrorCode::StoreFailure,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes() {
        assert_eq!(
            StoreError::NoStateChannel(Address::zero()).code(),
            ErrorCode::NoStateChannel
        );
        assert_eq!(
            StoreError::Persistence("disk".to_string()).code(),
            ErrorCode::StoreFailure
        );
    }

    #[test]
    fn test_faulted_message() {
        let err = StoreError::ChannelFaulted {
            multisig: Address::zero(),
            reason: "hash mismatch".to_string(),
        };
        assert!(err.to_string().contains("hash mismatch"));
    }
}
