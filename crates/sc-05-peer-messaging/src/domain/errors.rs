//! # Domain Errors
//!
//! Error types for the Peer Messaging Bridge.

use shared_types::{ApiError, ErrorCode, PeerIdentity};
use thiserror::Error;

/// Bridge error types.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BridgeError {
    /// The transport could not deliver the message.
    #[error("Transport failure towards {peer}: {reason}")]
    Transport {
        /// Intended recipient
        peer: PeerIdentity,
        /// Transport-reported reason
        reason: String,
    },

    /// A message could not be encoded or decoded.
    #[error("Malformed protocol message: {0}")]
    Codec(String),

    /// The counterparty answered with an error.
    #[error("Rejected by peer: {0}")]
    Rejected(ApiError),

    /// The pending call was dropped before a response arrived.
    #[error("Pending call closed before a response arrived")]
    Closed,
}

impl BridgeError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Transport { .. } | Self::Closed => ErrorCode::TransportFailure,
            Self::Codec(_) => ErrorCode::Internal,
            Self::Rejected(e) => e.code,
        }
    }
}

impl From<BridgeError> for ApiError {
    fn from(err: BridgeError) -> Self {
        match err {
            BridgeError::Rejected(e) => e.rejected_by_peer(),
            other => ApiError::new(other.code(), other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_types::ErrorClass;

    #[test]
    fn test_transport_maps_to_io() {
        let err: ApiError = BridgeError::Transport {
            peer: "bob".into(),
            reason: "unreachable".to_string(),
        }
        .into();
        assert_eq!(err.code, ErrorCode::TransportFailure);
        assert_eq!(err.class, ErrorClass::Io);
    }

    #[test]
    fn test_rejection_keeps_peer_code() {
        let peer_err = ApiError::new(ErrorCode::StaleNonce, "nonce 3, expected 2");
        let err: ApiError = BridgeError::Rejected(peer_err).into();
        assert_eq!(err.code, ErrorCode::StaleNonce);
        assert_eq!(err.class, ErrorClass::Protocol);

        let peer_err = ApiError::new(ErrorCode::InsufficientFreeBalance, "short");
        let err: ApiError = BridgeError::Rejected(peer_err).into();
        assert_eq!(err.code, ErrorCode::InsufficientFreeBalance);
        assert_eq!(err.class, ErrorClass::Protocol);
    }
}
