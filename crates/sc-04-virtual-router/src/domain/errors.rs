//! # Domain Errors
//!
//! Error types for the Virtual-Channel Router.

use sc_01_channel_store::StoreError;
use sc_02_free_balance::{BalanceError, ChainError};
use sc_03_app_lifecycle::LifecycleError;
use sc_05_peer_messaging::BridgeError;
use shared_types::{ApiError, ErrorCode, PeerIdentity};
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum RouterError {
    /// Route is malformed or does not match the pending proposal.
    #[error("Invalid route: {0}")]
    InvalidRoute(String),

    /// This node is not where the message claims it is on the route.
    #[error("{peer} is not on the route of {app}")]
    NotOnRoute { peer: PeerIdentity, app: String },

    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),
}

impl RouterError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::InvalidRoute(_) | Self::NotOnRoute { .. } => ErrorCode::InvalidRoute,
            Self::Lifecycle(e) => e.code(),
        }
    }
}

impl From<StoreError> for RouterError {
    fn from(e: StoreError) -> Self {
        Self::Lifecycle(e.into())
    }
}

impl From<BalanceError> for RouterError {
    fn from(e: BalanceError) -> Self {
        Self::Lifecycle(e.into())
    }
}

impl From<ChainError> for RouterError {
    fn from(e: ChainError) -> Self {
        Self::Lifecycle(e.into())
    }
}

impl From<BridgeError> for RouterError {
    fn from(e: BridgeError) -> Self {
        Self::Lifecycle(e.into())
    }
}

impl From<RouterError> for ApiError {
    fn from(err: RouterError) -> Self {
        match err {
            RouterError::Lifecycle(e) => e.into(),
            other => ApiError::new(other.code(), other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_types::ErrorClass;

    #[test]
    fn test_route_errors_are_validation() {
        let err: ApiError = RouterError::InvalidRoute("loop".to_string()).into();
        assert_eq!(err.code, ErrorCode::InvalidRoute);
        assert_eq!(err.class, ErrorClass::Validation);
    }

    #[test]
    fn test_wrapped_codes_pass_through() {
        let err: RouterError = BalanceError::InsufficientFreeBalance {
            peer: "bob".into(),
            required: 5u64.into(),
            available: 1u64.into(),
        }
        .into();
        assert_eq!(err.code(), ErrorCode::InsufficientFreeBalance);

        let peer = ApiError::new(ErrorCode::StaleNonce, "late");
        let err: ApiError = RouterError::from(BridgeError::Rejected(peer)).into();
        assert_eq!(err.code, ErrorCode::StaleNonce);
    }
}
