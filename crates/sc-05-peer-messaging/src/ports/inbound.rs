//! # Inbound Ports
//!
//! Components that answer protocol requests register an [`InboundHandler`]
//! for the message kinds they own.

use crate::domain::{ProtocolMessage, ProtocolReply};
use async_trait::async_trait;
use shared_types::{ApiError, PeerIdentity};

#[async_trait]
pub trait InboundHandler: Send + Sync {
    /// Handle a request from `from`. An error is sent back as a rejection.
    async fn handle(
        &self,
        from: &PeerIdentity,
        message: ProtocolMessage,
    ) -> Result<ProtocolReply, ApiError>;
}
