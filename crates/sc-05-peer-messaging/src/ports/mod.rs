//! Ports for the Peer Messaging Bridge.

pub mod inbound;
pub mod outbound;

pub use inbound::InboundHandler;
pub use outbound::{Direction, MessageObserver, MessagingService, NoopMessageObserver};
