//! Domain layer: wire envelope, bridge errors, duplicate filter and
//! pending-call table.

pub mod dedup;
pub mod envelope;
pub mod errors;
pub mod pending;

pub use dedup::{DedupError, MessageDedupCache};
pub use envelope::{
    EnvelopeBody, MessageKind, ProtocolEnvelope, ProtocolMessage, ProtocolReply,
    ProtocolResponse, StateUpdate, TransitionDigest,
};
pub use errors::BridgeError;
pub use pending::PendingCalls;
