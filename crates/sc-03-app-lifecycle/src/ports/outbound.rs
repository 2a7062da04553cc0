//! # Outbound Ports
//!
//! Collaborators the lifecycle manager depends on but does not implement:
//! per-app state logic and commitment signing.

use crate::domain::AppError;
use serde_json::Value;
use shared_types::{keccak256, CommitmentSignature, PeerIdentity, StateHash};

/// Application-specific state logic, registered per definition address.
pub trait AppDefinition: Send + Sync {
    /// Canonical byte encoding of a state. Fails on malformed state.
    fn encode_state(&self, state: &Value) -> Result<Vec<u8>, AppError>;

    /// Pure transition function.
    fn apply_action(&self, state: &Value, action: &Value) -> Result<Value, AppError>;

    fn state_hash(&self, encoded: &[u8]) -> StateHash {
        keccak256(encoded)
    }
}

/// Signs and verifies commitment digests. Invoked synchronously before a
/// transition is confirmed.
pub trait CommitmentSigner: Send + Sync {
    /// Identity the signatures verify against.
    fn identity(&self) -> PeerIdentity;

    fn sign(&self, digest: &StateHash) -> CommitmentSignature;

    fn verify(
        &self,
        signer: &PeerIdentity,
        digest: &StateHash,
        signature: &CommitmentSignature,
    ) -> bool;
}
