//! # Ed25519 Commitment Signer
//!
//! A node's identity is the hex encoding of its Ed25519 verifying key, so
//! any peer can check a signature from the identity alone.

use crate::ports::CommitmentSigner;
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use shared_types::{CommitmentSignature, PeerIdentity, StateHash};

pub struct Ed25519Signer {
    signing_key: SigningKey,
    identity: PeerIdentity,
}

impl Ed25519Signer {
    /// Deterministic signer from a 32-byte seed.
    pub fn from_seed(seed: &[u8; 32]) -> Self {
        let signing_key = SigningKey::from_bytes(seed);
        let identity = PeerIdentity::new(hex::encode(signing_key.verifying_key().to_bytes()));
        Self {
            signing_key,
            identity,
        }
    }

    fn verifying_key(identity: &PeerIdentity) -> Option<VerifyingKey> {
        let bytes: [u8; 32] = hex::decode(identity.as_str()).ok()?.try_into().ok()?;
        VerifyingKey::from_bytes(&bytes).ok()
    }
}

impl CommitmentSigner for Ed25519Signer {
    fn identity(&self) -> PeerIdentity {
        self.identity.clone()
    }

    fn sign(&self, digest: &StateHash) -> CommitmentSignature {
        CommitmentSignature(self.signing_key.sign(digest.as_bytes()).to_bytes().to_vec())
    }

    fn verify(
        &self,
        signer: &PeerIdentity,
        digest: &StateHash,
        signature: &CommitmentSignature,
    ) -> bool {
        let Some(key) = Self::verifying_key(signer) else {
            return false;
        };
        let Ok(signature) = Signature::from_slice(signature.as_bytes()) else {
            return false;
        };
        key.verify(digest.as_bytes(), &signature).is_ok()
    }
}
