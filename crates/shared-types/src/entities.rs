//! # Core Entities
//!
//! Identities, amounts and app descriptors shared by every channel subsystem.
//!
//! Amounts are `U256`, multisig addresses are `H160` and state hashes are
//! Keccak-256 digests stored as `H256`.

use primitive_types::{H160, H256, U256};
use serde::{Deserialize, Serialize};
use serde_with::{hex::Hex, serde_as};
use sha3::{Digest, Keccak256};
use std::collections::{BTreeMap, HashSet};
use std::fmt;

/// 20-byte multisig wallet address.
pub type Address = H160;

/// Token amount held in a channel.
pub type Amount = U256;

/// Keccak-256 digest of an encoded app state or a commitment.
pub type StateHash = H256;

/// Per-participant balances. Ordered so that serialization and hashing are
/// deterministic.
pub type Balances = BTreeMap<PeerIdentity, Amount>;

/// Compute the Keccak-256 digest of `data`.
pub fn keccak256(data: &[u8]) -> StateHash {
    let mut hasher = Keccak256::new();
    hasher.update(data);
    H256::from_slice(&hasher.finalize())
}

/// Sum a set of balances, returning `None` on overflow.
pub fn sum_balances(balances: &Balances) -> Option<Amount> {
    balances
        .values()
        .try_fold(Amount::zero(), |acc, v| acc.checked_add(*v))
}

// =============================================================================
// IDENTITIES
// =============================================================================

/// Stable public identifier of a node.
///
/// Identities are totally ordered; the smaller one of a channel's pair is
/// "party A".
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PeerIdentity(String);

impl PeerIdentity {
    /// Wrap an identifier string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PeerIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PeerIdentity {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Identifier of an app instance, unique within its channel.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AppInstanceId(String);

impl AppInstanceId {
    /// Wrap an existing identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a fresh random identifier.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// True when the identifier is empty or whitespace.
    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }

    /// The identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AppInstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AppInstanceId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Signature over a commitment digest, hex encoded on the wire.
#[serde_as]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommitmentSignature(#[serde_as(as = "Hex")] pub Vec<u8>);

impl CommitmentSignature {
    /// Raw signature bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

// =============================================================================
// APP DESCRIPTORS
// =============================================================================

/// Reference to an external app definition and its encodings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppIdentity {
    /// Address of the app definition.
    pub definition: Address,
    /// ABI-style description of the state encoding.
    pub state_encoding: String,
    /// ABI-style description of the action encoding. Apps without one only
    /// accept explicit state updates.
    pub action_encoding: Option<String>,
}

/// A proposed, not yet installed, app instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppInstanceProposal {
    pub app_instance_id: AppInstanceId,
    pub app: AppIdentity,
    pub initial_state: serde_json::Value,
    pub initiator: PeerIdentity,
    pub responder: PeerIdentity,
    pub initiator_deposit: Amount,
    pub responder_deposit: Amount,
    pub timeout: u64,
    /// Empty for apps installed directly in a shared channel.
    pub intermediaries: Vec<PeerIdentity>,
}

impl AppInstanceProposal {
    /// True when the app is routed through intermediaries.
    pub fn is_virtual(&self) -> bool {
        !self.intermediaries.is_empty()
    }

    /// The end party opposite `me`, if `me` is an end.
    pub fn counterparty_of(&self, me: &PeerIdentity) -> Option<&PeerIdentity> {
        if *me == self.initiator {
            Some(&self.responder)
        } else if *me == self.responder {
            Some(&self.initiator)
        } else {
            None
        }
    }

    /// Route from initiator to responder.
    pub fn route(&self) -> VirtualRoute {
        VirtualRoute::new(&self.initiator, &self.intermediaries, &self.responder)
    }
}

/// Public, static view of an installed app instance.
///
/// Returned by install and by details queries; the two are equal for the
/// same instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppInstanceInfo {
    pub id: AppInstanceId,
    pub app: AppIdentity,
    pub initiator: PeerIdentity,
    pub responder: PeerIdentity,
    pub initiator_deposit: Amount,
    pub responder_deposit: Amount,
    pub timeout: u64,
    pub intermediaries: Vec<PeerIdentity>,
}

// =============================================================================
// CHANNEL VIEWS
// =============================================================================

/// Lifecycle status of a channel.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum ChannelStatus {
    /// Channel accepts transitions.
    #[default]
    Open,
    /// Local and remote copies diverged; no further transitions.
    Faulted { reason: String },
}

impl ChannelStatus {
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Open)
    }
}

/// Undedicated collateral of a channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FreeBalanceInfo {
    pub multisig_address: Address,
    pub balances: Balances,
}

/// Snapshot of a channel as seen by one participant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateChannelInfo {
    pub multisig_address: Address,
    pub participants: [PeerIdentity; 2],
    pub me: PeerIdentity,
    pub counterparty: PeerIdentity,
    pub free_balance: Balances,
    pub dependency_nonce: u64,
    pub app_instance_ids: Vec<AppInstanceId>,
    pub total_deposited: Amount,
    pub status: ChannelStatus,
}

// =============================================================================
// VIRTUAL ROUTES
// =============================================================================

/// Ordered path of a virtual app: initiator, intermediaries, responder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VirtualRoute {
    members: Vec<PeerIdentity>,
}

impl VirtualRoute {
    pub fn new(
        initiator: &PeerIdentity,
        intermediaries: &[PeerIdentity],
        responder: &PeerIdentity,
    ) -> Self {
        let mut members = Vec::with_capacity(intermediaries.len() + 2);
        members.push(initiator.clone());
        members.extend(intermediaries.iter().cloned());
        members.push(responder.clone());
        Self { members }
    }

    pub fn members(&self) -> &[PeerIdentity] {
        &self.members
    }

    /// Checks the route has at least one intermediary and visits no peer twice.
    pub fn validate(&self) -> Result<(), String> {
        if self.members.len() < 3 {
            return Err("virtual route needs at least one intermediary".to_string());
        }
        let mut seen = HashSet::new();
        for peer in &self.members {
            if !seen.insert(peer) {
                return Err(format!("peer {peer} appears twice on the route"));
            }
        }
        Ok(())
    }

    pub fn position(&self, peer: &PeerIdentity) -> Option<usize> {
        self.members.iter().position(|p| p == peer)
    }

    pub fn initiator(&self) -> &PeerIdentity {
        &self.members[0]
    }

    pub fn responder(&self) -> &PeerIdentity {
        &self.members[self.members.len() - 1]
    }

    pub fn is_end(&self, peer: &PeerIdentity) -> bool {
        peer == self.initiator() || peer == self.responder()
    }

    /// The other end of the route, when `end` is one.
    pub fn opposite_end(&self, end: &PeerIdentity) -> Option<&PeerIdentity> {
        if end == self.initiator() {
            Some(self.responder())
        } else if end == self.responder() {
            Some(self.initiator())
        } else {
            None
        }
    }

    /// The end a message from neighbour `from` is travelling toward, as
    /// seen by `me`.
    pub fn far_end(&self, from: &PeerIdentity, me: &PeerIdentity) -> Option<&PeerIdentity> {
        let here = self.position(me)?;
        let there = self.position(from)?;
        if there < here {
            Some(self.responder())
        } else {
            Some(self.initiator())
        }
    }

    /// Neighbour of `me` one step toward `toward`.
    pub fn next_hop(&self, me: &PeerIdentity, toward: &PeerIdentity) -> Option<&PeerIdentity> {
        let here = self.position(me)?;
        let there = self.position(toward)?;
        match here.cmp(&there) {
            std::cmp::Ordering::Less => self.members.get(here + 1),
            std::cmp::Ordering::Greater => self.members.get(here - 1),
            std::cmp::Ordering::Equal => None,
        }
    }

    /// True when `a` and `b` are adjacent on the route.
    pub fn adjacent(&self, a: &PeerIdentity, b: &PeerIdentity) -> bool {
        match (self.position(a), self.position(b)) {
            (Some(x), Some(y)) => x.abs_diff(y) == 1,
            _ => false,
        }
    }

    /// Orders a hop pair so the member closer to the initiator comes first.
    pub fn orient<'a>(
        &self,
        a: &'a PeerIdentity,
        b: &'a PeerIdentity,
    ) -> Option<(&'a PeerIdentity, &'a PeerIdentity)> {
        let x = self.position(a)?;
        let y = self.position(b)?;
        if x < y {
            Some((a, b))
        } else {
            Some((b, a))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn peer(s: &str) -> PeerIdentity {
        PeerIdentity::new(s)
    }

    #[test]
    fn test_peer_identity_ordering() {
        assert!(peer("alice") < peer("bob"));
        let mut pair = [peer("carol"), peer("bob")];
        pair.sort();
        assert_eq!(pair[0], peer("bob"));
    }

    #[test]
    fn test_app_instance_id_empty() {
        assert!(AppInstanceId::new("").is_empty());
        assert!(AppInstanceId::new("  ").is_empty());
        assert!(!AppInstanceId::generate().is_empty());
    }

    #[test]
    fn test_keccak_known_vector() {
        let empty = keccak256(&[]);
        assert_eq!(
            hex::encode(empty.as_bytes()),
            "c5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a470"
        );
    }

    #[test]
    fn test_signature_hex_serialization() {
        let sig = CommitmentSignature(vec![0xde, 0xad]);
        let json = serde_json::to_string(&sig).unwrap();
        assert_eq!(json, "\"dead\"");
        let back: CommitmentSignature = serde_json::from_str(&json).unwrap();
        assert_eq!(back, sig);
    }

    #[test]
    fn test_route_next_hop_both_directions() {
        let route = VirtualRoute::new(&peer("a"), &[peer("b"), peer("c")], &peer("d"));
        assert_eq!(route.next_hop(&peer("a"), &peer("d")), Some(&peer("b")));
        assert_eq!(route.next_hop(&peer("c"), &peer("d")), Some(&peer("d")));
        assert_eq!(route.next_hop(&peer("d"), &peer("a")), Some(&peer("c")));
        assert_eq!(route.next_hop(&peer("a"), &peer("a")), None);
        assert!(route.adjacent(&peer("b"), &peer("c")));
        assert!(!route.adjacent(&peer("a"), &peer("c")));
    }

    #[test]
    fn test_route_orient() {
        let route = VirtualRoute::new(&peer("a"), &[peer("b")], &peer("c"));
        assert_eq!(
            route.orient(&peer("c"), &peer("b")),
            Some((&peer("b"), &peer("c")))
        );
    }

    #[test]
    fn test_route_ends() {
        let route = VirtualRoute::new(&peer("a"), &[peer("b"), peer("c")], &peer("d"));
        assert_eq!(route.opposite_end(&peer("a")), Some(&peer("d")));
        assert_eq!(route.opposite_end(&peer("d")), Some(&peer("a")));
        assert_eq!(route.opposite_end(&peer("b")), None);
        assert_eq!(route.far_end(&peer("b"), &peer("c")), Some(&peer("d")));
        assert_eq!(route.far_end(&peer("d"), &peer("c")), Some(&peer("a")));
        assert_eq!(route.far_end(&peer("x"), &peer("c")), None);
    }

    #[test]
    fn test_route_validation() {
        assert!(VirtualRoute::new(&peer("a"), &[], &peer("c"))
            .validate()
            .is_err());
        assert!(VirtualRoute::new(&peer("a"), &[peer("a")], &peer("c"))
            .validate()
            .is_err());
        assert!(VirtualRoute::new(&peer("a"), &[peer("b")], &peer("c"))
            .validate()
            .is_ok());
    }

    #[test]
    fn test_sum_balances() {
        let mut balances = Balances::new();
        balances.insert(peer("a"), Amount::from(3));
        balances.insert(peer("b"), Amount::from(4));
        assert_eq!(sum_balances(&balances), Some(Amount::from(7)));
        balances.insert(peer("c"), Amount::MAX);
        assert_eq!(sum_balances(&balances), None);
    }
}
