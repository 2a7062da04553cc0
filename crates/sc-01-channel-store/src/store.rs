//! # Channel Store
//!
//! Exclusive owner of a node's channel replicas and pending proposals.
//!
//! ```text
//! channels: RwLock<HashMap<multisig, Arc<Mutex<Slot>>>>
//!                                     ├── replica
//!                                     └── transitions in flight
//! ```
//!
//! All mutations of one channel are serialized through its mutex. A mutation
//! runs on a working copy and is committed (persisted, then swapped in) only
//! if it succeeds, so nonce increments and balance moves are never observed
//! apart from the structural change they accompany. Unrelated channels never
//! contend. No lock is held across an `.await`.
//!
//! A transition that waits on a peer between deriving and committing holds a
//! [`Reservation`] for that time. Conflicting transitions are refused while
//! it is held; see `domain::in_flight` for which transitions conflict.

use crate::domain::{AppInstance, InFlight, StateChannel, StoreError};
use crate::ports::outbound::{StoreRecord, StoreService};
use parking_lot::{Mutex, RwLock};
use shared_types::{Address, AppInstanceId, AppInstanceProposal, ChannelStatus, PeerIdentity};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

struct Slot {
    channel: StateChannel,
    in_flight: Vec<(u64, InFlight)>,
}

impl Slot {
    fn new(channel: StateChannel) -> Self {
        Self {
            channel,
            in_flight: Vec::new(),
        }
    }

    /// Any held transition that conflicts with `incoming`.
    fn conflicting(&self, incoming: &InFlight) -> Option<&InFlight> {
        self.in_flight
            .iter()
            .map(|(_, held)| held)
            .find(|held| held.conflicts_with(incoming))
    }

    /// A held transition that `incoming` must give way to.
    fn prevailing(&self, incoming: &InFlight) -> Option<&InFlight> {
        self.in_flight
            .iter()
            .map(|(_, held)| held)
            .find(|held| held.prevails_over(incoming))
    }
}

type Entry = Arc<Mutex<Slot>>;

/// Per-node channel state store.
pub struct ChannelStore {
    channels: RwLock<HashMap<Address, Entry>>,
    proposals: RwLock<HashMap<AppInstanceId, AppInstanceProposal>>,
    persistence: Arc<dyn StoreService>,
    key_prefix: String,
    next_reservation: AtomicU64,
}

impl ChannelStore {
    /// Create an empty store persisting under `key_prefix`.
    pub fn new(persistence: Arc<dyn StoreService>, key_prefix: impl Into<String>) -> Self {
        Self {
            channels: RwLock::new(HashMap::new()),
            proposals: RwLock::new(HashMap::new()),
            persistence,
            key_prefix: key_prefix.into(),
            next_reservation: AtomicU64::new(1),
        }
    }

    fn channel_key(&self, multisig: &Address) -> String {
        format!("{}/channel/{:#x}", self.key_prefix, multisig)
    }

    fn index_key(&self) -> String {
        format!("{}/channels", self.key_prefix)
    }

    fn snapshot(&self, channel: &StateChannel) -> Result<StoreRecord, StoreError> {
        let value = serde_json::to_value(channel)
            .map_err(|e| StoreError::Persistence(e.to_string()))?;
        Ok(StoreRecord::new(self.channel_key(&channel.multisig_address), value))
    }

    fn entry(&self, multisig: &Address) -> Result<Entry, StoreError> {
        self.channels
            .read()
            .get(multisig)
            .cloned()
            .ok_or(StoreError::NoStateChannel(*multisig))
    }

    /// Run `f` on a working copy of the slot's replica and swap it in once
    /// persisted.
    fn commit<T, E, F>(&self, slot: &mut Slot, f: F) -> Result<T, E>
    where
        F: FnOnce(&mut StateChannel) -> Result<T, E>,
        E: From<StoreError>,
    {
        let mut working = slot.channel.clone();
        let out = f(&mut working)?;
        self.persistence.set(vec![self.snapshot(&working)?])?;
        debug!(
            multisig = ?working.multisig_address,
            dependency_nonce = working.dependency_nonce,
            "[sc-01] Channel mutation committed"
        );
        slot.channel = working;
        Ok(out)
    }

    // =========================================================================
    // CHANNELS
    // =========================================================================

    /// Latest committed replica of a channel.
    pub fn get(&self, multisig: &Address) -> Option<StateChannel> {
        let entry = self.channels.read().get(multisig).cloned()?;
        let channel = entry.lock().channel.clone();
        Some(channel)
    }

    /// Add a channel that does not exist yet.
    pub fn insert_channel(&self, channel: StateChannel) -> Result<(), StoreError> {
        let mut channels = self.channels.write();
        let multisig = channel.multisig_address;
        if channels.contains_key(&multisig) {
            return Err(StoreError::ChannelExists(multisig));
        }

        let mut index: Vec<Address> = channels.keys().copied().collect();
        index.push(multisig);
        index.sort();
        let index_value =
            serde_json::to_value(&index).map_err(|e| StoreError::Persistence(e.to_string()))?;

        self.persistence.set(vec![
            self.snapshot(&channel)?,
            StoreRecord::new(self.index_key(), index_value),
        ])?;

        info!(multisig = ?multisig, "[sc-01] Channel stored");
        channels.insert(multisig, Arc::new(Mutex::new(Slot::new(channel))));
        Ok(())
    }

    /// Insert or replace a channel wholesale.
    pub fn upsert(&self, channel: StateChannel) -> Result<(), StoreError> {
        let existing = self.channels.read().get(&channel.multisig_address).cloned();
        match existing {
            Some(entry) => {
                let mut slot = entry.lock();
                self.persistence.set(vec![self.snapshot(&channel)?])?;
                slot.channel = channel;
                Ok(())
            }
            None => self.insert_channel(channel),
        }
    }

    /// Apply `f` to a working copy of the channel under its lock.
    ///
    /// The copy replaces the stored replica only if `f` succeeds and the
    /// snapshot is persisted; otherwise nothing changes.
    pub fn mutate<T, E, F>(&self, multisig: &Address, f: F) -> Result<T, E>
    where
        F: FnOnce(&mut StateChannel) -> Result<T, E>,
        E: From<StoreError>,
    {
        let entry = self.entry(multisig)?;
        let mut slot = entry.lock();
        self.commit(&mut slot, f)
    }

    /// Commit a counterparty's transition unless one of ours prevails.
    pub fn accept<T, E, F>(&self, multisig: &Address, incoming: &InFlight, f: F) -> Result<T, E>
    where
        F: FnOnce(&mut StateChannel) -> Result<T, E>,
        E: From<StoreError>,
    {
        let entry = self.entry(multisig)?;
        let mut slot = entry.lock();
        if let Some(held) = slot.prevailing(incoming) {
            debug!(
                multisig = ?multisig,
                held = %held.originator,
                incoming = %incoming.originator,
                "[sc-01] Crossing transition refused"
            );
            return Err(StoreError::TransitionInFlight {
                multisig: *multisig,
                originator: held.originator.clone(),
            }
            .into());
        }
        self.commit(&mut slot, f)
    }

    /// Start one of our own transitions.
    ///
    /// `derive` sees the committed replica under the lock and computes what
    /// the transition will commit. Refused while any conflicting transition
    /// is in flight.
    pub fn reserve<T, E, F>(
        &self,
        multisig: &Address,
        transition: InFlight,
        derive: F,
    ) -> Result<(Reservation<'_>, T), E>
    where
        F: FnOnce(&StateChannel) -> Result<T, E>,
        E: From<StoreError>,
    {
        self.claim(multisig, transition, derive, Slot::conflicting)
    }

    /// Hold a counterparty's transition that can only be committed after a
    /// downstream exchange. Refused like [`accept`](Self::accept).
    pub fn hold<T, E, F>(
        &self,
        multisig: &Address,
        transition: InFlight,
        derive: F,
    ) -> Result<(Reservation<'_>, T), E>
    where
        F: FnOnce(&StateChannel) -> Result<T, E>,
        E: From<StoreError>,
    {
        self.claim(multisig, transition, derive, Slot::prevailing)
    }

    fn claim<T, E, F>(
        &self,
        multisig: &Address,
        transition: InFlight,
        derive: F,
        blocker: for<'s> fn(&'s Slot, &InFlight) -> Option<&'s InFlight>,
    ) -> Result<(Reservation<'_>, T), E>
    where
        F: FnOnce(&StateChannel) -> Result<T, E>,
        E: From<StoreError>,
    {
        let entry = self.entry(multisig)?;
        let (token, out) = {
            let mut slot = entry.lock();
            if let Some(held) = blocker(&*slot, &transition) {
                return Err(StoreError::TransitionInFlight {
                    multisig: *multisig,
                    originator: held.originator.clone(),
                }
                .into());
            }
            let out = derive(&slot.channel)?;
            let token = self.next_reservation.fetch_add(1, Ordering::Relaxed);
            debug!(multisig = ?multisig, originator = %transition.originator, token, "[sc-01] Transition reserved");
            slot.in_flight.push((token, transition));
            (token, out)
        };
        Ok((
            Reservation {
                store: self,
                entry,
                multisig: *multisig,
                token,
            },
            out,
        ))
    }

    /// Mark a channel faulted. Further structural transitions are refused.
    ///
    /// The replica is faulted in memory even when the snapshot cannot be
    /// written; the persistence error is still returned.
    pub fn mark_faulted(&self, multisig: &Address, reason: &str) -> Result<(), StoreError> {
        warn!(multisig = ?multisig, reason, "[sc-01] Channel faulted");
        let entry = self.entry(multisig)?;
        let mut slot = entry.lock();
        slot.channel.status = ChannelStatus::Faulted {
            reason: reason.to_string(),
        };
        let record = self.snapshot(&slot.channel)?;
        self.persistence.set(vec![record])
    }

    /// All channels, ordered by multisig address.
    pub fn channels(&self) -> Vec<StateChannel> {
        let entries: Vec<Entry> = self.channels.read().values().cloned().collect();
        let mut channels: Vec<StateChannel> =
            entries.iter().map(|e| e.lock().channel.clone()).collect();
        channels.sort_by_key(|c| c.multisig_address);
        channels
    }

    /// Multisig addresses of all channels, ordered.
    pub fn addresses(&self) -> Vec<Address> {
        let mut addresses: Vec<Address> = self.channels.read().keys().copied().collect();
        addresses.sort();
        addresses
    }

    /// The channel shared with `peer`.
    pub fn channel_with(&self, peer: &PeerIdentity) -> Option<StateChannel> {
        self.channels()
            .into_iter()
            .find(|c| c.has_participant(peer))
    }

    /// Locate an installed app in any channel.
    pub fn find_app(&self, id: &AppInstanceId) -> Option<(Address, AppInstance)> {
        self.channels().into_iter().find_map(|c| {
            c.app_instances
                .get(id)
                .cloned()
                .map(|app| (c.multisig_address, app))
        })
    }

    /// An app as held in one specific channel.
    pub fn app_in_channel(&self, multisig: &Address, id: &AppInstanceId) -> Option<AppInstance> {
        let entry = self.channels.read().get(multisig).cloned()?;
        let app = entry.lock().channel.app_instances.get(id).cloned();
        app
    }

    /// Installed apps across all channels, one entry per id.
    pub fn apps(&self) -> Vec<AppInstance> {
        let mut apps: HashMap<AppInstanceId, AppInstance> = HashMap::new();
        for channel in self.channels() {
            for (id, app) in channel.app_instances {
                apps.entry(id).or_insert(app);
            }
        }
        let mut apps: Vec<AppInstance> = apps.into_values().collect();
        apps.sort_by(|a, b| a.id.cmp(&b.id));
        apps
    }

    /// Restore channels from persisted snapshots. Returns how many loaded.
    pub fn load_snapshots(&self) -> Result<usize, StoreError> {
        let index_key = self.index_key();
        let Some(index) = self.persistence.get(&index_key)? else {
            return Ok(0);
        };
        let addresses: Vec<Address> =
            serde_json::from_value(index).map_err(|e| StoreError::Corrupt {
                key: index_key.clone(),
                reason: e.to_string(),
            })?;

        let mut channels = self.channels.write();
        let mut loaded = 0;
        for multisig in addresses {
            let key = self.channel_key(&multisig);
            let Some(value) = self.persistence.get(&key)? else {
                warn!(key = %key, "[sc-01] Indexed snapshot missing");
                continue;
            };
            let channel: StateChannel =
                serde_json::from_value(value).map_err(|e| StoreError::Corrupt {
                    key: key.clone(),
                    reason: e.to_string(),
                })?;
            channels.insert(multisig, Arc::new(Mutex::new(Slot::new(channel))));
            loaded += 1;
        }
        info!(loaded, "[sc-01] Channel snapshots restored");
        Ok(loaded)
    }

    // =========================================================================
    // PROPOSALS
    // =========================================================================

    pub fn insert_proposal(&self, proposal: AppInstanceProposal) {
        debug!(app_instance_id = %proposal.app_instance_id, "[sc-01] Proposal stored");
        self.proposals
            .write()
            .insert(proposal.app_instance_id.clone(), proposal);
    }

    pub fn proposal(&self, id: &AppInstanceId) -> Option<AppInstanceProposal> {
        self.proposals.read().get(id).cloned()
    }

    /// Remove and return a pending proposal.
    pub fn take_proposal(&self, id: &AppInstanceId) -> Result<AppInstanceProposal, StoreError> {
        self.proposals
            .write()
            .remove(id)
            .ok_or_else(|| StoreError::NoSuchProposal(id.clone()))
    }

    /// Pending proposals, ordered by id.
    pub fn proposals(&self) -> Vec<AppInstanceProposal> {
        let mut proposals: Vec<AppInstanceProposal> =
            self.proposals.read().values().cloned().collect();
        proposals.sort_by(|a, b| a.app_instance_id.cmp(&b.app_instance_id));
        proposals
    }
}

/// A transition held in flight on one channel. Dropping it without
/// [`commit`](Self::commit) abandons the transition.
#[must_use = "dropping a reservation abandons the transition"]
pub struct Reservation<'a> {
    store: &'a ChannelStore,
    entry: Entry,
    multisig: Address,
    token: u64,
}

impl Reservation<'_> {
    pub fn multisig(&self) -> Address {
        self.multisig
    }

    /// Commit the transition and release the channel under one lock.
    pub fn commit<T, E, F>(self, f: F) -> Result<T, E>
    where
        F: FnOnce(&mut StateChannel) -> Result<T, E>,
        E: From<StoreError>,
    {
        let mut slot = self.entry.lock();
        slot.in_flight.retain(|(token, _)| *token != self.token);
        let out = self.store.commit(&mut slot, f);
        drop(slot);
        out
    }
}

impl Drop for Reservation<'_> {
    fn drop(&mut self) {
        self.entry
            .lock()
            .in_flight
            .retain(|(token, _)| *token != self.token);
    }
}
