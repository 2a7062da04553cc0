//! # SC-01 Channel State Store
//!
//! Per-node, explicitly constructed owner of every channel replica.
//!
//! **Subsystem ID:** 1
//! **Architecture:** Hexagonal (Domain + Ports/Adapters)
//!
//! ## Guarantees
//!
//! - Reads observe the latest committed mutation.
//! - Mutations of one multisig are serialized and all-or-nothing.
//! - Crossing transitions from both replicas are settled the same way on
//!   both sides (see `domain::in_flight`).
//! - Every committed replica is snapshotted through the `StoreService` port.
//!
//! ## Module Structure
//!
//! ```text
//! sc-01-channel-store/
//! ├── domain/     # StateChannel, FreeBalance, AppInstance, InFlight, StoreError
//! ├── ports/      # StoreService (outbound)
//! ├── adapters/   # InMemoryStoreService
//! └── store.rs    # ChannelStore
//! ```

#![warn(clippy::all)]

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod store;

pub use adapters::InMemoryStoreService;
pub use domain::{AppInstance, FreeBalance, InFlight, StateChannel, StoreError, TransitionKind};
pub use ports::{StoreRecord, StoreService};
pub use store::{ChannelStore, Reservation};
