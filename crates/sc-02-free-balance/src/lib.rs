//! # SC-02 Free-Balance Reconciler
//!
//! Collateral bookkeeping between a channel's free balance and its apps.
//!
//! **Subsystem ID:** 2
//! **Architecture:** Hexagonal (Domain + Ports/Adapters)
//!
//! ## Invariant
//!
//! ```text
//! free[A] + free[B] + Σ installed app balances == total deposited
//! ```
//!
//! Checked after every deposit, install and uninstall. A violation is a
//! consistency error and is reported, never patched.
//!
//! ## Module Structure
//!
//! ```text
//! sc-02-free-balance/
//! ├── domain/        # BalanceError, ChainError, invariants
//! ├── ports/         # BlockchainClient (outbound)
//! ├── adapters/      # InMemoryChain
//! └── reconciler.rs  # FreeBalanceReconciler
//! ```

#![warn(clippy::all)]

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod reconciler;

pub use adapters::InMemoryChain;
pub use domain::{
    invariant_conservation, invariant_participants_only, invariant_sufficient_funds,
    BalanceError, ChainError,
};
pub use ports::BlockchainClient;
pub use reconciler::FreeBalanceReconciler;
