//! Domain layer: balance errors and collateral invariants.

pub mod errors;
pub mod invariants;

pub use errors::{BalanceError, ChainError};
pub use invariants::{
    invariant_conservation, invariant_participants_only, invariant_sufficient_funds,
};
