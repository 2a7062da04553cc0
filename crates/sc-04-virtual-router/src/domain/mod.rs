//! Domain layer: route errors and hop arithmetic.

pub mod errors;
pub mod hops;

pub use errors::RouterError;
pub use hops::{checked_route, hop_balances, release_balances};
