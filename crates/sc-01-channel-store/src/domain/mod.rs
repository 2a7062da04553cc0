//! Domain layer: channel replicas, in-flight transitions and store errors.

pub mod entities;
pub mod errors;
pub mod in_flight;

pub use entities::{AppInstance, FreeBalance, StateChannel};
pub use errors::StoreError;
pub use in_flight::{InFlight, TransitionKind};
