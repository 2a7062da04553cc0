//! Domain layer: commitments, lifecycle errors and channel transitions.

pub mod commitment;
pub mod errors;
pub mod transitions;

pub use commitment::Commitment;
pub use errors::{AppError, LifecycleError};
pub use transitions::{
    apply_update, build_app_instance, install_into, uninstall_from, validate_final_balances,
};
