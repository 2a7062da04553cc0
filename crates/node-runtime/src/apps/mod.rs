//! # Reference Apps
//!
//! App definitions every node registers at startup, at fixed definition
//! addresses.

pub mod payment;
pub mod tic_tac_toe;

pub use payment::{PaymentApp, PaymentState};
pub use tic_tac_toe::TicTacToeApp;

use sc_03_app_lifecycle::AppRegistry;
use shared_types::{Address, AppIdentity};
use std::sync::Arc;

/// Definition address of [`TicTacToeApp`].
pub fn tic_tac_toe_definition() -> Address {
    Address::from_low_u64_be(0x7770)
}

/// Definition address of [`PaymentApp`].
pub fn payment_definition() -> Address {
    Address::from_low_u64_be(0x9a70)
}

pub fn tic_tac_toe_identity() -> AppIdentity {
    AppIdentity {
        definition: tic_tac_toe_definition(),
        state_encoding: tic_tac_toe::STATE_ENCODING.to_string(),
        action_encoding: Some(tic_tac_toe::ACTION_ENCODING.to_string()),
    }
}

pub fn payment_identity() -> AppIdentity {
    AppIdentity {
        definition: payment_definition(),
        state_encoding: payment::STATE_ENCODING.to_string(),
        action_encoding: None,
    }
}

pub fn register_reference_apps(registry: &AppRegistry) {
    registry.register(tic_tac_toe_definition(), Arc::new(TicTacToeApp));
    registry.register(payment_definition(), Arc::new(PaymentApp));
}
