//! # Payment
//!
//! Two-party payment app. It has no action encoding: each update names the
//! new balance pair directly and the total never changes.
//!
//! ```text
//! state: { balances: [u64, u64], total: u64 }
//! ```

use sc_03_app_lifecycle::{AppDefinition, AppError};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const STATE_ENCODING: &str = "tuple(uint256[2] balances, uint256 total)";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentState {
    pub balances: [u64; 2],
    pub total: u64,
}

impl PaymentState {
    pub fn new(a: u64, b: u64) -> Self {
        Self {
            balances: [a, b],
            total: a + b,
        }
    }

    pub fn to_value(self) -> Value {
        serde_json::json!({ "balances": self.balances, "total": self.total })
    }
}

pub struct PaymentApp;

impl AppDefinition for PaymentApp {
    fn encode_state(&self, state: &Value) -> Result<Vec<u8>, AppError> {
        let state: PaymentState = serde_json::from_value(state.clone())
            .map_err(|e| AppError::InvalidState(e.to_string()))?;
        let sum = state.balances[0].checked_add(state.balances[1]);
        if sum != Some(state.total) {
            return Err(AppError::InvalidState(format!(
                "balances {:?} do not add up to {}",
                state.balances, state.total
            )));
        }

        let mut out = Vec::with_capacity(32 * 3);
        for word in [state.balances[0], state.balances[1], state.total] {
            out.extend_from_slice(&[0u8; 24]);
            out.extend_from_slice(&word.to_be_bytes());
        }
        Ok(out)
    }

    fn apply_action(&self, _state: &Value, _action: &Value) -> Result<Value, AppError> {
        Err(AppError::InvalidAction(
            "payment apps take explicit state updates".to_string(),
        ))
    }
}
