//! # Domain Errors
//!
//! Error types for the Free-Balance Reconciler.

use shared_types::{Address, Amount, ErrorCode, PeerIdentity};
use thiserror::Error;

/// Blockchain collaborator failures.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ChainError {
    /// The chain could not be reached.
    #[error("Chain unavailable: {0}")]
    Unavailable(String),

    /// No multisig was deployed at this address.
    #[error("Unknown multisig {0:?}")]
    UnknownMultisig(Address),
}

/// Free-balance error types.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BalanceError {
    /// A participant's free balance cannot cover its share.
    #[error("Insufficient free balance for {peer}: required {required}, available {available}")]
    InsufficientFreeBalance {
        /// Participant short of funds
        peer: PeerIdentity,
        /// Amount it must commit
        required: Amount,
        /// Amount it holds
        available: Amount,
    },

    /// Free balance plus committed collateral no longer equals deposits.
    #[error("Conservation violated on {multisig:?}: free {free} + committed {committed} != deposited {deposited}")]
    ConservationViolated {
        /// Channel
        multisig: Address,
        /// Sum of free balances
        free: Amount,
        /// Sum of installed app balances
        committed: Amount,
        /// Total confirmed deposits
        deposited: Amount,
    },

    /// The chain does not show the claimed deposit.
    #[error("Deposit not confirmed on {multisig:?}: expected at least {expected}, chain holds {on_chain}")]
    DepositNotConfirmed {
        /// Channel
        multisig: Address,
        /// Total after the claimed deposit
        expected: Amount,
        /// Balance reported by the chain
        on_chain: Amount,
    },

    /// Balances name someone outside the channel.
    #[error("{0} is not a participant of this channel")]
    NotAParticipant(PeerIdentity),

    /// Arithmetic overflow.
    #[error("Amount overflow")]
    Overflow,

    /// Chain collaborator failure.
    #[error(transparent)]
    Chain(#[from] ChainError),
}

impl BalanceError {
    /// Stable identifier for callers.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::InsufficientFreeBalance { .. } => ErrorCode::InsufficientFreeBalance,
            Self::ConservationViolated { .. } => ErrorCode::ConservationViolated,
            Self::DepositNotConfirmed { .. } => ErrorCode::DepositNotConfirmed,
            Self::NotAParticipant(_) => ErrorCode::InvalidFinalBalances,
            Self::Overflow => ErrorCode::InvalidParams,
            Self::Chain(_) => ErrorCode::ChainFailure,
        }
    }
}

impl ChainError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Unavailable(_) => ErrorCode::ChainFailure,
            Self::UnknownMultisig(_) => ErrorCode::InvalidOwners,
        }
    }
}
