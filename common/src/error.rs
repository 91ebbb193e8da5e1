use thiserror::Error;

use crate::ledger::EntryStatus;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BalanceError {
    #[error("Balance overflow")]
    Overflow,

    #[error("Insufficient balance: need {need}, have {have}")]
    Insufficient { need: u64, have: u64 },

    #[error("Pending balance underflow: releasing {amount}, pending {pending}")]
    PendingUnderflow { amount: u64, pending: u64 },
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EntryError {
    #[error("Invalid status transition from {from} to {to}")]
    InvalidTransition { from: EntryStatus, to: EntryStatus },

    #[error("Zero point delta")]
    ZeroDelta,

    #[error("Earn entries must credit points, got {0}")]
    NegativeEarn(i64),
}
