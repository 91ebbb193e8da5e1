use loyalty_common::{
    error::{BalanceError, EntryError},
    ids::{AccountId, BookingId, EntryId},
    redemption::RedemptionRejection,
    referral::ReferralError,
    serializer::ReaderError,
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LoyaltyError {
    #[error(transparent)]
    Any(#[from] anyhow::Error),

    #[error("Error while reading data from disk: {0}")]
    ReaderError(#[from] ReaderError),

    #[error("Snapshot already started")]
    SnapshotAlreadyStarted,

    #[error("No snapshot in progress")]
    SnapshotNotStarted,

    #[error("Invalid loyalty policy, check field {0}")]
    InvalidPolicy(&'static str),

    #[error("Account {0} not found")]
    AccountNotFound(AccountId),

    #[error("Account {0} is inactive")]
    AccountInactive(AccountId),

    #[error("Mobile number is already verified by account {0}")]
    MobileAlreadyInUse(AccountId),

    #[error("Ledger entry {0} not found")]
    EntryNotFound(EntryId),

    #[error("Idempotency key {0} belongs to a different operation")]
    KeyConflict(String),

    #[error("Manual adjustments require an operator note")]
    MissingNote,

    #[error("{0}")]
    Rejected(RedemptionRejection),

    #[error(transparent)]
    Balance(#[from] BalanceError),

    #[error(transparent)]
    Entry(#[from] EntryError),

    #[error(transparent)]
    Referral(#[from] ReferralError),

    #[error("Booking {booking} lookup failed: {reason}")]
    BookingLookup { booking: BookingId, reason: String },

    #[error("Error while loading configuration: {0}")]
    Config(String),
}

impl LoyaltyError {
    // Infrastructure failures the caller may retry as is
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Any(_) | Self::BookingLookup { .. })
    }

    pub fn rejection(&self) -> Option<&RedemptionRejection> {
        match self {
            Self::Rejected(r) => Some(r),
            _ => None,
        }
    }
}

impl From<RedemptionRejection> for LoyaltyError {
    fn from(value: RedemptionRejection) -> Self {
        Self::Rejected(value)
    }
}
