use strum::{AsRefStr, Display, EnumIter};

const PREFIX_ID_LEN: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Eq, Ord, Hash, EnumIter, Display, AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum Column {
    // Misc data with no specific rules
    // {name} => {value}
    Common,

    // {account_id} => {account}
    Accounts,
    // Normalized email to owner
    // {email_hash} => {account_id}
    AccountsByEmail,
    // Normalized mobile number to owner
    // {mobile_hash} => {account_id}
    AccountsByMobile,

    // Derived balance per account
    // {account_id} => {balance}
    Balances,
    // All ledger entries
    // {entry_id} => {entry}
    LedgerEntries,
    // Uniqueness constraint of the ledger
    // {idempotency_key} => {entry_id}
    IdempotencyKeys,
    // {account_id}{created_at}{entry_id} => {}
    EntriesByAccount,
    // Earn entries waiting for settlement
    // {created_at}{entry_id} => {account_id}
    PendingEntries,
    // Redemption debits, summed for the rolling cap
    // {account_id}{created_at}{entry_id} => {points}
    RedemptionsByAccount,
    // Result returned for each redemption request
    // {entry_id} => {reservation}
    Reservations,
    // Completed bookings per account: confirmed earn entries plus bookings
    // too small to earn anything
    // {account_id} => {count}
    CompletedBookings,
    // Bookings already counted without an earn entry
    // {booking_id} => {account_id}
    ZeroPointBookings,

    // One record per referee
    // {referee_id} => {referral record}
    Referrals,
    // {referrer_id}{referee_id} => {}
    ReferralsByReferrer,
    // Device fingerprint already attached to a referral
    // {device_hash} => {referee_id}
    ReferralDevices,
    // Payment method to the first referrer it was seen with
    // {payment_hash} => {referrer_id}
    ReferralPaymentMethods,
    // {code} => {referral code}
    ReferralCodes,
    // At most one active code per account
    // {account_id} => {code}
    ActiveReferralCodes,
}

impl Column {
    pub const fn prefix(&self) -> Option<usize> {
        use Column::*;

        match self {
            EntriesByAccount | RedemptionsByAccount | ReferralsByReferrer => Some(PREFIX_ID_LEN),
            _ => None,
        }
    }
}
