use async_trait::async_trait;
use loyalty_common::{
    ids::{AccountId, BookingId, EntryId},
    ledger::{Balance, IdempotencyKey, LedgerEntry},
    redemption::Reservation,
    serializer::{Reader, ReaderError, Serializer, Writer},
    time::TimestampMillis,
};

use crate::core::error::LoyaltyError;

/// Index key ordering the entries of an account by creation time
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct AccountEntryKey {
    pub account: AccountId,
    pub created_at: TimestampMillis,
    pub entry: EntryId,
}

impl Serializer for AccountEntryKey {
    fn write(&self, writer: &mut Writer) {
        self.account.write(writer);
        writer.write_u64(self.created_at);
        self.entry.write(writer);
    }

    fn read(reader: &mut Reader) -> Result<Self, ReaderError> {
        Ok(Self {
            account: AccountId::read(reader)?,
            created_at: reader.read_u64()?,
            entry: EntryId::read(reader)?,
        })
    }

    fn size(&self) -> usize {
        24
    }
}

/// Settlement queue key, oldest entries first
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PendingEntryKey {
    pub created_at: TimestampMillis,
    pub entry: EntryId,
}

impl Serializer for PendingEntryKey {
    fn write(&self, writer: &mut Writer) {
        writer.write_u64(self.created_at);
        self.entry.write(writer);
    }

    fn read(reader: &mut Reader) -> Result<Self, ReaderError> {
        Ok(Self {
            created_at: reader.read_u64()?,
            entry: EntryId::read(reader)?,
        })
    }

    fn size(&self) -> usize {
        16
    }
}

#[async_trait]
pub trait LedgerProvider {
    // Allocate the next entry id, persisted with the current snapshot
    async fn next_entry_id(&mut self) -> Result<EntryId, LoyaltyError>;

    async fn get_entry(&self, id: EntryId) -> Result<Option<LedgerEntry>, LoyaltyError>;

    async fn set_entry(&mut self, entry: &LedgerEntry) -> Result<(), LoyaltyError>;

    // Entry already applied for this key, if any
    async fn get_entry_id_by_key(
        &self,
        key: &IdempotencyKey,
    ) -> Result<Option<EntryId>, LoyaltyError>;

    async fn set_entry_key(&mut self, key: &IdempotencyKey, id: EntryId)
        -> Result<(), LoyaltyError>;

    // Zero balance for unknown accounts
    async fn get_balance(&self, account: AccountId) -> Result<Balance, LoyaltyError>;

    async fn set_balance(&mut self, account: AccountId, balance: &Balance)
        -> Result<(), LoyaltyError>;

    async fn index_account_entry(&mut self, entry: &LedgerEntry) -> Result<(), LoyaltyError>;

    // Entry ids of an account, newest first
    async fn list_account_entries(
        &self,
        account: AccountId,
        skip: usize,
        limit: usize,
    ) -> Result<Vec<EntryId>, LoyaltyError>;

    async fn add_pending_entry(&mut self, entry: &LedgerEntry) -> Result<(), LoyaltyError>;

    async fn remove_pending_entry(&mut self, entry: &LedgerEntry) -> Result<(), LoyaltyError>;

    // Pending entries created at or before `created_up_to`, strictly after `after`
    async fn list_pending_entries(
        &self,
        after: Option<&PendingEntryKey>,
        created_up_to: TimestampMillis,
        limit: usize,
    ) -> Result<Vec<(PendingEntryKey, AccountId)>, LoyaltyError>;

    async fn add_redemption(&mut self, entry: &LedgerEntry) -> Result<(), LoyaltyError>;

    // Points redeemed by the account in entries created after `since`
    async fn get_redeemed_since(
        &self,
        account: AccountId,
        since: TimestampMillis,
    ) -> Result<u64, LoyaltyError>;

    async fn get_reservation(&self, entry: EntryId) -> Result<Option<Reservation>, LoyaltyError>;

    async fn set_reservation(&mut self, reservation: &Reservation) -> Result<(), LoyaltyError>;

    // Completed bookings of the account, earning or not
    async fn get_completed_bookings(&self, account: AccountId) -> Result<u64, LoyaltyError>;

    async fn set_completed_bookings(
        &mut self,
        account: AccountId,
        count: u64,
    ) -> Result<(), LoyaltyError>;

    // Completed booking that earned nothing and was already counted
    async fn has_zero_point_booking(&self, booking: BookingId) -> Result<bool, LoyaltyError>;

    async fn add_zero_point_booking(
        &mut self,
        booking: BookingId,
        account: AccountId,
    ) -> Result<(), LoyaltyError>;
}
