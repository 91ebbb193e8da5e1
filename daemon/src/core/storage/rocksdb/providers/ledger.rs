use async_trait::async_trait;
use log::trace;
use loyalty_common::{
    ids::{AccountId, BookingId, EntryId},
    ledger::{Balance, IdempotencyKey, LedgerEntry},
    redemption::Reservation,
    serializer::Serializer,
    time::TimestampMillis,
};

use crate::core::{
    error::LoyaltyError,
    storage::{
        rocksdb::{Column, RocksStorage},
        snapshot::Direction,
        AccountEntryKey, LedgerProvider, PendingEntryKey,
    },
};

const NEXT_ENTRY_ID: &[u8; 13] = b"NEXT_ENTRY_ID";

fn account_entry_key(entry: &LedgerEntry) -> AccountEntryKey {
    AccountEntryKey {
        account: entry.account,
        created_at: entry.created_at,
        entry: entry.id,
    }
}

fn pending_entry_key(entry: &LedgerEntry) -> PendingEntryKey {
    PendingEntryKey {
        created_at: entry.created_at,
        entry: entry.id,
    }
}

#[async_trait]
impl LedgerProvider for RocksStorage {
    async fn next_entry_id(&mut self) -> Result<EntryId, LoyaltyError> {
        let id: u64 = self
            .load_optional_from_disk(Column::Common, NEXT_ENTRY_ID)?
            .unwrap_or(1);
        let next = id
            .checked_add(1)
            .ok_or_else(|| anyhow::anyhow!("Entry id counter overflow"))?;
        self.insert_into_disk(Column::Common, NEXT_ENTRY_ID, &next)?;

        if log::log_enabled!(log::Level::Trace) {
            trace!("allocated entry id {}", id);
        }
        Ok(EntryId::new(id))
    }

    async fn get_entry(&self, id: EntryId) -> Result<Option<LedgerEntry>, LoyaltyError> {
        if log::log_enabled!(log::Level::Trace) {
            trace!("get entry {}", id);
        }
        self.load_optional_from_disk(Column::LedgerEntries, &id.to_be_bytes())
    }

    async fn set_entry(&mut self, entry: &LedgerEntry) -> Result<(), LoyaltyError> {
        if log::log_enabled!(log::Level::Trace) {
            trace!("set entry {} with status {}", entry.id, entry.status);
        }
        self.insert_into_disk(Column::LedgerEntries, entry.id.to_be_bytes(), entry)
    }

    async fn get_entry_id_by_key(
        &self,
        key: &IdempotencyKey,
    ) -> Result<Option<EntryId>, LoyaltyError> {
        self.load_optional_from_disk(Column::IdempotencyKeys, key)
    }

    async fn set_entry_key(
        &mut self,
        key: &IdempotencyKey,
        id: EntryId,
    ) -> Result<(), LoyaltyError> {
        self.insert_into_disk(Column::IdempotencyKeys, key, &id)
    }

    async fn get_balance(&self, account: AccountId) -> Result<Balance, LoyaltyError> {
        Ok(self
            .load_optional_from_disk(Column::Balances, &account.to_be_bytes())?
            .unwrap_or_default())
    }

    async fn set_balance(
        &mut self,
        account: AccountId,
        balance: &Balance,
    ) -> Result<(), LoyaltyError> {
        if log::log_enabled!(log::Level::Trace) {
            trace!(
                "set balance of {} to {} confirmed, {} pending",
                account,
                balance.confirmed,
                balance.pending
            );
        }
        self.insert_into_disk(Column::Balances, account.to_be_bytes(), balance)
    }

    async fn index_account_entry(&mut self, entry: &LedgerEntry) -> Result<(), LoyaltyError> {
        self.insert_into_disk(
            Column::EntriesByAccount,
            account_entry_key(entry).to_bytes(),
            &(),
        )
    }

    async fn list_account_entries(
        &self,
        account: AccountId,
        skip: usize,
        limit: usize,
    ) -> Result<Vec<EntryId>, LoyaltyError> {
        let start = AccountEntryKey {
            account,
            created_at: u64::MAX,
            entry: EntryId::new(u64::MAX),
        };
        let keys = self.scan::<AccountEntryKey, ()>(
            Column::EntriesByAccount,
            &account.to_be_bytes(),
            Some(&start.to_bytes()),
            Direction::Reverse,
            skip.saturating_add(limit),
        )?;

        Ok(keys
            .into_iter()
            .skip(skip)
            .map(|(key, _)| key.entry)
            .collect())
    }

    async fn add_pending_entry(&mut self, entry: &LedgerEntry) -> Result<(), LoyaltyError> {
        self.insert_into_disk(
            Column::PendingEntries,
            pending_entry_key(entry).to_bytes(),
            &entry.account,
        )
    }

    async fn remove_pending_entry(&mut self, entry: &LedgerEntry) -> Result<(), LoyaltyError> {
        self.remove_from_disk(Column::PendingEntries, pending_entry_key(entry).to_bytes())
    }

    async fn list_pending_entries(
        &self,
        after: Option<&PendingEntryKey>,
        created_up_to: TimestampMillis,
        limit: usize,
    ) -> Result<Vec<(PendingEntryKey, AccountId)>, LoyaltyError> {
        // keys are fixed size, appending a zero byte gives the next possible key
        let from = after.map(|key| {
            let mut bytes = key.to_bytes();
            bytes.push(0);
            bytes
        });

        let pending = self.scan::<PendingEntryKey, AccountId>(
            Column::PendingEntries,
            &[],
            from.as_deref(),
            Direction::Forward,
            limit,
        )?;

        Ok(pending
            .into_iter()
            .take_while(|(key, _)| key.created_at <= created_up_to)
            .collect())
    }

    async fn add_redemption(&mut self, entry: &LedgerEntry) -> Result<(), LoyaltyError> {
        self.insert_into_disk(
            Column::RedemptionsByAccount,
            account_entry_key(entry).to_bytes(),
            &entry.points(),
        )
    }

    async fn get_redeemed_since(
        &self,
        account: AccountId,
        since: TimestampMillis,
    ) -> Result<u64, LoyaltyError> {
        // strictly after `since`
        let start = AccountEntryKey {
            account,
            created_at: since.saturating_add(1),
            entry: EntryId::new(0),
        };
        let redemptions = self.scan::<AccountEntryKey, u64>(
            Column::RedemptionsByAccount,
            &account.to_be_bytes(),
            Some(&start.to_bytes()),
            Direction::Forward,
            usize::MAX,
        )?;

        Ok(redemptions
            .into_iter()
            .fold(0u64, |total, (_, points)| total.saturating_add(points)))
    }

    async fn get_reservation(&self, entry: EntryId) -> Result<Option<Reservation>, LoyaltyError> {
        self.load_optional_from_disk(Column::Reservations, &entry.to_be_bytes())
    }

    async fn set_reservation(&mut self, reservation: &Reservation) -> Result<(), LoyaltyError> {
        self.insert_into_disk(
            Column::Reservations,
            reservation.entry_id.to_be_bytes(),
            reservation,
        )
    }

    async fn get_completed_bookings(&self, account: AccountId) -> Result<u64, LoyaltyError> {
        Ok(self
            .load_optional_from_disk(Column::CompletedBookings, &account.to_be_bytes())?
            .unwrap_or(0))
    }

    async fn set_completed_bookings(
        &mut self,
        account: AccountId,
        count: u64,
    ) -> Result<(), LoyaltyError> {
        self.insert_into_disk(Column::CompletedBookings, account.to_be_bytes(), &count)
    }

    async fn has_zero_point_booking(&self, booking: BookingId) -> Result<bool, LoyaltyError> {
        self.contains_data(Column::ZeroPointBookings, &booking.to_be_bytes())
    }

    async fn add_zero_point_booking(
        &mut self,
        booking: BookingId,
        account: AccountId,
    ) -> Result<(), LoyaltyError> {
        if log::log_enabled!(log::Level::Trace) {
            trace!("count zero point booking {} for {}", booking, account);
        }
        self.insert_into_disk(Column::ZeroPointBookings, booking.to_be_bytes(), &account)
    }
}
