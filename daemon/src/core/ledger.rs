// Ledger store operations
//
// Every mutation runs inside a storage snapshot so the entry, its indexes and
// the balance are committed together or not at all. The idempotency key is
// checked in that same snapshot while the writer lock is held.

use log::{debug, info, trace};
use loyalty_common::{
    earning::EarnPlan,
    error::{BalanceError, EntryError},
    ids::{AccountId, EntryId},
    ledger::{Balance, EntryStatus, IdempotencyKey, LedgerEntry, ReasonCode, SourceRefs},
    notification::Notification,
    redemption::RedemptionRejection,
    time::TimestampMillis,
};

use super::{
    error::LoyaltyError,
    service::LoyaltyService,
    storage::{finish_snapshot, Storage},
};

/// A point movement to record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppendRequest {
    pub account: AccountId,
    pub delta: i64,
    pub reason: ReasonCode,
    pub key: IdempotencyKey,
    pub refs: SourceRefs,
    pub note: Option<String>,
}

impl AppendRequest {
    pub fn earn(plan: EarnPlan) -> Result<Self, LoyaltyError> {
        Ok(Self {
            account: plan.account,
            delta: signed(plan.points)?,
            reason: plan.reason,
            key: plan.key,
            refs: plan.refs,
            note: None,
        })
    }

    pub fn redemption(
        account: AccountId,
        points: u64,
        request_id: &str,
    ) -> Result<Self, LoyaltyError> {
        Ok(Self {
            account,
            delta: -signed(points)?,
            reason: ReasonCode::Redemption,
            key: IdempotencyKey::redemption(request_id),
            refs: SourceRefs::default(),
            note: None,
        })
    }

    pub fn adjustment(account: AccountId, delta: i64, reference: &str, note: String) -> Self {
        Self {
            account,
            delta,
            reason: ReasonCode::ManualAdjustment,
            key: IdempotencyKey::manual_adjustment(reference),
            refs: SourceRefs::default(),
            note: Some(note),
        }
    }
}

fn signed(points: u64) -> Result<i64, LoyaltyError> {
    i64::try_from(points).map_err(|_| LoyaltyError::Balance(BalanceError::Overflow))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppendOutcome {
    Appended(LedgerEntry),
    /// The key was already applied, this is the entry it produced
    Duplicate(EntryId),
}

impl AppendOutcome {
    pub fn id(&self) -> EntryId {
        match self {
            Self::Appended(entry) => entry.id,
            Self::Duplicate(id) => *id,
        }
    }

    pub fn is_duplicate(&self) -> bool {
        matches!(self, Self::Duplicate(_))
    }

    pub fn entry(&self) -> Option<&LedgerEntry> {
        match self {
            Self::Appended(entry) => Some(entry),
            Self::Duplicate(_) => None,
        }
    }
}

// Append an entry and adjust the balance. Must run inside a snapshot.
pub async fn append_entry<S: Storage>(
    storage: &mut S,
    request: AppendRequest,
    now: TimestampMillis,
) -> Result<AppendOutcome, LoyaltyError> {
    if request.delta == 0 {
        return Err(EntryError::ZeroDelta.into());
    }

    if let Some(id) = storage.get_entry_id_by_key(&request.key).await? {
        debug!("{} already applied as entry {}", request.key, id);
        return Ok(AppendOutcome::Duplicate(id));
    }

    let status = request.reason.initial_status();
    let points = request.delta.unsigned_abs();
    let mut balance = storage.get_balance(request.account).await?;
    match status {
        EntryStatus::Pending if request.delta > 0 => balance.add_pending(points)?,
        EntryStatus::Pending => return Err(EntryError::NegativeEarn(request.delta).into()),
        _ => apply_confirmed(&mut balance, request.delta)?,
    }

    let id = storage.next_entry_id().await?;
    let entry = LedgerEntry {
        id,
        account: request.account,
        delta: request.delta,
        reason: request.reason,
        status,
        refs: request.refs,
        key: request.key,
        note: request.note,
        created_at: now,
        settled_at: None,
    };

    storage.set_entry(&entry).await?;
    storage.set_entry_key(&entry.key, id).await?;
    storage.index_account_entry(&entry).await?;
    if entry.is_pending() {
        storage.add_pending_entry(&entry).await?;
    }
    if entry.reason == ReasonCode::Redemption {
        storage.add_redemption(&entry).await?;
    }
    storage.set_balance(entry.account, &balance).await?;

    if log::log_enabled!(log::Level::Trace) {
        trace!(
            "appended entry {} ({}) of {} for {}",
            entry.id,
            entry.reason,
            entry.delta,
            entry.account
        );
    }

    Ok(AppendOutcome::Appended(entry))
}

// Debits that would overdraw are reported as a rejection
fn apply_confirmed(balance: &mut Balance, delta: i64) -> Result<(), LoyaltyError> {
    balance.apply_confirmed(delta).map_err(|e| match e {
        BalanceError::Insufficient { need, have } => {
            LoyaltyError::Rejected(RedemptionRejection::insufficient_balance(need, have))
        }
        e => e.into(),
    })
}

// Move a pending entry to its terminal status. Must run inside a snapshot.
pub async fn resolve_entry<S: Storage>(
    storage: &mut S,
    entry: &mut LedgerEntry,
    to: EntryStatus,
    now: TimestampMillis,
) -> Result<(), LoyaltyError> {
    entry.transition(to, now)?;

    let mut balance = storage.get_balance(entry.account).await?;
    match to {
        EntryStatus::Confirmed => balance.confirm_pending(entry.points())?,
        _ => balance.release_pending(entry.points())?,
    }

    storage.remove_pending_entry(entry).await?;
    storage.set_entry(entry).await?;
    storage.set_balance(entry.account, &balance).await?;
    Ok(())
}

// Points redeemed inside the rolling window ending at `now`
pub async fn redeemed_in_window<S: Storage>(
    storage: &S,
    account: AccountId,
    window: TimestampMillis,
    now: TimestampMillis,
) -> Result<u64, LoyaltyError> {
    storage
        .get_redeemed_since(account, now.saturating_sub(window))
        .await
}

impl<S: Storage> LoyaltyService<S> {
    /// Append a ledger entry.
    ///
    /// An already applied idempotency key is a success returning the
    /// existing entry id.
    pub async fn append(
        &self,
        request: AppendRequest,
        now: TimestampMillis,
    ) -> Result<AppendOutcome, LoyaltyError> {
        let outcome = {
            let mut storage = self.storage.write().await;
            storage.start_snapshot().await?;
            let res = append_entry(&mut *storage, request, now).await;
            finish_snapshot(&mut *storage, res).await?
        };

        if let AppendOutcome::Appended(entry) = &outcome {
            if entry.is_pending() {
                self.notify(vec![Notification::pending(entry)]).await;
            }
        }

        Ok(outcome)
    }

    /// Operator correction, applied directly to the confirmed balance
    pub async fn adjust_balance(
        &self,
        account: AccountId,
        delta: i64,
        reference: &str,
        note: &str,
        now: TimestampMillis,
    ) -> Result<AppendOutcome, LoyaltyError> {
        let note = note.trim();
        if note.is_empty() {
            return Err(LoyaltyError::MissingNote);
        }

        if !self.storage.read().await.has_account(account).await? {
            return Err(LoyaltyError::AccountNotFound(account));
        }

        let outcome = self
            .append(
                AppendRequest::adjustment(account, delta, reference, note.to_owned()),
                now,
            )
            .await?;

        if !outcome.is_duplicate() {
            info!(
                "Manual adjustment of {} points on {} ({}): {}",
                delta, account, reference, note
            );
        }

        Ok(outcome)
    }

    pub async fn get_balance(&self, account: AccountId) -> Result<Balance, LoyaltyError> {
        self.storage.read().await.get_balance(account).await
    }

    // Spendable points, pending ones never count
    pub async fn get_redeemable(&self, account: AccountId) -> Result<u64, LoyaltyError> {
        Ok(self.get_balance(account).await?.redeemable())
    }

    pub async fn get_entry(&self, id: EntryId) -> Result<Option<LedgerEntry>, LoyaltyError> {
        self.storage.read().await.get_entry(id).await
    }

    pub async fn get_entry_by_key(
        &self,
        key: &IdempotencyKey,
    ) -> Result<Option<LedgerEntry>, LoyaltyError> {
        let storage = self.storage.read().await;
        match storage.get_entry_id_by_key(key).await? {
            Some(id) => storage.get_entry(id).await,
            None => Ok(None),
        }
    }

    /// Entries of an account, newest first
    pub async fn list_entries(
        &self,
        account: AccountId,
        skip: usize,
        limit: usize,
    ) -> Result<Vec<LedgerEntry>, LoyaltyError> {
        let storage = self.storage.read().await;
        let ids = storage.list_account_entries(account, skip, limit).await?;
        let mut entries = Vec::with_capacity(ids.len());
        for id in ids {
            let entry = storage
                .get_entry(id)
                .await?
                .ok_or(LoyaltyError::EntryNotFound(id))?;
            entries.push(entry);
        }

        Ok(entries)
    }

    /// Pending entries of an account, newest first
    pub async fn get_pending(&self, account: AccountId) -> Result<Vec<LedgerEntry>, LoyaltyError> {
        let entries = self.list_entries(account, 0, usize::MAX).await?;
        Ok(entries.into_iter().filter(LedgerEntry::is_pending).collect())
    }
}
