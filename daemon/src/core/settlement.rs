// Settlement engine
//
// Periodic sweep over pending entries whose hold period has elapsed. Each
// entry is resolved in its own snapshot: one failing lookup or commit never
// blocks the rest of the batch, and a crash mid-run leaves every entry either
// fully settled or still pending.

use std::{
    collections::{HashMap, HashSet},
    path::Path,
};

use async_trait::async_trait;
use futures::future::join_all;
use log::{debug, info, trace, warn};
use loyalty_common::{
    booking::{BookingSnapshot, BookingStatus, SettlementDecision},
    config::LoyaltyPolicy,
    ids::{BookingId, EntryId},
    ledger::{EntryStatus, LedgerEntry},
    notification::Notification,
    time::TimestampMillis,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::RwLock;

use super::{
    earning::award_referral_bonus,
    error::LoyaltyError,
    ledger::resolve_entry,
    service::LoyaltyService,
    storage::{finish_snapshot, PendingEntryKey, Storage},
};

#[derive(Debug, Error)]
pub enum BookingLookupError {
    #[error("Booking service unavailable: {0}")]
    Unavailable(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Read access to the booking subsystem
#[async_trait]
pub trait BookingSource: Send + Sync {
    /// Current state of a booking, `None` if the booking is unknown
    async fn get_booking(
        &self,
        id: BookingId,
    ) -> Result<Option<BookingSnapshot>, BookingLookupError>;
}

/// In-memory booking source, can be told to fail lookups for given bookings
#[derive(Default)]
pub struct MemoryBookingSource {
    bookings: RwLock<HashMap<BookingId, BookingSnapshot>>,
    failing: RwLock<HashSet<BookingId>>,
}

impl MemoryBookingSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn upsert(&self, booking: BookingSnapshot) {
        self.bookings.write().await.insert(booking.id, booking);
    }

    pub async fn set_status(&self, id: BookingId, status: BookingStatus) -> bool {
        match self.bookings.write().await.get_mut(&id) {
            Some(booking) => {
                booking.status = status;
                true
            }
            None => false,
        }
    }

    // Lookups for this booking fail until `recover` is called
    pub async fn fail(&self, id: BookingId) {
        self.failing.write().await.insert(id);
    }

    pub async fn recover(&self, id: BookingId) {
        self.failing.write().await.remove(&id);
    }
}

#[async_trait]
impl BookingSource for MemoryBookingSource {
    async fn get_booking(
        &self,
        id: BookingId,
    ) -> Result<Option<BookingSnapshot>, BookingLookupError> {
        if self.failing.read().await.contains(&id) {
            return Err(BookingLookupError::Unavailable(format!(
                "lookup of booking {} timed out",
                id
            )));
        }

        Ok(self.bookings.read().await.get(&id).cloned())
    }
}

/// Booking states exported by the booking subsystem as a JSON array
pub struct JsonBookingSource {
    bookings: HashMap<BookingId, BookingSnapshot>,
}

impl JsonBookingSource {
    pub fn from_slice(bytes: &[u8]) -> Result<Self, BookingLookupError> {
        let list: Vec<BookingSnapshot> = serde_json::from_slice(bytes)?;
        Ok(Self {
            bookings: list.into_iter().map(|b| (b.id, b)).collect(),
        })
    }

    pub async fn load<P: AsRef<Path>>(path: P) -> Result<Self, BookingLookupError> {
        let bytes = tokio::fs::read(path).await?;
        Self::from_slice(&bytes)
    }

    pub fn len(&self) -> usize {
        self.bookings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bookings.is_empty()
    }
}

#[async_trait]
impl BookingSource for JsonBookingSource {
    async fn get_booking(
        &self,
        id: BookingId,
    ) -> Result<Option<BookingSnapshot>, BookingLookupError> {
        Ok(self.bookings.get(&id).cloned())
    }
}

/// Counters of a settlement run
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementReport {
    pub examined: usize,
    pub confirmed: usize,
    pub reversed: usize,
    /// Booking not yet in a terminal state, or unknown
    pub still_pending: usize,
    /// Booking lookup failed, retried next run
    pub deferred: usize,
    pub referral_bonuses: usize,
}

struct Resolution {
    entry: LedgerEntry,
    bonus: Option<LedgerEntry>,
}

// Resolve one entry and its side effects. Must run inside a snapshot.
async fn apply_resolution<S: Storage>(
    storage: &mut S,
    policy: &LoyaltyPolicy,
    id: EntryId,
    to: EntryStatus,
    now: TimestampMillis,
) -> Result<Option<Resolution>, LoyaltyError> {
    let mut entry = storage
        .get_entry(id)
        .await?
        .ok_or(LoyaltyError::EntryNotFound(id))?;

    // Settled by a concurrent run since it was listed
    if !entry.is_pending() {
        return Ok(None);
    }

    resolve_entry(storage, &mut entry, to, now).await?;
    let bonus = if to == EntryStatus::Confirmed {
        award_referral_bonus(storage, policy, &entry, now).await?
    } else {
        None
    };

    Ok(Some(Resolution { entry, bonus }))
}

// What a batch entry turned into once its booking was looked up
enum Verdict {
    Resolve(EntryStatus),
    Wait,
    Unknown,
    Deferred,
    Stale,
}

impl<S: Storage> LoyaltyService<S> {
    /// Resolve every pending entry whose hold period has elapsed at `now`.
    ///
    /// Safe to run concurrently with itself and with new events. Booking
    /// lookup failures leave the entry pending and are counted as deferred.
    pub async fn run_settlement(
        &self,
        now: TimestampMillis,
    ) -> Result<SettlementReport, LoyaltyError> {
        let mut report = SettlementReport::default();
        let Some(cutoff) = now.checked_sub(self.policy.hold_period_millis) else {
            return Ok(report);
        };

        let batch_size = self.policy.settlement_batch;
        let mut cursor: Option<PendingEntryKey> = None;
        loop {
            let (keys, entries) = {
                let storage = self.storage.read().await;
                let keys = storage
                    .list_pending_entries(cursor.as_ref(), cutoff, batch_size)
                    .await?;

                let mut entries = Vec::with_capacity(keys.len());
                for (key, _) in &keys {
                    match storage.get_entry(key.entry).await? {
                        Some(entry) => entries.push(entry),
                        None => warn!("Pending index points to missing entry {}", key.entry),
                    }
                }
                (keys, entries)
            };

            report.examined += keys.len();

            // lookups of a batch run concurrently, outside of any lock
            let verdicts = join_all(entries.iter().map(|entry| self.verdict(entry))).await;
            for (entry, verdict) in entries.into_iter().zip(verdicts) {
                self.settle_entry(entry, verdict, now, &mut report).await?;
            }

            let last_batch = keys.len() < batch_size;
            cursor = keys.into_iter().last().map(|(key, _)| key);
            if last_batch {
                break;
            }
        }

        if report.examined > 0 {
            info!(
                "Settlement: {} examined, {} confirmed, {} reversed, {} waiting, {} deferred, {} referral bonuses",
                report.examined,
                report.confirmed,
                report.reversed,
                report.still_pending,
                report.deferred,
                report.referral_bonuses
            );
        }

        Ok(report)
    }

    async fn verdict(&self, entry: &LedgerEntry) -> Verdict {
        if !entry.is_pending() {
            return Verdict::Stale;
        }

        let Some(booking) = entry.refs.booking else {
            return Verdict::Resolve(EntryStatus::Confirmed);
        };

        match self.bookings.get_booking(booking).await {
            Ok(Some(snapshot)) => match snapshot.status.settlement_decision() {
                SettlementDecision::Confirm => Verdict::Resolve(EntryStatus::Confirmed),
                SettlementDecision::Reverse => Verdict::Resolve(EntryStatus::Reversed),
                SettlementDecision::Wait => Verdict::Wait,
            },
            Ok(None) => {
                warn!(
                    "Booking {} of entry {} is unknown, keeping it pending",
                    booking, entry.id
                );
                Verdict::Unknown
            }
            Err(e) => {
                warn!(
                    "Lookup of booking {} for entry {} failed: {}",
                    booking, entry.id, e
                );
                Verdict::Deferred
            }
        }
    }

    async fn settle_entry(
        &self,
        entry: LedgerEntry,
        verdict: Verdict,
        now: TimestampMillis,
        report: &mut SettlementReport,
    ) -> Result<(), LoyaltyError> {
        let to = match verdict {
            Verdict::Resolve(to) => to,
            Verdict::Wait => {
                if log::log_enabled!(log::Level::Trace) {
                    trace!("entry {} waits for its booking to settle", entry.id);
                }
                report.still_pending += 1;
                return Ok(());
            }
            Verdict::Unknown => {
                report.still_pending += 1;
                return Ok(());
            }
            Verdict::Deferred => {
                report.deferred += 1;
                return Ok(());
            }
            Verdict::Stale => {
                debug!("entry {} already settled, cleaning pending index", entry.id);
                let mut storage = self.storage.write().await;
                storage.remove_pending_entry(&entry).await?;
                return Ok(());
            }
        };

        let resolution = {
            let mut storage = self.storage.write().await;
            storage.start_snapshot().await?;
            let res = apply_resolution(&mut *storage, &self.policy, entry.id, to, now).await;
            finish_snapshot(&mut *storage, res).await?
        };

        let Some(Resolution { entry, bonus }) = resolution else {
            return Ok(());
        };

        let mut notifications = Vec::with_capacity(2);
        match entry.status {
            EntryStatus::Confirmed => {
                report.confirmed += 1;
                notifications.push(Notification::confirmed(&entry));
            }
            _ => {
                report.reversed += 1;
                notifications.push(Notification::reversed(&entry));
            }
        }

        if let Some(bonus) = bonus {
            report.referral_bonuses += 1;
            notifications.push(Notification::pending(&bonus));
        }

        self.notify(notifications).await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use loyalty_common::ids::AccountId;

    fn booking(id: u64, status: BookingStatus) -> BookingSnapshot {
        BookingSnapshot {
            id: BookingId::new(id),
            customer: AccountId::new(1),
            status,
            net_amount: 4_200,
            completed_at: None,
        }
    }

    #[tokio::test]
    async fn test_memory_source_failures() {
        let source = MemoryBookingSource::new();
        source.upsert(booking(1, BookingStatus::Completed)).await;

        assert!(source.get_booking(BookingId::new(1)).await.unwrap().is_some());
        assert!(source.get_booking(BookingId::new(2)).await.unwrap().is_none());

        source.fail(BookingId::new(1)).await;
        assert!(source.get_booking(BookingId::new(1)).await.is_err());

        source.recover(BookingId::new(1)).await;
        assert!(source.set_status(BookingId::new(1), BookingStatus::Refunded).await);
        let found = source.get_booking(BookingId::new(1)).await.unwrap().unwrap();
        assert_eq!(found.status, BookingStatus::Refunded);
    }

    #[tokio::test]
    async fn test_json_source() {
        let json = br#"[{"id":7,"customer":1,"status":"completed","net_amount":4200}]"#;
        let source = JsonBookingSource::from_slice(json).unwrap();
        assert_eq!(source.len(), 1);
        let found = source.get_booking(BookingId::new(7)).await.unwrap().unwrap();
        assert_eq!(found.status, BookingStatus::Completed);
    }
}
