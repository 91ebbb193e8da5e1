use std::sync::Arc;

use log::{debug, info};
use loyalty_common::{
    config::LoyaltyPolicy,
    event::LoyaltyEvent,
    ids::EntryId,
    notification::Notification,
    redemption::RedemptionOutcome,
    referral::ReferralRecord,
    time::TimestampMillis,
};
use serde::Serialize;
use tokio::sync::RwLock;

use super::{
    error::LoyaltyError,
    ledger::AppendOutcome,
    notify::{dispatch, Notifier},
    settlement::BookingSource,
    storage::Storage,
};

/// What handling an event produced
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "result", rename_all = "snake_case")]
pub enum EventOutcome {
    /// `None` when the event earns nothing
    Earned(Option<EarnResult>),
    Referral(Option<ReferralRecord>),
    Redemption(RedemptionOutcome),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EarnResult {
    pub entry: EntryId,
    pub duplicate: bool,
}

impl From<&AppendOutcome> for EarnResult {
    fn from(outcome: &AppendOutcome) -> Self {
        Self {
            entry: outcome.id(),
            duplicate: outcome.is_duplicate(),
        }
    }
}

/// Entry point of the loyalty core.
///
/// Writes are serialized by the storage lock and each one commits through a
/// single snapshot. Reads share the lock and never observe a partial write.
pub struct LoyaltyService<S: Storage> {
    pub(crate) storage: Arc<RwLock<S>>,
    pub(crate) policy: LoyaltyPolicy,
    pub(crate) bookings: Arc<dyn BookingSource>,
    notifier: Arc<dyn Notifier>,
}

impl<S: Storage> LoyaltyService<S> {
    pub fn new(
        storage: S,
        policy: LoyaltyPolicy,
        bookings: Arc<dyn BookingSource>,
        notifier: Arc<dyn Notifier>,
    ) -> Result<Self, LoyaltyError> {
        policy.validate().map_err(LoyaltyError::InvalidPolicy)?;
        info!(
            "Loyalty service ready, hold period {}ms, settlement batch {}",
            policy.hold_period_millis, policy.settlement_batch
        );

        Ok(Self {
            storage: Arc::new(RwLock::new(storage)),
            policy,
            bookings,
            notifier,
        })
    }

    pub fn policy(&self) -> &LoyaltyPolicy {
        &self.policy
    }

    pub fn storage(&self) -> &RwLock<S> {
        &self.storage
    }

    /// Dispatch an upstream event to the engine owning it
    pub async fn handle_event(
        &self,
        event: LoyaltyEvent,
        now: TimestampMillis,
    ) -> Result<EventOutcome, LoyaltyError> {
        debug!("handling {} event for {}", event.kind(), event.account());
        match event {
            LoyaltyEvent::BookingCompleted(event) => {
                let outcome = self.record_booking_completed(&event, now).await?;
                Ok(EventOutcome::Earned(outcome.as_ref().map(EarnResult::from)))
            }
            LoyaltyEvent::ReviewVerified(event) => {
                let outcome = self.record_review_verified(&event, now).await?;
                Ok(EventOutcome::Earned(outcome.as_ref().map(EarnResult::from)))
            }
            LoyaltyEvent::ReferralSignup(signup) => {
                let record = self.attach_referral(&signup, now).await?;
                Ok(EventOutcome::Referral(record))
            }
            LoyaltyEvent::RedemptionRequest(request) => {
                let outcome = self.validate_and_reserve(&request, now).await?;
                Ok(EventOutcome::Redemption(outcome))
            }
        }
    }

    pub(crate) async fn notify(&self, notifications: Vec<Notification>) {
        dispatch(self.notifier.as_ref(), notifications).await;
    }

    // Flush and close the storage
    pub async fn stop(&self) -> Result<(), LoyaltyError> {
        info!("Stopping loyalty service");
        let mut storage = self.storage.write().await;
        storage.flush().await?;
        storage.stop().await
    }
}
