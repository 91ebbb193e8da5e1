// Earning engine: turns upstream events into pending ledger entries

use log::{debug, info};
use loyalty_common::{
    config::LoyaltyPolicy,
    earning::{plan_booking_completed, plan_referral_bonus, plan_review_verified, EarnPlan},
    event::{BookingCompleted, ReviewVerified},
    ledger::{LedgerEntry, ReasonCode},
    time::TimestampMillis,
};

use super::{
    error::LoyaltyError,
    ledger::{append_entry, AppendOutcome, AppendRequest},
    service::LoyaltyService,
    storage::{finish_snapshot, Storage},
};

impl<S: Storage> LoyaltyService<S> {
    /// Award points for a completed booking.
    ///
    /// Returns `None` when the booking is too small to earn anything. Such a
    /// booking still counts as completed, so it is the referee's first booking
    /// for referral purposes.
    pub async fn record_booking_completed(
        &self,
        event: &BookingCompleted,
        now: TimestampMillis,
    ) -> Result<Option<AppendOutcome>, LoyaltyError> {
        let Some(plan) = plan_booking_completed(&self.policy, event) else {
            self.count_zero_point_booking(event).await?;
            return Ok(None);
        };

        self.apply_plan(Some(plan), now).await
    }

    async fn count_zero_point_booking(&self, event: &BookingCompleted) -> Result<(), LoyaltyError> {
        let mut storage = self.storage.write().await;
        if storage.has_zero_point_booking(event.booking).await? {
            debug!("booking {} already counted", event.booking);
            return Ok(());
        }

        storage.start_snapshot().await?;
        let res = count_completed_booking(&mut *storage, event).await;
        finish_snapshot(&mut *storage, res).await?;
        debug!(
            "booking {} of {} earns nothing, counted as completed",
            event.booking, event.account
        );
        Ok(())
    }

    pub async fn record_review_verified(
        &self,
        event: &ReviewVerified,
        now: TimestampMillis,
    ) -> Result<Option<AppendOutcome>, LoyaltyError> {
        let plan = plan_review_verified(&self.policy, event);
        self.apply_plan(plan, now).await
    }

    async fn apply_plan(
        &self,
        plan: Option<EarnPlan>,
        now: TimestampMillis,
    ) -> Result<Option<AppendOutcome>, LoyaltyError> {
        let Some(plan) = plan else {
            return Ok(None);
        };

        let outcome = self.append(AppendRequest::earn(plan)?, now).await?;
        if let AppendOutcome::Appended(entry) = &outcome {
            info!(
                "{} points pending for {} ({})",
                entry.points(),
                entry.account,
                entry.reason
            );
        }

        Ok(Some(outcome))
    }
}

// Must run inside a snapshot
async fn count_completed_booking<S: Storage>(
    storage: &mut S,
    event: &BookingCompleted,
) -> Result<(), LoyaltyError> {
    let count = storage.get_completed_bookings(event.account).await?;
    storage.set_completed_bookings(event.account, count + 1).await?;
    storage.add_zero_point_booking(event.booking, event.account).await
}

// Called when a booking earn entry is confirmed. The referee's first confirmed
// booking completes the referral and appends the referrer's pending bonus.
// Must run inside the settlement snapshot.
pub async fn award_referral_bonus<S: Storage>(
    storage: &mut S,
    policy: &LoyaltyPolicy,
    confirmed: &LedgerEntry,
    now: TimestampMillis,
) -> Result<Option<LedgerEntry>, LoyaltyError> {
    if confirmed.reason != ReasonCode::BookingCompleted {
        return Ok(None);
    }

    let Some(booking) = confirmed.refs.booking else {
        return Ok(None);
    };

    let referee = confirmed.account;
    let count = storage.get_completed_bookings(referee).await?;
    storage.set_completed_bookings(referee, count + 1).await?;
    if count > 0 {
        return Ok(None);
    }

    let Some(mut record) = storage.get_referral(referee).await? else {
        return Ok(None);
    };

    if record.is_completed() {
        debug!("referral of {} already completed", referee);
        return Ok(None);
    }

    let Some(plan) = plan_referral_bonus(policy, record.referrer, referee, booking) else {
        return Ok(None);
    };

    let outcome = append_entry(storage, AppendRequest::earn(plan)?, now).await?;
    record.complete(booking, now)?;
    storage.set_referral(&record).await?;

    info!(
        "Referral of {} by {} completed by booking {}",
        referee, record.referrer, booking
    );

    Ok(match outcome {
        AppendOutcome::Appended(entry) => Some(entry),
        AppendOutcome::Duplicate(_) => None,
    })
}
