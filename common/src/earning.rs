// Deterministic point deltas for earn-type events
//
// These functions only compute what should be appended. The daemon submits
// the resulting plan to the ledger store as a pending entry.

use crate::{
    config::LoyaltyPolicy,
    event::{BookingCompleted, ReviewVerified},
    ids::{AccountId, BookingId},
    ledger::{IdempotencyKey, ReasonCode, SourceRefs},
};

/// A pending entry to append
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EarnPlan {
    pub account: AccountId,
    pub points: u64,
    pub reason: ReasonCode,
    pub key: IdempotencyKey,
    pub refs: SourceRefs,
}

// floor(net amount in base units) * points per unit
pub fn booking_points(policy: &LoyaltyPolicy, net_amount_minor: u64) -> u64 {
    (net_amount_minor / policy.minor_units_per_base_unit).saturating_mul(policy.points_per_base_unit)
}

// Bookings worth less than one base unit earn nothing and produce no entry
pub fn plan_booking_completed(policy: &LoyaltyPolicy, event: &BookingCompleted) -> Option<EarnPlan> {
    let points = booking_points(policy, event.net_amount);
    if points == 0 {
        return None;
    }

    Some(EarnPlan {
        account: event.account,
        points,
        reason: ReasonCode::BookingCompleted,
        key: IdempotencyKey::booking_earn(event.booking),
        refs: SourceRefs::booking(event.booking),
    })
}

pub fn plan_review_verified(policy: &LoyaltyPolicy, event: &ReviewVerified) -> Option<EarnPlan> {
    if policy.review_points == 0 {
        return None;
    }

    let mut refs = SourceRefs::default().with_review(event.review);
    refs.booking = event.booking;
    Some(EarnPlan {
        account: event.reviewer,
        points: policy.review_points,
        reason: ReasonCode::ReviewVerified,
        key: IdempotencyKey::review_earn(event.review),
        refs,
    })
}

// Bonus for the referrer, tied to the referee's first settled booking
pub fn plan_referral_bonus(
    policy: &LoyaltyPolicy,
    referrer: AccountId,
    referee: AccountId,
    booking: BookingId,
) -> Option<EarnPlan> {
    if policy.referral_bonus_points == 0 || referrer == referee {
        return None;
    }

    Some(EarnPlan {
        account: referrer,
        points: policy.referral_bonus_points,
        reason: ReasonCode::ReferralCompleted,
        key: IdempotencyKey::referral_bonus(referrer, referee),
        refs: SourceRefs::booking(booking).with_referred_account(referee),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::ReviewId;

    #[test]
    fn test_booking_points_floor() {
        let policy = LoyaltyPolicy::default();
        // £42.00
        assert_eq!(booking_points(&policy, 4_200), 42);
        // £42.99 still earns 42
        assert_eq!(booking_points(&policy, 4_299), 42);
        assert_eq!(booking_points(&policy, 99), 0);
    }

    #[test]
    fn test_booking_plan() {
        let policy = LoyaltyPolicy::default();
        let event = BookingCompleted {
            booking: BookingId::new(500),
            account: AccountId::new(1),
            net_amount: 4_200,
            completed_at: 0,
        };
        let plan = plan_booking_completed(&policy, &event).unwrap();
        assert_eq!(plan.points, 42);
        assert_eq!(plan.reason, ReasonCode::BookingCompleted);
        assert_eq!(plan.key.as_str(), "booking:500:earn");
        assert_eq!(plan.refs.booking, Some(BookingId::new(500)));
    }

    #[test]
    fn test_tiny_booking_has_no_plan() {
        let policy = LoyaltyPolicy::default();
        let event = BookingCompleted {
            booking: BookingId::new(1),
            account: AccountId::new(1),
            net_amount: 50,
            completed_at: 0,
        };
        assert!(plan_booking_completed(&policy, &event).is_none());
    }

    #[test]
    fn test_review_plan() {
        let policy = LoyaltyPolicy::default();
        let event = ReviewVerified {
            review: ReviewId::new(9),
            reviewer: AccountId::new(2),
            booking: Some(BookingId::new(77)),
        };
        let plan = plan_review_verified(&policy, &event).unwrap();
        assert_eq!(plan.points, 25);
        assert_eq!(plan.refs.review, Some(ReviewId::new(9)));
        assert_eq!(plan.refs.booking, Some(BookingId::new(77)));
    }

    #[test]
    fn test_referral_bonus_goes_to_referrer() {
        let policy = LoyaltyPolicy::default();
        let plan = plan_referral_bonus(&policy, AccountId::new(1), AccountId::new(2), BookingId::new(3)).unwrap();
        assert_eq!(plan.account, AccountId::new(1));
        assert_eq!(plan.points, 100);
        assert_eq!(plan.refs.referred_account, Some(AccountId::new(2)));
        assert!(plan_referral_bonus(&policy, AccountId::new(1), AccountId::new(1), BookingId::new(3)).is_none());
    }
}
