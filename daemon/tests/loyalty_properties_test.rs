//! Invariants of the loyalty ledger
//!
//! A. Idempotency of every write path
//! B. No negative balance, pending points are never spendable
//! C. Settlement determinism and transient lookup failures
//! D. Redemption preconditions and the concurrent spend race
//! E. Referral attribution guard and monitoring

#![allow(clippy::disallowed_methods)]

mod common;

use std::sync::Arc;

use common::*;
use loyalty_common::{
    account::Account,
    booking::BookingStatus,
    config::LoyaltyPolicy,
    event::{LoyaltyEvent, ReviewVerified},
    ids::{AccountId, BookingId, ReviewId},
    ledger::{EntryStatus, ReasonCode},
    redemption::{RedemptionErrorKind, RedemptionOutcome},
    referral::{ReferralCodeStatus, SignupEvent},
};
use loyalty_daemon::core::{error::LoyaltyError, service::EventOutcome};

fn signup(id: u64, email: &str, code: Option<&str>) -> SignupEvent {
    SignupEvent {
        account: Account::new(AccountId::new(id), email, T0),
        referral_code: code.map(str::to_owned),
        click_through_code: None,
        device_fingerprint: None,
        payment_method_hash: None,
        ip: None,
        signed_up_at: T0,
    }
}

async fn active_code(ctx: &TestContext, owner: u64) -> String {
    ctx.service
        .issue_referral_code(AccountId::new(owner), T0)
        .await
        .unwrap()
        .code
}

// ============================================================================
// A. Idempotency
// ============================================================================

#[tokio::test]
async fn test_review_award_is_idempotent() {
    let ctx = TestContext::new();
    ctx.register(1, "alice@example.com").await;

    let event = ReviewVerified {
        review: ReviewId::new(9),
        reviewer: AccountId::new(1),
        booking: None,
    };
    let first = ctx.service.record_review_verified(&event, T0).await.unwrap().unwrap();
    let second = ctx.service.record_review_verified(&event, T0 + 1).await.unwrap().unwrap();
    assert_eq!(first.id(), second.id());
    assert!(second.is_duplicate());

    let balance = ctx.service.get_balance(AccountId::new(1)).await.unwrap();
    assert_eq!(balance.pending, 25);

    // reviews without a booking confirm once the hold elapsed
    let report = ctx.service.run_settlement(T0 + DAY).await.unwrap();
    assert_eq!(report.confirmed, 1);
    assert_eq!(ctx.service.get_redeemable(AccountId::new(1)).await.unwrap(), 25);
}

#[tokio::test]
async fn test_redemption_retry_returns_original_reservation() {
    let ctx = TestContext::new();
    ctx.register_verified(1, "alice@example.com", "07700900001").await;
    ctx.fund(1, 2_000).await;

    let request = redemption("order-77", 1, 600, 5_000);
    let first = ctx.service.validate_and_reserve(&request, T0).await.unwrap();
    let retry = ctx.service.validate_and_reserve(&request, T0 + HOUR).await.unwrap();
    assert!(first.is_reserved());
    assert_eq!(first, retry);

    let balance = ctx.service.get_balance(AccountId::new(1)).await.unwrap();
    assert_eq!(balance.confirmed, 1_400);
}

#[tokio::test]
async fn test_small_booking_earns_nothing() {
    let ctx = TestContext::new();
    ctx.register(1, "alice@example.com").await;

    let outcome = ctx
        .service
        .record_booking_completed(&booking_completed(1, 1, 99), T0)
        .await
        .unwrap();
    assert!(outcome.is_none());
    assert!(ctx.service.list_entries(AccountId::new(1), 0, 10).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_handle_event_dispatch() {
    let ctx = TestContext::new();
    ctx.register(1, "alice@example.com").await;

    let event: LoyaltyEvent = serde_json::from_str(
        r#"{"type":"booking_completed","booking":500,"account":1,"net_amount":4200,"completed_at":0}"#,
    )
    .unwrap();
    let outcome = ctx.service.handle_event(event.clone(), T0).await.unwrap();
    let EventOutcome::Earned(Some(result)) = outcome else {
        panic!("unexpected outcome {:?}", outcome);
    };
    assert!(!result.duplicate);

    let again = ctx.service.handle_event(event, T0).await.unwrap();
    assert!(matches!(again, EventOutcome::Earned(Some(r)) if r.duplicate && r.entry == result.entry));
}

// ============================================================================
// B. Balance safety
// ============================================================================

#[tokio::test]
async fn test_negative_adjustment_cannot_overdraw() {
    let ctx = TestContext::new();
    ctx.register(1, "alice@example.com").await;
    ctx.fund(1, 100).await;

    let err = ctx
        .service
        .adjust_balance(AccountId::new(1), -101, "chargeback-1", "fraudulent booking", T0)
        .await
        .unwrap_err();
    let rejection = err.rejection().unwrap();
    assert_eq!(rejection.kind, RedemptionErrorKind::InsufficientBalance);
    assert_eq!(rejection.available, Some(100));

    // nothing was written
    assert_eq!(ctx.service.list_entries(AccountId::new(1), 0, 10).await.unwrap().len(), 1);
    assert_eq!(ctx.service.get_redeemable(AccountId::new(1)).await.unwrap(), 100);
}

#[tokio::test]
async fn test_adjustment_requires_note() {
    let ctx = TestContext::new();
    ctx.register(1, "alice@example.com").await;

    let err = ctx
        .service
        .adjust_balance(AccountId::new(1), 50, "goodwill-1", "  ", T0)
        .await
        .unwrap_err();
    assert!(matches!(err, LoyaltyError::MissingNote));

    let err = ctx
        .service
        .adjust_balance(AccountId::new(99), 50, "goodwill-2", "gesture", T0)
        .await
        .unwrap_err();
    assert!(matches!(err, LoyaltyError::AccountNotFound(_)));
}

#[tokio::test]
async fn test_pending_points_are_not_spendable() {
    let ctx = TestContext::new();
    ctx.register_verified(1, "alice@example.com", "07700900001").await;
    ctx.service
        .record_booking_completed(&booking_completed(1, 1, 100_000), T0)
        .await
        .unwrap();

    let outcome = ctx
        .service
        .validate_and_reserve(&redemption("r-1", 1, 500, 10_000), T0 + HOUR)
        .await
        .unwrap();
    let rejection = outcome.rejection().unwrap();
    assert_eq!(rejection.kind, RedemptionErrorKind::InsufficientBalance);
    assert_eq!(rejection.available, Some(0));

    let pending = ctx.service.get_pending(AccountId::new(1)).await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].delta, 1_000);
}

// ============================================================================
// C. Settlement
// ============================================================================

#[tokio::test]
async fn test_settlement_never_flips_terminal_status() {
    let ctx = TestContext::new();
    ctx.register(1, "alice@example.com").await;
    let outcome = ctx
        .service
        .record_booking_completed(&booking_completed(5, 1, 2_000), T0)
        .await
        .unwrap()
        .unwrap();
    ctx.set_booking(5, 1, BookingStatus::Completed).await;
    ctx.service.run_settlement(T0 + DAY).await.unwrap();

    // a late refund does not reopen a settled entry
    ctx.bookings.set_status(BookingId::new(5), BookingStatus::Refunded).await;
    for day in 2..5 {
        let report = ctx.service.run_settlement(T0 + day * DAY).await.unwrap();
        assert_eq!(report.examined, 0);
    }

    let entry = ctx.service.get_entry(outcome.id()).await.unwrap().unwrap();
    assert_eq!(entry.status, EntryStatus::Confirmed);
    assert_eq!(ctx.service.get_redeemable(AccountId::new(1)).await.unwrap(), 20);
}

#[tokio::test]
async fn test_failed_lookup_keeps_entry_pending() {
    let ctx = TestContext::new();
    ctx.register(1, "alice@example.com").await;
    ctx.service
        .record_booking_completed(&booking_completed(8, 1, 5_000), T0)
        .await
        .unwrap();
    ctx.set_booking(8, 1, BookingStatus::Completed).await;
    ctx.bookings.fail(BookingId::new(8)).await;

    let report = ctx.service.run_settlement(T0 + DAY).await.unwrap();
    assert_eq!(report.examined, 1);
    assert_eq!(report.deferred, 1);
    assert_eq!(report.confirmed, 0);
    assert_eq!(ctx.service.get_balance(AccountId::new(1)).await.unwrap().pending, 50);

    ctx.bookings.recover(BookingId::new(8)).await;
    let report = ctx.service.run_settlement(T0 + DAY + HOUR).await.unwrap();
    assert_eq!(report.confirmed, 1);
    assert_eq!(ctx.service.get_redeemable(AccountId::new(1)).await.unwrap(), 50);
}

#[tokio::test]
async fn test_unresolved_bookings_wait() {
    let ctx = TestContext::new();
    ctx.register(1, "alice@example.com").await;
    for booking in [10, 11] {
        ctx.service
            .record_booking_completed(&booking_completed(booking, 1, 1_000), T0)
            .await
            .unwrap();
    }
    // 10 is disputed, 11 unknown to the booking subsystem
    ctx.set_booking(10, 1, BookingStatus::Disputed).await;

    let report = ctx.service.run_settlement(T0 + DAY).await.unwrap();
    assert_eq!(report.examined, 2);
    assert_eq!(report.still_pending, 2);

    ctx.bookings.set_status(BookingId::new(10), BookingStatus::Completed).await;
    let report = ctx.service.run_settlement(T0 + 2 * DAY).await.unwrap();
    assert_eq!(report.confirmed, 1);
    assert_eq!(report.still_pending, 1);
}

#[tokio::test]
async fn test_settlement_walks_every_batch() {
    let policy = LoyaltyPolicy {
        settlement_batch: 3,
        ..Default::default()
    };
    let ctx = TestContext::with_policy(policy);
    ctx.register(1, "alice@example.com").await;
    for booking in 0..8 {
        ctx.service
            .record_booking_completed(&booking_completed(booking, 1, 100), T0 + booking)
            .await
            .unwrap();
        ctx.set_booking(booking, 1, BookingStatus::Completed).await;
    }

    let report = ctx.service.run_settlement(T0 + DAY + 100).await.unwrap();
    assert_eq!(report.examined, 8);
    assert_eq!(report.confirmed, 8);
    assert_eq!(ctx.service.get_redeemable(AccountId::new(1)).await.unwrap(), 8);
}

// ============================================================================
// D. Redemption
// ============================================================================

#[tokio::test]
async fn test_redemption_preconditions() {
    let ctx = TestContext::new();
    ctx.register(1, "alice@example.com").await;
    ctx.fund(1, 5_000).await;

    let outcome = ctx
        .service
        .validate_and_reserve(&redemption("r-1", 1, 500, 10_000), T0)
        .await
        .unwrap();
    assert_eq!(outcome.rejection().unwrap().kind, RedemptionErrorKind::IdentityNotVerified);

    ctx.service.verify_mobile(AccountId::new(1), "07700 900001").await.unwrap();
    let outcome = ctx
        .service
        .validate_and_reserve(&redemption("r-2", 1, 499, 10_000), T0)
        .await
        .unwrap();
    let rejection = outcome.rejection().unwrap();
    assert_eq!(rejection.kind, RedemptionErrorKind::BelowMinimum);
    assert_eq!(rejection.minimum_points, Some(500));

    let err = ctx
        .service
        .validate_and_reserve(&redemption("r-3", 2, 500, 10_000), T0)
        .await
        .unwrap_err();
    assert!(matches!(err, LoyaltyError::AccountNotFound(_)));

    ctx.service.deactivate_account(AccountId::new(1)).await.unwrap();
    let err = ctx
        .service
        .validate_and_reserve(&redemption("r-4", 1, 500, 10_000), T0)
        .await
        .unwrap_err();
    assert!(matches!(err, LoyaltyError::AccountInactive(_)));
}

#[tokio::test]
async fn test_mobile_verified_once() {
    let ctx = TestContext::new();
    ctx.register_verified(1, "alice@example.com", "+44 7700 900001").await;
    ctx.register(2, "bob@example.com").await;

    let err = ctx
        .service
        .verify_mobile(AccountId::new(2), "+447700900001")
        .await
        .unwrap_err();
    assert!(matches!(err, LoyaltyError::MobileAlreadyInUse(id) if id == AccountId::new(1)));
}

#[tokio::test]
async fn test_verification_flags_ignored_at_signup() {
    let ctx = TestContext::new();
    ctx.register_verified(1, "alice@example.com", "07700900001").await;
    ctx.fund(1, 1_000).await;

    let mut event = signup(2, "bob@example.com", None);
    event.account = event.account.with_mobile("07700900001", true);
    event.account.identity_verified = true;
    ctx.service.attach_referral(&event, T0).await.unwrap();

    let stored = ctx.service.get_account(AccountId::new(2)).await.unwrap().unwrap();
    assert!(!stored.mobile_verified);
    assert!(!stored.identity_verified);
    assert!(!stored.can_redeem());

    ctx.fund(2, 1_000).await;
    let outcome = ctx
        .service
        .validate_and_reserve(&redemption("r-1", 2, 500, 10_000), T0)
        .await
        .unwrap();
    match outcome {
        RedemptionOutcome::Rejected(rejection) => {
            assert_eq!(rejection.kind, RedemptionErrorKind::IdentityNotVerified)
        }
        other => panic!("unexpected outcome {:?}", other),
    }

    // the number is still held by its verified owner
    let err = ctx
        .service
        .verify_mobile(AccountId::new(2), "07700900001")
        .await
        .unwrap_err();
    assert!(matches!(err, LoyaltyError::MobileAlreadyInUse(id) if id == AccountId::new(1)));
}

#[tokio::test]
async fn test_changed_mobile_releases_the_old_number() {
    let ctx = TestContext::new();
    ctx.register(1, "referrer@example.com").await;
    ctx.register_verified(2, "alice@example.com", "07700900001").await;
    ctx.service
        .verify_mobile(AccountId::new(2), "07700900002")
        .await
        .unwrap();

    // the old number no longer collides with account 2
    let mut event = signup(3, "carol@example.com", Some(&active_code(&ctx, 1).await));
    event.account = event.account.with_mobile("07700900001", false);
    let record = ctx.service.attach_referral(&event, T0).await.unwrap();
    assert!(record.is_some());

    // the new one does
    let mut event = signup(4, "dave@example.com", Some(&active_code(&ctx, 1).await));
    event.account = event.account.with_mobile("07700900002", false);
    assert!(ctx.service.attach_referral(&event, T0).await.unwrap().is_none());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_redemptions_cannot_overspend() {
    let ctx = TestContext::new();
    ctx.register_verified(1, "alice@example.com", "07700900001").await;
    ctx.fund(1, 1_000).await;

    let mut handles = Vec::new();
    for i in 0..4 {
        let service = Arc::clone(&ctx.service);
        handles.push(tokio::spawn(async move {
            service
                .validate_and_reserve(&redemption(&format!("race-{}", i), 1, 600, 10_000), T0)
                .await
        }));
    }

    let mut reserved = 0;
    for handle in handles {
        match handle.await.unwrap().unwrap() {
            RedemptionOutcome::Reserved(_) => reserved += 1,
            RedemptionOutcome::Rejected(rejection) => {
                assert_eq!(rejection.kind, RedemptionErrorKind::InsufficientBalance)
            }
        }
    }

    assert_eq!(reserved, 1);
    assert_eq!(ctx.service.get_redeemable(AccountId::new(1)).await.unwrap(), 400);
}

// ============================================================================
// E. Referrals
// ============================================================================

#[tokio::test]
async fn test_self_referral_is_not_attributed() {
    let ctx = TestContext::new();
    ctx.register_verified(1, "Alice@Example.com", "+44 7700 900001").await;
    let code = active_code(&ctx, 1).await;

    // same email, different case
    let record = ctx
        .service
        .attach_referral(&signup(2, "alice@example.com ", Some(&code)), T0)
        .await
        .unwrap();
    assert!(record.is_none());
    // the signup itself went through
    assert!(ctx.service.get_account(AccountId::new(2)).await.unwrap().is_some());

    // same mobile
    let mut event = signup(3, "carol@example.com", Some(&code));
    event.account = event.account.with_mobile("+447700900001", false);
    assert!(ctx.service.attach_referral(&event, T0).await.unwrap().is_none());

    // the code was not consumed
    let stored = ctx.service.get_referral_code(&code).await.unwrap().unwrap();
    assert_eq!(stored.status, ReferralCodeStatus::Active);
}

#[tokio::test]
async fn test_reused_device_and_payment_method() {
    let ctx = TestContext::new();
    ctx.register(1, "referrer@example.com").await;
    ctx.register(5, "other@example.com").await;

    let mut first = signup(2, "bob@example.com", Some(&active_code(&ctx, 1).await));
    first.device_fingerprint = Some("fp-1".to_owned());
    first.payment_method_hash = Some("card-1".to_owned());
    assert!(ctx.service.attach_referral(&first, T0).await.unwrap().is_some());

    let mut second = signup(3, "carol@example.com", Some(&active_code(&ctx, 1).await));
    second.device_fingerprint = Some(" FP-1 ".to_owned());
    assert!(ctx.service.attach_referral(&second, T0).await.unwrap().is_none());

    // same card under another referrer
    let mut third = signup(4, "dave@example.com", Some(&active_code(&ctx, 5).await));
    third.payment_method_hash = Some("card-1".to_owned());
    assert!(ctx.service.attach_referral(&third, T0).await.unwrap().is_none());
}

#[tokio::test]
async fn test_referral_codes_are_single_use() {
    let ctx = TestContext::new();
    ctx.register(1, "referrer@example.com").await;
    let code = active_code(&ctx, 1).await;

    let record = ctx
        .service
        .attach_referral(&signup(2, "bob@example.com", Some(&code)), T0)
        .await
        .unwrap()
        .unwrap();

    // a retried signup returns the same record
    let retry = ctx
        .service
        .attach_referral(&signup(2, "bob@example.com", Some(&code)), T0 + 1)
        .await
        .unwrap();
    assert_eq!(retry, Some(record));

    let used = ctx.service.get_referral_code(&code).await.unwrap().unwrap();
    assert_eq!(used.status, ReferralCodeStatus::Used);
    assert_eq!(used.used_by, Some(AccountId::new(2)));
    assert!(ctx
        .service
        .attach_referral(&signup(3, "carol@example.com", Some(&code)), T0)
        .await
        .unwrap()
        .is_none());

    let fresh = active_code(&ctx, 1).await;
    assert_ne!(fresh, code);

    // unknown and malformed codes are ignored
    assert!(ctx
        .service
        .attach_referral(&signup(4, "dave@example.com", Some("not a code")), T0)
        .await
        .unwrap()
        .is_none());

    let referrals = ctx.service.list_referrals(AccountId::new(1), 0, 10).await.unwrap();
    assert_eq!(referrals.len(), 1);
}

#[tokio::test]
async fn test_referrer_flagged_for_review() {
    let ctx = TestContext::new();
    ctx.register(1, "busy@example.com").await;
    ctx.register(2, "quiet@example.com").await;

    for id in 10..15u64 {
        let code = active_code(&ctx, 1).await;
        let mut event = signup(id, &format!("user{}@example.com", id), Some(&code));
        event.account = event.account.with_mobile(format!("0770090{:04}", id), false);
        assert!(ctx.service.attach_referral(&event, T0).await.unwrap().is_some());
    }

    let code = active_code(&ctx, 2).await;
    let mut event = signup(20, "solo@example.com", Some(&code));
    event.device_fingerprint = Some("fp-20".to_owned());
    ctx.service.attach_referral(&event, T0).await.unwrap().unwrap();

    // no device fingerprint on any of the five referrals
    let report = ctx.service.referrer_risk_report(AccountId::new(1)).await.unwrap();
    assert_eq!(report.referrals, 5);
    assert_eq!(report.unique_devices, 0);
    assert_eq!(report.unique_mobiles, 5);
    assert!(report.flagged);

    let flagged = ctx.service.flagged_referrers().await.unwrap();
    assert_eq!(flagged.len(), 1);
    assert_eq!(flagged[0].referrer, AccountId::new(1));
}

#[tokio::test]
async fn test_referral_bonus_waits_for_the_first_confirmed_booking() {
    let ctx = TestContext::new();
    ctx.register(1, "referrer@example.com").await;
    let code = active_code(&ctx, 1).await;
    ctx.service
        .attach_referral(&signup(2, "bob@example.com", Some(&code)), T0)
        .await
        .unwrap()
        .unwrap();

    // first booking refunded: no bonus
    ctx.service
        .record_booking_completed(&booking_completed(40, 2, 2_000), T0)
        .await
        .unwrap();
    ctx.set_booking(40, 2, BookingStatus::Refunded).await;
    let report = ctx.service.run_settlement(T0 + DAY).await.unwrap();
    assert_eq!(report.reversed, 1);
    assert_eq!(report.referral_bonuses, 0);

    ctx.service
        .record_booking_completed(&booking_completed(41, 2, 2_000), T0 + DAY)
        .await
        .unwrap();
    ctx.set_booking(41, 2, BookingStatus::Completed).await;
    let report = ctx.service.run_settlement(T0 + 2 * DAY).await.unwrap();
    assert_eq!(report.referral_bonuses, 1);

    let entries = ctx.service.list_entries(AccountId::new(1), 0, 10).await.unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].reason, ReasonCode::ReferralCompleted);
    assert_eq!(entries[0].refs.booking, Some(BookingId::new(41)));
}

#[tokio::test]
async fn test_zero_point_first_booking_uses_up_the_referral() {
    let ctx = TestContext::new();
    ctx.register(1, "referrer@example.com").await;
    let code = active_code(&ctx, 1).await;
    ctx.service
        .attach_referral(&signup(2, "bob@example.com", Some(&code)), T0)
        .await
        .unwrap()
        .unwrap();

    // 50 pence earns nothing but is still the first completed booking
    let outcome = ctx
        .service
        .record_booking_completed(&booking_completed(40, 2, 50), T0)
        .await
        .unwrap();
    assert!(outcome.is_none());
    // a duplicate delivery is not counted twice
    ctx.service
        .record_booking_completed(&booking_completed(40, 2, 50), T0)
        .await
        .unwrap();

    ctx.service
        .record_booking_completed(&booking_completed(41, 2, 3_000), T0)
        .await
        .unwrap();
    ctx.set_booking(41, 2, BookingStatus::Completed).await;
    let report = ctx.service.run_settlement(T0 + DAY).await.unwrap();
    assert_eq!(report.confirmed, 1);
    assert_eq!(report.referral_bonuses, 0);

    let entries = ctx.service.list_entries(AccountId::new(1), 0, 10).await.unwrap();
    assert!(entries.is_empty());
    let balance = ctx.service.get_balance(AccountId::new(2)).await.unwrap();
    assert_eq!(balance.confirmed, 30);
}
