//! Property-based tests for the loyalty ledger
//!
//! Properties tested:
//! - The balance never goes negative whatever the mix of earns, settlements,
//!   redemptions and adjustments
//! - Redemptions inside one window never exceed the cap

#![allow(clippy::disallowed_methods)]

mod common;

use common::*;
use loyalty_common::{
    booking::BookingStatus,
    ids::AccountId,
    ledger::EntryStatus,
    redemption::{RedemptionErrorKind, RedemptionOutcome},
};
use proptest::prelude::*;

#[derive(Debug, Clone)]
enum Op {
    Earn(u64),
    Settle,
    Redeem(u64),
    Adjust(i64),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (100u64..200_000).prop_map(Op::Earn),
        Just(Op::Settle),
        (400u64..3_000).prop_map(Op::Redeem),
        (-2_000i64..2_000).prop_filter("non zero", |d| *d != 0).prop_map(Op::Adjust),
    ]
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn test_balance_never_negative(ops in prop::collection::vec(op(), 1..30)) {
        runtime().block_on(async {
            let ctx = TestContext::new();
            ctx.register_verified(1, "alice@example.com", "07700900001").await;
            let account = AccountId::new(1);
            let mut now = T0;
            let mut redeemed = 0u64;

            for (i, op) in ops.into_iter().enumerate() {
                now += HOUR * 6;
                let i = i as u64;
                match op {
                    Op::Earn(amount) => {
                        ctx.set_booking(i, 1, BookingStatus::Completed).await;
                        ctx.service
                            .record_booking_completed(&booking_completed(i, 1, amount), now)
                            .await
                            .unwrap();
                    }
                    Op::Settle => {
                        ctx.service.run_settlement(now).await.unwrap();
                    }
                    Op::Redeem(points) => {
                        let request = redemption(&format!("r-{}", i), 1, points, 1_000_000);
                        match ctx.service.validate_and_reserve(&request, now).await.unwrap() {
                            RedemptionOutcome::Reserved(r) => redeemed += r.points,
                            RedemptionOutcome::Rejected(r) => prop_assert!(matches!(
                                r.kind,
                                RedemptionErrorKind::InsufficientBalance
                                    | RedemptionErrorKind::BelowMinimum
                                    | RedemptionErrorKind::CapExceeded
                            )),
                        }
                    }
                    Op::Adjust(delta) => {
                        let res = ctx
                            .service
                            .adjust_balance(account, delta, &format!("adj-{}", i), "property", now)
                            .await;
                        if let Err(e) = res {
                            prop_assert!(e.rejection().is_some());
                        }
                    }
                }

                let balance = ctx.service.get_balance(account).await.unwrap();
                let entries = ctx.service.list_entries(account, 0, usize::MAX).await.unwrap();
                let confirmed: i64 = entries
                    .iter()
                    .filter(|e| e.status == EntryStatus::Confirmed)
                    .map(|e| e.delta)
                    .sum();
                prop_assert!(confirmed >= 0);
                prop_assert_eq!(balance.confirmed as i64, confirmed);
            }

            // every operation lands within 30 * 6h, a single window
            prop_assert!(redeemed <= ctx.service.policy().redemption_cap_points);
            Ok::<(), TestCaseError>(())
        })?;
    }
}
