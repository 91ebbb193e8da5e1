// Redemption rule chain
//
// Checks run in a fixed order and the first failing one wins. The outcome
// carries the figures needed to render an actionable message.

mod error;

pub use error::*;

use serde::{Deserialize, Serialize};

use crate::{
    config::LoyaltyPolicy,
    ids::EntryId,
    serializer::{Reader, ReaderError, Serializer, Writer},
};

/// Everything the rule chain needs, read from storage in one consistent view
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RedemptionContext {
    pub has_verified_mobile: bool,
    pub confirmed_balance: u64,
    /// Points redeemed inside the trailing window
    pub redeemed_in_window: u64,
    pub points_requested: u64,
    /// Order value in minor units
    pub booking_amount: u64,
}

/// Outcome of a successful redemption
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reservation {
    pub entry_id: EntryId,
    pub points: u64,
    /// Currency value of the redeemed points, in minor units
    pub value: u64,
    /// Remaining rolling cap after this redemption
    pub remaining_headroom: u64,
}

impl Serializer for Reservation {
    fn read(reader: &mut Reader) -> Result<Self, ReaderError> {
        Ok(Self {
            entry_id: EntryId::read(reader)?,
            points: reader.read_u64()?,
            value: reader.read_u64()?,
            remaining_headroom: reader.read_u64()?,
        })
    }

    fn write(&self, writer: &mut Writer) {
        self.entry_id.write(writer);
        writer.write_u64(self.points);
        writer.write_u64(self.value);
        writer.write_u64(self.remaining_headroom);
    }

    fn size(&self) -> usize {
        32
    }
}

/// Result of a redemption request as returned to checkout
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RedemptionOutcome {
    Reserved(Reservation),
    Rejected(RedemptionRejection),
}

impl RedemptionOutcome {
    pub fn is_reserved(&self) -> bool {
        matches!(self, Self::Reserved(_))
    }

    pub fn reservation(&self) -> Option<&Reservation> {
        match self {
            Self::Reserved(r) => Some(r),
            Self::Rejected(_) => None,
        }
    }

    pub fn rejection(&self) -> Option<&RedemptionRejection> {
        match self {
            Self::Reserved(_) => None,
            Self::Rejected(r) => Some(r),
        }
    }
}

// Remaining points that can be redeemed in the current window
pub fn cap_headroom(policy: &LoyaltyPolicy, redeemed_in_window: u64) -> u64 {
    policy.redemption_cap_points.saturating_sub(redeemed_in_window)
}

// Smallest order (minor units) on which `value` may be spent
pub fn required_order_value(policy: &LoyaltyPolicy, value: u64) -> u64 {
    // value <= amount * percent / 100  <=>  amount >= ceil(value * 100 / percent)
    let scaled = value.saturating_mul(100);
    let percent = policy.max_redemption_percent.max(1);
    scaled / percent + u64::from(scaled % percent != 0)
}

/// Run the five checks in order, returns the redeemed value in minor units
pub fn check_redemption(
    policy: &LoyaltyPolicy,
    ctx: &RedemptionContext,
) -> Result<u64, RedemptionRejection> {
    if !ctx.has_verified_mobile {
        return Err(RedemptionRejection::identity_not_verified());
    }

    if ctx.points_requested < policy.min_redemption_points {
        return Err(RedemptionRejection::below_minimum(
            ctx.points_requested,
            policy.min_redemption_points,
        ));
    }

    if ctx.points_requested > ctx.confirmed_balance {
        return Err(RedemptionRejection::insufficient_balance(
            ctx.points_requested,
            ctx.confirmed_balance,
        ));
    }

    let value = policy.points_value(ctx.points_requested);
    let required = required_order_value(policy, value);
    if ctx.booking_amount < required {
        return Err(RedemptionRejection::order_too_small(
            ctx.points_requested,
            ctx.booking_amount,
            required,
        ));
    }

    let headroom = cap_headroom(policy, ctx.redeemed_in_window);
    if ctx.points_requested > headroom {
        return Err(RedemptionRejection::cap_exceeded(ctx.points_requested, headroom));
    }

    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context() -> RedemptionContext {
        RedemptionContext {
            has_verified_mobile: true,
            confirmed_balance: 1_200,
            redeemed_in_window: 0,
            points_requested: 500,
            booking_amount: 10_000,
        }
    }

    #[test]
    fn test_success_returns_value() {
        let policy = LoyaltyPolicy::default();
        assert_eq!(check_redemption(&policy, &context()), Ok(500));
    }

    #[test]
    fn test_identity_checked_first() {
        let policy = LoyaltyPolicy::default();
        let ctx = RedemptionContext {
            has_verified_mobile: false,
            points_requested: 1,
            confirmed_balance: 0,
            ..context()
        };
        let err = check_redemption(&policy, &ctx).unwrap_err();
        assert_eq!(err.kind, RedemptionErrorKind::IdentityNotVerified);
    }

    #[test]
    fn test_minimum_before_balance() {
        let policy = LoyaltyPolicy::default();
        let ctx = RedemptionContext {
            points_requested: 499,
            confirmed_balance: 0,
            ..context()
        };
        let err = check_redemption(&policy, &ctx).unwrap_err();
        assert_eq!(err.kind, RedemptionErrorKind::BelowMinimum);
        assert_eq!(err.minimum_points, Some(500));
    }

    #[test]
    fn test_insufficient_balance() {
        let policy = LoyaltyPolicy::default();
        let ctx = RedemptionContext {
            confirmed_balance: 400,
            ..context()
        };
        let err = check_redemption(&policy, &ctx).unwrap_err();
        assert_eq!(err.kind, RedemptionErrorKind::InsufficientBalance);
        assert_eq!(err.available, Some(400));
    }

    // balance 1200, 500 points against an £8.00 booking: at most 400 points
    #[test]
    fn test_order_too_small() {
        let policy = LoyaltyPolicy::default();
        let ctx = RedemptionContext {
            booking_amount: 800,
            ..context()
        };
        let err = check_redemption(&policy, &ctx).unwrap_err();
        assert_eq!(err.kind, RedemptionErrorKind::OrderTooSmall);
        assert_eq!(err.required_order_value, Some(1_000));
        assert!(err.to_string().contains("£10.00"));
    }

    #[test]
    fn test_exact_half_is_allowed() {
        let policy = LoyaltyPolicy::default();
        let ctx = RedemptionContext {
            booking_amount: 1_000,
            ..context()
        };
        assert_eq!(check_redemption(&policy, &ctx), Ok(500));
    }

    // 4800 redeemed in the window, 300 more requested
    #[test]
    fn test_cap_exceeded_reports_headroom() {
        let policy = LoyaltyPolicy::default();
        let ctx = RedemptionContext {
            confirmed_balance: 10_000,
            redeemed_in_window: 4_800,
            points_requested: 300,
            ..context()
        };
        // 300 is below the minimum, raise the floor out of the way
        let policy = LoyaltyPolicy {
            min_redemption_points: 100,
            ..policy
        };
        let err = check_redemption(&policy, &ctx).unwrap_err();
        assert_eq!(err.kind, RedemptionErrorKind::CapExceeded);
        assert_eq!(err.remaining_headroom, Some(200));
    }

    #[test]
    fn test_required_order_value_rounds_up() {
        let policy = LoyaltyPolicy {
            max_redemption_percent: 30,
            ..Default::default()
        };
        // 100 / 0.3 = 333.33 -> 334
        assert_eq!(required_order_value(&policy, 100), 334);
    }
}
