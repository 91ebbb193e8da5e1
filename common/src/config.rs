use serde::{Deserialize, Serialize};

use crate::time::{TimestampMillis, MILLIS_PER_DAY, MILLIS_PER_HOUR};

pub const VERSION: &str = env!("BUILD_VERSION");

// ===== CURRENCY =====

// Amounts coming from the booking subsystem are expressed in minor units (pence)
// 100 minor units = 1 base unit (£1)
pub const MINOR_UNITS_PER_BASE_UNIT: u64 = 100;
// 1 point is worth £0.01
pub const POINT_VALUE_MINOR_UNITS: u64 = 1;

// ===== EARNING RULES =====

// 1 point per full base currency unit of net booking amount
pub const POINTS_PER_BASE_UNIT: u64 = 1;
// Fixed award for a verified review
pub const REVIEW_POINTS: u64 = 25;
// Fixed award credited to the referrer once the referee's first booking settles
pub const REFERRAL_BONUS_POINTS: u64 = 100;

// ===== SETTLEMENT =====

// Earn-type entries stay pending for this long before being resolved
pub const HOLD_PERIOD_MILLIS: TimestampMillis = 24 * MILLIS_PER_HOUR;
// Maximum entries examined per settlement invocation
pub const DEFAULT_SETTLEMENT_BATCH: usize = 256;

// ===== REDEMPTION RULES =====

// 500 points = £5, the minimum redeemable value
pub const MIN_REDEMPTION_POINTS: u64 = 500;
// Redemption value may cover at most 50% of the order
pub const MAX_REDEMPTION_PERCENT: u64 = 50;
// Trailing window for the rolling cap
pub const REDEMPTION_WINDOW_MILLIS: TimestampMillis = 30 * MILLIS_PER_DAY;
// 5000 points = £50 per rolling window
pub const REDEMPTION_CAP_POINTS: u64 = 5_000;

// ===== REFERRAL MONITORING =====

// Referrers with fewer referrals than this are never flagged
pub const REFERRAL_REVIEW_MIN_VOLUME: u64 = 5;
// Unique devices / phones per referral below this ratio (in percent) get flagged
pub const REFERRAL_REVIEW_MIN_UNIQUE_PERCENT: u64 = 50;

// Referral codes are drawn from an alphabet without 0/O/1/I
pub const REFERRAL_CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
pub const REFERRAL_CODE_LENGTH: usize = 8;

/// Every business constant in one place, overridable from the daemon
/// configuration file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoyaltyPolicy {
    pub minor_units_per_base_unit: u64,
    pub point_value_minor_units: u64,
    pub points_per_base_unit: u64,
    pub review_points: u64,
    pub referral_bonus_points: u64,
    pub hold_period_millis: TimestampMillis,
    pub settlement_batch: usize,
    pub min_redemption_points: u64,
    pub max_redemption_percent: u64,
    pub redemption_window_millis: TimestampMillis,
    pub redemption_cap_points: u64,
    pub referral_review_min_volume: u64,
    pub referral_review_min_unique_percent: u64,
}

impl Default for LoyaltyPolicy {
    fn default() -> Self {
        Self {
            minor_units_per_base_unit: MINOR_UNITS_PER_BASE_UNIT,
            point_value_minor_units: POINT_VALUE_MINOR_UNITS,
            points_per_base_unit: POINTS_PER_BASE_UNIT,
            review_points: REVIEW_POINTS,
            referral_bonus_points: REFERRAL_BONUS_POINTS,
            hold_period_millis: HOLD_PERIOD_MILLIS,
            settlement_batch: DEFAULT_SETTLEMENT_BATCH,
            min_redemption_points: MIN_REDEMPTION_POINTS,
            max_redemption_percent: MAX_REDEMPTION_PERCENT,
            redemption_window_millis: REDEMPTION_WINDOW_MILLIS,
            redemption_cap_points: REDEMPTION_CAP_POINTS,
            referral_review_min_volume: REFERRAL_REVIEW_MIN_VOLUME,
            referral_review_min_unique_percent: REFERRAL_REVIEW_MIN_UNIQUE_PERCENT,
        }
    }
}

impl LoyaltyPolicy {
    // Currency value of a number of points, in minor units
    pub fn points_value(&self, points: u64) -> u64 {
        points.saturating_mul(self.point_value_minor_units)
    }

    // Check the policy is usable, returns the first offending field
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.minor_units_per_base_unit == 0 {
            return Err("minor_units_per_base_unit");
        }
        if self.point_value_minor_units == 0 {
            return Err("point_value_minor_units");
        }
        if self.max_redemption_percent == 0 || self.max_redemption_percent > 100 {
            return Err("max_redemption_percent");
        }
        if self.settlement_batch == 0 {
            return Err("settlement_batch");
        }
        if self.referral_review_min_unique_percent > 100 {
            return Err("referral_review_min_unique_percent");
        }
        if self.min_redemption_points > self.redemption_cap_points {
            return Err("min_redemption_points");
        }
        Ok(())
    }
}
