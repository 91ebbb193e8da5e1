// Referral fraud signals and the referrer monitoring report

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display};

use crate::{config::LoyaltyPolicy, ids::AccountId};

/// Reason an attribution was suppressed, the signup itself always succeeds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, AsRefStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum FraudSignal {
    /// The code belongs to the account signing up
    SelfReferral,
    /// Referrer and referee share an email address
    SharedEmail,
    /// Referrer and referee share a mobile number
    SharedMobile,
    /// The referee's mobile already belongs to another account
    MobileCollision,
    /// The referee's email already belongs to another account
    EmailCollision,
    /// Device already attached to a previous referral
    DeviceReused,
    /// Payment method already seen under another referrer
    PaymentMethodReused,
}

/// Aggregate view of a referrer's referrals, used for manual review only
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferrerRiskReport {
    pub referrer: AccountId,
    pub referrals: u64,
    pub unique_devices: u64,
    pub unique_mobiles: u64,
    pub flagged: bool,
}

impl ReferrerRiskReport {
    pub fn new(
        policy: &LoyaltyPolicy,
        referrer: AccountId,
        referrals: u64,
        unique_devices: u64,
        unique_mobiles: u64,
    ) -> Self {
        let flagged = referrals >= policy.referral_review_min_volume
            && (below_ratio(unique_devices, referrals, policy.referral_review_min_unique_percent)
                || below_ratio(unique_mobiles, referrals, policy.referral_review_min_unique_percent));

        Self {
            referrer,
            referrals,
            unique_devices,
            unique_mobiles,
            flagged,
        }
    }

    // Percent of referrals with a distinct device
    pub fn device_ratio(&self) -> u64 {
        percent(self.unique_devices, self.referrals)
    }

    pub fn mobile_ratio(&self) -> u64 {
        percent(self.unique_mobiles, self.referrals)
    }
}

fn percent(part: u64, total: u64) -> u64 {
    if total == 0 {
        return 100;
    }
    part.saturating_mul(100) / total
}

// unique / total < min_percent / 100, without rounding
fn below_ratio(unique: u64, total: u64, min_percent: u64) -> bool {
    unique.saturating_mul(100) < total.saturating_mul(min_percent)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_low_volume_never_flagged() {
        let policy = LoyaltyPolicy::default();
        let report = ReferrerRiskReport::new(&policy, AccountId::new(1), 4, 1, 1);
        assert!(!report.flagged);
    }

    #[test]
    fn test_shared_devices_flagged() {
        let policy = LoyaltyPolicy::default();
        let report = ReferrerRiskReport::new(&policy, AccountId::new(1), 10, 2, 10);
        assert!(report.flagged);
        assert_eq!(report.device_ratio(), 20);
        assert_eq!(report.mobile_ratio(), 100);
    }

    #[test]
    fn test_exact_threshold_passes() {
        let policy = LoyaltyPolicy::default();
        let report = ReferrerRiskReport::new(&policy, AccountId::new(1), 10, 5, 5);
        assert!(!report.flagged);
    }
}
