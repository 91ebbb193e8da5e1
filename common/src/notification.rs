// Opaque notification requests emitted on ledger state transitions.
// Delivery (email, SMS, push) is handled outside of the loyalty core.

use serde::{Deserialize, Serialize};

use crate::{
    ids::{AccountId, EntryId},
    ledger::{LedgerEntry, ReasonCode},
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Notification {
    PointsPending {
        account: AccountId,
        entry: EntryId,
        points: u64,
        reason: ReasonCode,
    },
    PointsConfirmed {
        account: AccountId,
        entry: EntryId,
        points: u64,
        reason: ReasonCode,
    },
    PointsReversed {
        account: AccountId,
        entry: EntryId,
        points: u64,
        reason: ReasonCode,
    },
    ReferralBonusPending {
        referrer: AccountId,
        referee: AccountId,
        entry: EntryId,
        points: u64,
    },
    ReferralBonusConfirmed {
        referrer: AccountId,
        referee: AccountId,
        entry: EntryId,
        points: u64,
    },
    PointsRedeemed {
        account: AccountId,
        entry: EntryId,
        points: u64,
        /// Redeemed value in minor units
        value: u64,
    },
}

impl Notification {
    // Pending notification for a freshly appended earn entry
    pub fn pending(entry: &LedgerEntry) -> Self {
        match (entry.reason, entry.refs.referred_account) {
            (ReasonCode::ReferralCompleted, Some(referee)) => Self::ReferralBonusPending {
                referrer: entry.account,
                referee,
                entry: entry.id,
                points: entry.points(),
            },
            _ => Self::PointsPending {
                account: entry.account,
                entry: entry.id,
                points: entry.points(),
                reason: entry.reason,
            },
        }
    }

    pub fn confirmed(entry: &LedgerEntry) -> Self {
        match (entry.reason, entry.refs.referred_account) {
            (ReasonCode::ReferralCompleted, Some(referee)) => Self::ReferralBonusConfirmed {
                referrer: entry.account,
                referee,
                entry: entry.id,
                points: entry.points(),
            },
            _ => Self::PointsConfirmed {
                account: entry.account,
                entry: entry.id,
                points: entry.points(),
                reason: entry.reason,
            },
        }
    }

    pub fn reversed(entry: &LedgerEntry) -> Self {
        Self::PointsReversed {
            account: entry.account,
            entry: entry.id,
            points: entry.points(),
            reason: entry.reason,
        }
    }

    // Account receiving the notification
    pub fn recipient(&self) -> AccountId {
        match self {
            Self::PointsPending { account, .. }
            | Self::PointsConfirmed { account, .. }
            | Self::PointsReversed { account, .. }
            | Self::PointsRedeemed { account, .. } => *account,
            Self::ReferralBonusPending { referrer, .. }
            | Self::ReferralBonusConfirmed { referrer, .. } => *referrer,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::PointsPending { .. } => "points_pending",
            Self::PointsConfirmed { .. } => "points_confirmed",
            Self::PointsReversed { .. } => "points_reversed",
            Self::ReferralBonusPending { .. } => "referral_bonus_pending",
            Self::ReferralBonusConfirmed { .. } => "referral_bonus_confirmed",
            Self::PointsRedeemed { .. } => "points_redeemed",
        }
    }
}
