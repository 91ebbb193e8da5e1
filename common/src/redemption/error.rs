use std::fmt::{Display, Error, Formatter};

use serde::{Deserialize, Serialize};
use strum::AsRefStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, AsRefStr)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum RedemptionErrorKind {
    IdentityNotVerified,
    BelowMinimum,
    InsufficientBalance,
    OrderTooSmall,
    CapExceeded,
}

/// A business-rule rejection, returned to the caller as a typed value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedemptionRejection {
    pub kind: RedemptionErrorKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requested: Option<u64>,
    /// Confirmed balance at the time of the check
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub available: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minimum_points: Option<u64>,
    /// Minimum order value, in minor units, for the requested points
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required_order_value: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub booking_amount: Option<u64>,
    /// Points still redeemable inside the rolling window
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remaining_headroom: Option<u64>,
}

impl RedemptionRejection {
    fn new(kind: RedemptionErrorKind) -> Self {
        Self {
            kind,
            requested: None,
            available: None,
            minimum_points: None,
            required_order_value: None,
            booking_amount: None,
            remaining_headroom: None,
        }
    }

    pub fn identity_not_verified() -> Self {
        Self::new(RedemptionErrorKind::IdentityNotVerified)
    }

    pub fn below_minimum(requested: u64, minimum: u64) -> Self {
        Self {
            requested: Some(requested),
            minimum_points: Some(minimum),
            ..Self::new(RedemptionErrorKind::BelowMinimum)
        }
    }

    pub fn insufficient_balance(requested: u64, available: u64) -> Self {
        Self {
            requested: Some(requested),
            available: Some(available),
            ..Self::new(RedemptionErrorKind::InsufficientBalance)
        }
    }

    pub fn order_too_small(requested: u64, booking_amount: u64, required: u64) -> Self {
        Self {
            requested: Some(requested),
            booking_amount: Some(booking_amount),
            required_order_value: Some(required),
            ..Self::new(RedemptionErrorKind::OrderTooSmall)
        }
    }

    pub fn cap_exceeded(requested: u64, headroom: u64) -> Self {
        Self {
            requested: Some(requested),
            remaining_headroom: Some(headroom),
            ..Self::new(RedemptionErrorKind::CapExceeded)
        }
    }
}

// Minor units rendered as pounds and pence
fn money(minor: u64) -> String {
    format!("£{}.{:02}", minor / 100, minor % 100)
}

impl Display for RedemptionRejection {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), Error> {
        match self.kind {
            RedemptionErrorKind::IdentityNotVerified => {
                write!(f, "Verify your mobile number before redeeming points")
            }
            RedemptionErrorKind::BelowMinimum => write!(
                f,
                "You need to redeem at least {} points",
                self.minimum_points.unwrap_or_default()
            ),
            RedemptionErrorKind::InsufficientBalance => write!(
                f,
                "Not enough points: {} requested, {} available",
                self.requested.unwrap_or_default(),
                self.available.unwrap_or_default()
            ),
            RedemptionErrorKind::OrderTooSmall => write!(
                f,
                "Minimum order value of {} required to redeem {} points",
                money(self.required_order_value.unwrap_or_default()),
                self.requested.unwrap_or_default()
            ),
            RedemptionErrorKind::CapExceeded => write!(
                f,
                "Redemption limit reached: you can redeem {} more points in the current 30 day period",
                self.remaining_headroom.unwrap_or_default()
            ),
        }
    }
}

impl std::error::Error for RedemptionRejection {}
