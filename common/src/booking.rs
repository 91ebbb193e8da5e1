// Booking data consumed from the booking subsystem
//
// The ledger never owns bookings. It only reads their current state when
// settling a pending entry.

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display};

use crate::{
    ids::{AccountId, BookingId},
    time::TimestampMillis,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, AsRefStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum BookingStatus {
    /// Requested or awaiting the business
    Pending,
    /// Accepted, service not yet delivered
    Confirmed,
    /// Service delivered
    Completed,
    /// Completed but contested by the customer
    Disputed,
    Cancelled,
    Refunded,
}

/// What settlement should do with a pending entry given its booking status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettlementDecision {
    Confirm,
    Reverse,
    /// Booking not in a terminal state yet, re-evaluate next cycle
    Wait,
}

impl BookingStatus {
    pub fn settlement_decision(&self) -> SettlementDecision {
        match self {
            Self::Completed => SettlementDecision::Confirm,
            Self::Cancelled | Self::Refunded => SettlementDecision::Reverse,
            // a dispute may still end in a refund
            Self::Pending | Self::Confirmed | Self::Disputed => SettlementDecision::Wait,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.settlement_decision() != SettlementDecision::Wait
    }
}

/// Current state of a booking as reported by the booking subsystem
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingSnapshot {
    pub id: BookingId,
    /// Customer who made the booking
    pub customer: AccountId,
    pub status: BookingStatus,
    /// Net chargeable amount in minor units
    pub net_amount: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<TimestampMillis>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settlement_decisions() {
        assert_eq!(BookingStatus::Completed.settlement_decision(), SettlementDecision::Confirm);
        assert_eq!(BookingStatus::Refunded.settlement_decision(), SettlementDecision::Reverse);
        assert_eq!(BookingStatus::Cancelled.settlement_decision(), SettlementDecision::Reverse);
        assert_eq!(BookingStatus::Disputed.settlement_decision(), SettlementDecision::Wait);
        assert!(!BookingStatus::Confirmed.is_terminal());
    }

    #[test]
    fn test_status_json() {
        let status: BookingStatus = serde_json::from_str("\"refunded\"").unwrap();
        assert_eq!(status, BookingStatus::Refunded);
        assert_eq!(status.to_string(), "refunded");
    }
}
