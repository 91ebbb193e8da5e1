// Closed set of inbound events the loyalty core reacts to

use serde::{Deserialize, Serialize};

use crate::{
    ids::{AccountId, BookingId, ReviewId},
    referral::SignupEvent,
    time::TimestampMillis,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LoyaltyEvent {
    /// The booking subsystem reports a booking as completed
    BookingCompleted(BookingCompleted),
    /// The review subsystem verified a review
    ReviewVerified(ReviewVerified),
    /// A new account signed up, possibly with a referral code
    ReferralSignup(SignupEvent),
    /// Checkout asks to spend points against a booking
    RedemptionRequest(RedemptionRequest),
}

impl LoyaltyEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::BookingCompleted(_) => "booking_completed",
            Self::ReviewVerified(_) => "review_verified",
            Self::ReferralSignup(_) => "referral_signup",
            Self::RedemptionRequest(_) => "redemption_request",
        }
    }

    // Account the event is about
    pub fn account(&self) -> AccountId {
        match self {
            Self::BookingCompleted(e) => e.account,
            Self::ReviewVerified(e) => e.reviewer,
            Self::ReferralSignup(e) => e.account.id,
            Self::RedemptionRequest(e) => e.account,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingCompleted {
    pub booking: BookingId,
    /// Customer earning the points
    pub account: AccountId,
    /// Net chargeable amount in minor units
    pub net_amount: u64,
    pub completed_at: TimestampMillis,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewVerified {
    pub review: ReviewId,
    pub reviewer: AccountId,
    /// Booking the review is about, settlement follows its outcome when set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub booking: Option<BookingId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedemptionRequest {
    /// Caller supplied id, retries must reuse it
    pub request_id: String,
    pub account: AccountId,
    pub points: u64,
    /// Order value the points are applied to, in minor units
    pub booking_amount: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub booking: Option<BookingId>,
}
