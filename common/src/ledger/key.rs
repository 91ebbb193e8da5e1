use std::fmt::{Display, Error, Formatter};

use serde::{Deserialize, Serialize};

use crate::{
    ids::{AccountId, BookingId, ReviewId},
    serializer::{Reader, ReaderError, Serializer, Writer},
};

/// Deterministic identifier derived from the triggering event.
/// The ledger store enforces its uniqueness: a second append with the same
/// key returns the entry created by the first one.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IdempotencyKey(String);

impl IdempotencyKey {
    pub fn booking_earn(booking: BookingId) -> Self {
        Self(format!("booking:{booking}:earn"))
    }

    pub fn review_earn(review: ReviewId) -> Self {
        Self(format!("review:{review}:earn"))
    }

    // Keyed on the pair so a second qualifying event for the same pair is a no-op
    pub fn referral_bonus(referrer: AccountId, referee: AccountId) -> Self {
        Self(format!("referral:{referrer}:{referee}"))
    }

    pub fn redemption(request_id: &str) -> Self {
        Self(format!("redemption:{request_id}"))
    }

    pub fn manual_adjustment(reference: &str) -> Self {
        Self(format!("manual:{reference}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl AsRef<[u8]> for IdempotencyKey {
    fn as_ref(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl Display for IdempotencyKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), Error> {
        f.write_str(&self.0)
    }
}

impl Serializer for IdempotencyKey {
    fn read(reader: &mut Reader) -> Result<Self, ReaderError> {
        Ok(Self(reader.read_string()?))
    }

    fn write(&self, writer: &mut Writer) {
        writer.write_string(&self.0);
    }

    fn size(&self) -> usize {
        self.0.size()
    }
}
