use std::fmt::{Display, Error, Formatter};

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display as StrumDisplay};

use crate::{
    error::EntryError,
    ids::{AccountId, BookingId, EntryId, ReviewId},
    serializer::{Reader, ReaderError, Serializer, Writer},
    time::TimestampMillis,
};

use super::IdempotencyKey;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, StrumDisplay, AsRefStr)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum ReasonCode {
    BookingCompleted,
    ReviewVerified,
    ReferralCompleted,
    Redemption,
    ManualAdjustment,
}

impl ReasonCode {
    // Earn-type entries start pending and go through settlement
    pub fn is_earn(&self) -> bool {
        matches!(
            self,
            Self::BookingCompleted | Self::ReviewVerified | Self::ReferralCompleted
        )
    }

    pub fn initial_status(&self) -> EntryStatus {
        if self.is_earn() {
            EntryStatus::Pending
        } else {
            EntryStatus::Confirmed
        }
    }

    fn id(&self) -> u8 {
        match self {
            Self::BookingCompleted => 0,
            Self::ReviewVerified => 1,
            Self::ReferralCompleted => 2,
            Self::Redemption => 3,
            Self::ManualAdjustment => 4,
        }
    }
}

impl Serializer for ReasonCode {
    fn read(reader: &mut Reader) -> Result<Self, ReaderError> {
        Ok(match reader.read_u8()? {
            0 => Self::BookingCompleted,
            1 => Self::ReviewVerified,
            2 => Self::ReferralCompleted,
            3 => Self::Redemption,
            4 => Self::ManualAdjustment,
            _ => return Err(ReaderError::InvalidValue),
        })
    }

    fn write(&self, writer: &mut Writer) {
        writer.write_u8(self.id());
    }

    fn size(&self) -> usize {
        1
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, AsRefStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum EntryStatus {
    Pending,
    Confirmed,
    Reversed,
}

impl EntryStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }

    // Only pending -> confirmed and pending -> reversed exist
    pub fn can_transition_to(&self, to: EntryStatus) -> bool {
        matches!(
            (self, to),
            (Self::Pending, Self::Confirmed) | (Self::Pending, Self::Reversed)
        )
    }
}

impl Display for EntryStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), Error> {
        f.write_str(self.as_ref())
    }
}

impl Serializer for EntryStatus {
    fn read(reader: &mut Reader) -> Result<Self, ReaderError> {
        Ok(match reader.read_u8()? {
            0 => Self::Pending,
            1 => Self::Confirmed,
            2 => Self::Reversed,
            _ => return Err(ReaderError::InvalidValue),
        })
    }

    fn write(&self, writer: &mut Writer) {
        writer.write_u8(match self {
            Self::Pending => 0,
            Self::Confirmed => 1,
            Self::Reversed => 2,
        });
    }

    fn size(&self) -> usize {
        1
    }
}

/// Optional references to the source of an entry
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRefs {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub booking: Option<BookingId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub review: Option<ReviewId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub referred_account: Option<AccountId>,
}

impl SourceRefs {
    pub fn booking(booking: BookingId) -> Self {
        Self {
            booking: Some(booking),
            ..Default::default()
        }
    }

    pub fn with_review(mut self, review: ReviewId) -> Self {
        self.review = Some(review);
        self
    }

    pub fn with_referred_account(mut self, account: AccountId) -> Self {
        self.referred_account = Some(account);
        self
    }
}

impl Serializer for SourceRefs {
    fn read(reader: &mut Reader) -> Result<Self, ReaderError> {
        Ok(Self {
            booking: Option::read(reader)?,
            review: Option::read(reader)?,
            referred_account: Option::read(reader)?,
        })
    }

    fn write(&self, writer: &mut Writer) {
        self.booking.write(writer);
        self.review.write(writer);
        self.referred_account.write(writer);
    }
}

/// A point-affecting event recorded in the ledger
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: EntryId,
    pub account: AccountId,
    /// Positive = credit, negative = debit
    pub delta: i64,
    pub reason: ReasonCode,
    pub status: EntryStatus,
    #[serde(default)]
    pub refs: SourceRefs,
    pub key: IdempotencyKey,
    /// Operator note, set on manual adjustments
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    pub created_at: TimestampMillis,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settled_at: Option<TimestampMillis>,
}

impl LedgerEntry {
    pub fn is_pending(&self) -> bool {
        self.status == EntryStatus::Pending
    }

    pub fn is_credit(&self) -> bool {
        self.delta > 0
    }

    // Absolute number of points moved by this entry
    pub fn points(&self) -> u64 {
        self.delta.unsigned_abs()
    }

    // Resolve a pending entry, any other transition is refused
    pub fn transition(&mut self, to: EntryStatus, now: TimestampMillis) -> Result<(), EntryError> {
        if !self.status.can_transition_to(to) {
            return Err(EntryError::InvalidTransition {
                from: self.status,
                to,
            });
        }
        self.status = to;
        self.settled_at = Some(now);
        Ok(())
    }

    // Earliest time settlement may resolve this entry
    pub fn settle_after(&self, hold_period: TimestampMillis) -> TimestampMillis {
        self.created_at.saturating_add(hold_period)
    }
}

impl Serializer for LedgerEntry {
    fn read(reader: &mut Reader) -> Result<Self, ReaderError> {
        let id = EntryId::read(reader)?;
        let account = AccountId::read(reader)?;
        let delta = reader.read_i64()?;
        let reason = ReasonCode::read(reader)?;
        let status = EntryStatus::read(reader)?;
        let refs = SourceRefs::read(reader)?;
        let key = IdempotencyKey::read(reader)?;
        let note = Option::<String>::read(reader)?;
        let created_at = reader.read_u64()?;
        let settled_at = Option::<u64>::read(reader)?;

        Ok(Self {
            id,
            account,
            delta,
            reason,
            status,
            refs,
            key,
            note,
            created_at,
            settled_at,
        })
    }

    fn write(&self, writer: &mut Writer) {
        self.id.write(writer);
        self.account.write(writer);
        writer.write_i64(self.delta);
        self.reason.write(writer);
        self.status.write(writer);
        self.refs.write(writer);
        self.key.write(writer);
        self.note.write(writer);
        writer.write_u64(self.created_at);
        self.settled_at.write(writer);
    }
}
