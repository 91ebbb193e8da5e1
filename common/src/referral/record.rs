// Referral record data structures

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display};

use super::{ReferralError, ReferralResult};
use crate::{
    crypto::Hash,
    ids::{AccountId, BookingId},
    serializer::{Reader, ReaderError, Serializer, Writer},
    time::TimestampMillis,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, AsRefStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ReferralStatus {
    SignedUp,
    /// Referee's first booking settled as confirmed
    Completed,
}

impl Serializer for ReferralStatus {
    fn read(reader: &mut Reader) -> Result<Self, ReaderError> {
        Ok(match reader.read_u8()? {
            0 => Self::SignedUp,
            1 => Self::Completed,
            _ => return Err(ReaderError::InvalidValue),
        })
    }

    fn write(&self, writer: &mut Writer) {
        writer.write_u8(match self {
            Self::SignedUp => 0,
            Self::Completed => 1,
        });
    }

    fn size(&self) -> usize {
        1
    }
}

/// A referral relationship, one per referee
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReferralRecord {
    pub referrer: AccountId,
    pub referee: AccountId,

    /// Code the referee signed up with
    pub code: String,

    /// Hashed device fingerprint of the signup
    pub device: Option<Hash>,

    /// Hashed payment method of the signup
    pub payment_method: Option<Hash>,

    /// Client IP at signup, kept for manual review
    pub ip: Option<String>,

    /// Hashed mobile number of the referee, if any
    pub referee_mobile: Option<Hash>,

    pub status: ReferralStatus,
    pub signed_up_at: TimestampMillis,
    pub completed_at: Option<TimestampMillis>,

    /// Booking whose settlement completed the referral
    pub completed_by: Option<BookingId>,
}

impl ReferralRecord {
    pub fn is_completed(&self) -> bool {
        self.status == ReferralStatus::Completed
    }

    pub fn complete(&mut self, booking: BookingId, now: TimestampMillis) -> ReferralResult<()> {
        if self.is_completed() {
            return Err(ReferralError::InvalidTransition {
                from: "completed",
                to: "completed",
            });
        }

        self.status = ReferralStatus::Completed;
        self.completed_at = Some(now);
        self.completed_by = Some(booking);
        Ok(())
    }
}

impl Serializer for ReferralRecord {
    fn read(reader: &mut Reader) -> Result<Self, ReaderError> {
        let referrer = AccountId::read(reader)?;
        let referee = AccountId::read(reader)?;
        let code = String::read(reader)?;
        let device = Option::<Hash>::read(reader)?;
        let payment_method = Option::<Hash>::read(reader)?;
        let ip = Option::<String>::read(reader)?;
        let referee_mobile = Option::<Hash>::read(reader)?;
        let status = ReferralStatus::read(reader)?;
        let signed_up_at = reader.read_u64()?;
        let completed_at = Option::<u64>::read(reader)?;
        let completed_by = Option::<BookingId>::read(reader)?;

        Ok(Self {
            referrer,
            referee,
            code,
            device,
            payment_method,
            ip,
            referee_mobile,
            status,
            signed_up_at,
            completed_at,
            completed_by,
        })
    }

    fn write(&self, writer: &mut Writer) {
        self.referrer.write(writer);
        self.referee.write(writer);
        self.code.write(writer);
        self.device.write(writer);
        self.payment_method.write(writer);
        self.ip.write(writer);
        self.referee_mobile.write(writer);
        self.status.write(writer);
        writer.write_u64(self.signed_up_at);
        self.completed_at.write(writer);
        self.completed_by.write(writer);
    }
}
