// Referral codes handed out by referrers

use rand::Rng;
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display};

use super::{ReferralError, ReferralResult};
use crate::{
    config::{REFERRAL_CODE_ALPHABET, REFERRAL_CODE_LENGTH},
    ids::AccountId,
    serializer::{Reader, ReaderError, Serializer, Writer},
    time::TimestampMillis,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, AsRefStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ReferralCodeStatus {
    Active,
    /// Consumed by a signup
    Used,
    /// Replaced before it was ever used
    Superseded,
}

impl Serializer for ReferralCodeStatus {
    fn read(reader: &mut Reader) -> Result<Self, ReaderError> {
        Ok(match reader.read_u8()? {
            0 => Self::Active,
            1 => Self::Used,
            2 => Self::Superseded,
            _ => return Err(ReaderError::InvalidValue),
        })
    }

    fn write(&self, writer: &mut Writer) {
        writer.write_u8(match self {
            Self::Active => 0,
            Self::Used => 1,
            Self::Superseded => 2,
        });
    }

    fn size(&self) -> usize {
        1
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferralCode {
    pub code: String,
    pub owner: AccountId,
    pub status: ReferralCodeStatus,
    pub created_at: TimestampMillis,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub used_at: Option<TimestampMillis>,
    /// Account that signed up with this code
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub used_by: Option<AccountId>,
}

impl ReferralCode {
    pub fn new(code: String, owner: AccountId, created_at: TimestampMillis) -> Self {
        Self {
            code,
            owner,
            status: ReferralCodeStatus::Active,
            created_at,
            used_at: None,
            used_by: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == ReferralCodeStatus::Active
    }

    // active -> used, exactly once
    pub fn mark_used(&mut self, by: AccountId, now: TimestampMillis) -> ReferralResult<()> {
        if !self.is_active() {
            return Err(ReferralError::CodeNotActive(self.code.clone()));
        }
        self.status = ReferralCodeStatus::Used;
        self.used_at = Some(now);
        self.used_by = Some(by);
        Ok(())
    }

    pub fn supersede(&mut self) -> ReferralResult<()> {
        if !self.is_active() {
            return Err(ReferralError::CodeNotActive(self.code.clone()));
        }
        self.status = ReferralCodeStatus::Superseded;
        Ok(())
    }
}

impl Serializer for ReferralCode {
    fn read(reader: &mut Reader) -> Result<Self, ReaderError> {
        Ok(Self {
            code: String::read(reader)?,
            owner: AccountId::read(reader)?,
            status: ReferralCodeStatus::read(reader)?,
            created_at: reader.read_u64()?,
            used_at: Option::read(reader)?,
            used_by: Option::read(reader)?,
        })
    }

    fn write(&self, writer: &mut Writer) {
        self.code.write(writer);
        self.owner.write(writer);
        self.status.write(writer);
        writer.write_u64(self.created_at);
        self.used_at.write(writer);
        self.used_by.write(writer);
    }
}

// Upper-case the input and drop separators users tend to type
pub fn normalize_code(input: &str) -> ReferralResult<String> {
    let code: String = input
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '-')
        .map(|c| c.to_ascii_uppercase())
        .collect();

    let valid = code.len() == REFERRAL_CODE_LENGTH
        && code.bytes().all(|b| REFERRAL_CODE_ALPHABET.contains(&b));
    if !valid {
        return Err(ReferralError::MalformedCode(input.to_owned()));
    }

    Ok(code)
}

pub fn generate_code<R: Rng + ?Sized>(rng: &mut R) -> String {
    (0..REFERRAL_CODE_LENGTH)
        .map(|_| REFERRAL_CODE_ALPHABET[rng.gen_range(0..REFERRAL_CODE_ALPHABET.len())] as char)
        .collect()
}
