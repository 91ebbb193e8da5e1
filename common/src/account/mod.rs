// Loyalty account of a marketplace user
//
// One account per user, created at registration. The balance itself lives
// in the ledger store; this record only carries the identity data needed by
// redemption and referral checks.

use serde::{Deserialize, Serialize};

use crate::{
    crypto::{hash_normalized, Hash},
    ids::AccountId,
    serializer::{Reader, ReaderError, Serializer, Writer},
    time::TimestampMillis,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    pub email: String,
    /// Mobile number, verified or not
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mobile: Option<String>,
    /// Set once the mobile number has been confirmed (required to redeem)
    #[serde(default)]
    pub mobile_verified: bool,
    /// Identity verification performed by the onboarding flow
    #[serde(default)]
    pub identity_verified: bool,
    /// Accounts are never deleted, only deactivated
    #[serde(default = "default_active")]
    pub active: bool,
    pub created_at: TimestampMillis,
}

fn default_active() -> bool {
    true
}

impl Account {
    pub fn new(id: AccountId, email: impl Into<String>, created_at: TimestampMillis) -> Self {
        Self {
            id,
            email: email.into(),
            mobile: None,
            mobile_verified: false,
            identity_verified: false,
            active: true,
            created_at,
        }
    }

    pub fn with_mobile(mut self, mobile: impl Into<String>, verified: bool) -> Self {
        self.mobile = Some(mobile.into());
        self.mobile_verified = verified;
        self
    }

    // Verified mobile number, if any
    pub fn verified_mobile(&self) -> Option<&str> {
        if self.mobile_verified {
            self.mobile.as_deref()
        } else {
            None
        }
    }

    pub fn can_redeem(&self) -> bool {
        self.verified_mobile().is_some()
    }

    pub fn email_key(&self) -> Hash {
        hash_normalized(&self.email)
    }

    pub fn mobile_key(&self) -> Option<Hash> {
        self.mobile.as_deref().map(mobile_key)
    }
}

// Index key for a mobile number, whitespace and separators are ignored
pub fn mobile_key(mobile: &str) -> Hash {
    let digits: String = mobile
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '+')
        .collect();
    hash_normalized(&digits)
}

impl Serializer for Account {
    fn read(reader: &mut Reader) -> Result<Self, ReaderError> {
        let id = AccountId::read(reader)?;
        let email = String::read(reader)?;
        let mobile = Option::<String>::read(reader)?;
        let mobile_verified = reader.read_bool()?;
        let identity_verified = reader.read_bool()?;
        let active = reader.read_bool()?;
        let created_at = reader.read_u64()?;

        Ok(Self {
            id,
            email,
            mobile,
            mobile_verified,
            identity_verified,
            active,
            created_at,
        })
    }

    fn write(&self, writer: &mut Writer) {
        self.id.write(writer);
        self.email.write(writer);
        self.mobile.write(writer);
        writer.write_bool(self.mobile_verified);
        writer.write_bool(self.identity_verified);
        writer.write_bool(self.active);
        writer.write_u64(self.created_at);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unverified_mobile_cannot_redeem() {
        let account = Account::new(AccountId::new(1), "a@example.com", 0).with_mobile("07700 900123", false);
        assert!(!account.can_redeem());
        assert_eq!(account.verified_mobile(), None);

        let account = account.with_mobile("07700 900123", true);
        assert!(account.can_redeem());
    }

    #[test]
    fn test_mobile_key_ignores_formatting() {
        assert_eq!(mobile_key("07700 900-123"), mobile_key("07700900123"));
    }

    #[test]
    fn test_storage_encoding() {
        let account = Account::new(AccountId::new(7), "b@example.com", 1_000).with_mobile("+447700900123", true);
        let decoded = Account::from_bytes(&account.to_bytes()).unwrap();
        assert_eq!(decoded, account);
    }
}
