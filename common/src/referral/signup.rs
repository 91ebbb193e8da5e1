use serde::{Deserialize, Serialize};

use crate::{
    account::Account,
    crypto::{hash_normalized, Hash},
    time::TimestampMillis,
};

/// Payload sent by the signup subsystem for every new account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignupEvent {
    pub account: Account,
    /// Code typed in the signup form
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub referral_code: Option<String>,
    /// Code captured from an earlier referral link
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub click_through_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_fingerprint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_method_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
    pub signed_up_at: TimestampMillis,
}

impl SignupEvent {
    // Explicit code wins over the click-through one
    pub fn resolved_code(&self) -> Option<&str> {
        self.referral_code
            .as_deref()
            .filter(|c| !c.trim().is_empty())
            .or_else(|| {
                self.click_through_code
                    .as_deref()
                    .filter(|c| !c.trim().is_empty())
            })
    }

    pub fn device_key(&self) -> Option<Hash> {
        non_empty(self.device_fingerprint.as_deref()).map(hash_normalized)
    }

    pub fn payment_method_key(&self) -> Option<Hash> {
        non_empty(self.payment_method_hash.as_deref()).map(hash_normalized)
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
