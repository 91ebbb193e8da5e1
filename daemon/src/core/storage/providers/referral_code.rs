use async_trait::async_trait;
use loyalty_common::{ids::AccountId, referral::ReferralCode};

use crate::core::error::LoyaltyError;

#[async_trait]
pub trait ReferralCodeProvider {
    async fn get_referral_code(&self, code: &str) -> Result<Option<ReferralCode>, LoyaltyError>;

    async fn has_referral_code(&self, code: &str) -> Result<bool, LoyaltyError>;

    async fn set_referral_code(&mut self, code: &ReferralCode) -> Result<(), LoyaltyError>;

    // Code currently active for the account
    async fn get_active_code(&self, owner: AccountId) -> Result<Option<String>, LoyaltyError>;

    async fn set_active_code(&mut self, owner: AccountId, code: &str)
        -> Result<(), LoyaltyError>;
}
