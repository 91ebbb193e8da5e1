use async_trait::async_trait;
use loyalty_common::{account::Account, crypto::Hash, ids::AccountId};

use crate::core::error::LoyaltyError;

#[async_trait]
pub trait AccountProvider {
    async fn has_account(&self, id: AccountId) -> Result<bool, LoyaltyError>;

    async fn get_account(&self, id: AccountId) -> Result<Option<Account>, LoyaltyError>;

    // Store the account record, indexes are maintained separately
    async fn set_account(&mut self, account: &Account) -> Result<(), LoyaltyError>;

    // Owner of a normalized email address
    async fn get_account_by_email(&self, email: &Hash) -> Result<Option<AccountId>, LoyaltyError>;

    async fn set_email_owner(&mut self, email: &Hash, id: AccountId) -> Result<(), LoyaltyError>;

    // Owner of a normalized mobile number
    async fn get_account_by_mobile(&self, mobile: &Hash)
        -> Result<Option<AccountId>, LoyaltyError>;

    async fn set_mobile_owner(&mut self, mobile: &Hash, id: AccountId)
        -> Result<(), LoyaltyError>;

    async fn remove_mobile_owner(&mut self, mobile: &Hash) -> Result<(), LoyaltyError>;
}
