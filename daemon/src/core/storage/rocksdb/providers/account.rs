use async_trait::async_trait;
use log::trace;
use loyalty_common::{account::Account, crypto::Hash, ids::AccountId};

use crate::core::{
    error::LoyaltyError,
    storage::{
        rocksdb::{Column, RocksStorage},
        AccountProvider,
    },
};

#[async_trait]
impl AccountProvider for RocksStorage {
    async fn has_account(&self, id: AccountId) -> Result<bool, LoyaltyError> {
        self.contains_data(Column::Accounts, &id.to_be_bytes())
    }

    async fn get_account(&self, id: AccountId) -> Result<Option<Account>, LoyaltyError> {
        if log::log_enabled!(log::Level::Trace) {
            trace!("get account {}", id);
        }
        self.load_optional_from_disk(Column::Accounts, &id.to_be_bytes())
    }

    async fn set_account(&mut self, account: &Account) -> Result<(), LoyaltyError> {
        if log::log_enabled!(log::Level::Trace) {
            trace!("set account {}", account.id);
        }
        self.insert_into_disk(Column::Accounts, account.id.to_be_bytes(), account)
    }

    async fn get_account_by_email(&self, email: &Hash) -> Result<Option<AccountId>, LoyaltyError> {
        self.load_optional_from_disk(Column::AccountsByEmail, email.as_bytes())
    }

    async fn set_email_owner(&mut self, email: &Hash, id: AccountId) -> Result<(), LoyaltyError> {
        if log::log_enabled!(log::Level::Trace) {
            trace!("index email {} for account {}", email, id);
        }
        self.insert_into_disk(Column::AccountsByEmail, email.as_bytes(), &id)
    }

    async fn get_account_by_mobile(
        &self,
        mobile: &Hash,
    ) -> Result<Option<AccountId>, LoyaltyError> {
        self.load_optional_from_disk(Column::AccountsByMobile, mobile.as_bytes())
    }

    async fn set_mobile_owner(
        &mut self,
        mobile: &Hash,
        id: AccountId,
    ) -> Result<(), LoyaltyError> {
        if log::log_enabled!(log::Level::Trace) {
            trace!("index mobile {} for account {}", mobile, id);
        }
        self.insert_into_disk(Column::AccountsByMobile, mobile.as_bytes(), &id)
    }

    async fn remove_mobile_owner(&mut self, mobile: &Hash) -> Result<(), LoyaltyError> {
        if log::log_enabled!(log::Level::Trace) {
            trace!("drop mobile index {}", mobile);
        }
        self.remove_from_disk(Column::AccountsByMobile, mobile.as_bytes())
    }
}
