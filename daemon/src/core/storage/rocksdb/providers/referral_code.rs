use async_trait::async_trait;
use log::trace;
use loyalty_common::{ids::AccountId, referral::ReferralCode};

use crate::core::{
    error::LoyaltyError,
    storage::{
        rocksdb::{Column, RocksStorage},
        ReferralCodeProvider,
    },
};

#[async_trait]
impl ReferralCodeProvider for RocksStorage {
    async fn get_referral_code(&self, code: &str) -> Result<Option<ReferralCode>, LoyaltyError> {
        self.load_optional_from_disk(Column::ReferralCodes, code.as_bytes())
    }

    async fn has_referral_code(&self, code: &str) -> Result<bool, LoyaltyError> {
        self.contains_data(Column::ReferralCodes, &code.as_bytes())
    }

    async fn set_referral_code(&mut self, code: &ReferralCode) -> Result<(), LoyaltyError> {
        if log::log_enabled!(log::Level::Trace) {
            trace!(
                "set referral code {} of {} to {}",
                code.code,
                code.owner,
                code.status
            );
        }
        self.insert_into_disk(Column::ReferralCodes, code.code.as_bytes(), code)
    }

    async fn get_active_code(&self, owner: AccountId) -> Result<Option<String>, LoyaltyError> {
        self.load_optional_from_disk(Column::ActiveReferralCodes, &owner.to_be_bytes())
    }

    async fn set_active_code(
        &mut self,
        owner: AccountId,
        code: &str,
    ) -> Result<(), LoyaltyError> {
        self.insert_into_disk(
            Column::ActiveReferralCodes,
            owner.to_be_bytes(),
            &code.to_owned(),
        )
    }
}
