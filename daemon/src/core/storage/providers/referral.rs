// Referral attribution storage provider trait

use async_trait::async_trait;
use loyalty_common::{
    crypto::Hash,
    ids::AccountId,
    referral::ReferralRecord,
    serializer::{Reader, ReaderError, Serializer, Writer},
};

use crate::core::error::LoyaltyError;

/// Index key of the referrals made by a referrer
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ReferrerKey {
    pub referrer: AccountId,
    pub referee: AccountId,
}

impl Serializer for ReferrerKey {
    fn write(&self, writer: &mut Writer) {
        self.referrer.write(writer);
        self.referee.write(writer);
    }

    fn read(reader: &mut Reader) -> Result<Self, ReaderError> {
        Ok(Self {
            referrer: AccountId::read(reader)?,
            referee: AccountId::read(reader)?,
        })
    }

    fn size(&self) -> usize {
        16
    }
}

#[async_trait]
pub trait ReferralProvider {
    // Referral record of a referee, at most one exists
    async fn get_referral(&self, referee: AccountId)
        -> Result<Option<ReferralRecord>, LoyaltyError>;

    async fn has_referral(&self, referee: AccountId) -> Result<bool, LoyaltyError>;

    // Store the record and keep the per referrer index in sync
    async fn set_referral(&mut self, record: &ReferralRecord) -> Result<(), LoyaltyError>;

    async fn list_referees(
        &self,
        referrer: AccountId,
        skip: usize,
        limit: usize,
    ) -> Result<Vec<AccountId>, LoyaltyError>;

    // Every account that referred at least one other account
    async fn list_referrers(&self) -> Result<Vec<AccountId>, LoyaltyError>;

    // Referee whose signup used this device
    async fn get_device_referee(&self, device: &Hash) -> Result<Option<AccountId>, LoyaltyError>;

    async fn set_device_referee(
        &mut self,
        device: &Hash,
        referee: AccountId,
    ) -> Result<(), LoyaltyError>;

    // First referrer this payment method was attributed to
    async fn get_payment_method_referrer(
        &self,
        payment_method: &Hash,
    ) -> Result<Option<AccountId>, LoyaltyError>;

    async fn set_payment_method_referrer(
        &mut self,
        payment_method: &Hash,
        referrer: AccountId,
    ) -> Result<(), LoyaltyError>;
}
