// ReferralProvider implementation for RocksDB storage

use async_trait::async_trait;
use log::trace;
use loyalty_common::{
    crypto::Hash, ids::AccountId, referral::ReferralRecord, serializer::Serializer,
};

use crate::core::{
    error::LoyaltyError,
    storage::{
        rocksdb::{Column, RocksStorage},
        snapshot::Direction,
        ReferralProvider, ReferrerKey,
    },
};

#[async_trait]
impl ReferralProvider for RocksStorage {
    async fn get_referral(
        &self,
        referee: AccountId,
    ) -> Result<Option<ReferralRecord>, LoyaltyError> {
        if log::log_enabled!(log::Level::Trace) {
            trace!("get referral of {}", referee);
        }
        self.load_optional_from_disk(Column::Referrals, &referee.to_be_bytes())
    }

    async fn has_referral(&self, referee: AccountId) -> Result<bool, LoyaltyError> {
        self.contains_data(Column::Referrals, &referee.to_be_bytes())
    }

    async fn set_referral(&mut self, record: &ReferralRecord) -> Result<(), LoyaltyError> {
        if log::log_enabled!(log::Level::Trace) {
            trace!(
                "set referral {} -> {} ({})",
                record.referrer,
                record.referee,
                record.status
            );
        }

        self.insert_into_disk(Column::Referrals, record.referee.to_be_bytes(), record)?;
        let key = ReferrerKey {
            referrer: record.referrer,
            referee: record.referee,
        };
        self.insert_into_disk(Column::ReferralsByReferrer, key.to_bytes(), &())
    }

    async fn list_referees(
        &self,
        referrer: AccountId,
        skip: usize,
        limit: usize,
    ) -> Result<Vec<AccountId>, LoyaltyError> {
        let keys = self.scan::<ReferrerKey, ()>(
            Column::ReferralsByReferrer,
            &referrer.to_be_bytes(),
            None,
            Direction::Forward,
            skip.saturating_add(limit),
        )?;

        Ok(keys
            .into_iter()
            .skip(skip)
            .map(|(key, _)| key.referee)
            .collect())
    }

    async fn list_referrers(&self) -> Result<Vec<AccountId>, LoyaltyError> {
        let mut referrers = Vec::new();
        let mut from: Option<Vec<u8>> = None;
        loop {
            // one key per referrer: jump past the last referrer seen
            let next = self.scan::<ReferrerKey, ()>(
                Column::ReferralsByReferrer,
                &[],
                from.as_deref(),
                Direction::Forward,
                1,
            )?;

            let Some((key, _)) = next.into_iter().next() else {
                break;
            };

            referrers.push(key.referrer);
            match key.referrer.value().checked_add(1) {
                Some(next) => from = Some(next.to_be_bytes().to_vec()),
                None => break,
            }
        }

        Ok(referrers)
    }

    async fn get_device_referee(&self, device: &Hash) -> Result<Option<AccountId>, LoyaltyError> {
        self.load_optional_from_disk(Column::ReferralDevices, device.as_bytes())
    }

    async fn set_device_referee(
        &mut self,
        device: &Hash,
        referee: AccountId,
    ) -> Result<(), LoyaltyError> {
        self.insert_into_disk(Column::ReferralDevices, device.as_bytes(), &referee)
    }

    async fn get_payment_method_referrer(
        &self,
        payment_method: &Hash,
    ) -> Result<Option<AccountId>, LoyaltyError> {
        self.load_optional_from_disk(Column::ReferralPaymentMethods, payment_method.as_bytes())
    }

    async fn set_payment_method_referrer(
        &mut self,
        payment_method: &Hash,
        referrer: AccountId,
    ) -> Result<(), LoyaltyError> {
        self.insert_into_disk(
            Column::ReferralPaymentMethods,
            payment_method.as_bytes(),
            &referrer,
        )
    }
}
