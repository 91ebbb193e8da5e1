mod providers;

pub mod rocksdb;
pub mod snapshot;

pub use self::{providers::*, rocksdb::RocksStorage};

use async_trait::async_trait;
use log::warn;

use crate::core::error::LoyaltyError;

#[async_trait]
pub trait Storage:
    AccountProvider
    + LedgerProvider
    + ReferralProvider
    + ReferralCodeProvider
    + SnapshotProvider
    + Sync
    + Send
    + 'static
{
    // Flush memtables to disk
    async fn flush(&mut self) -> Result<(), LoyaltyError>;

    // Stop the storage and wait for it to finish
    async fn stop(&mut self) -> Result<(), LoyaltyError>;
}

// Close the snapshot opened for `result`: committed on success, dropped otherwise.
// A failed rollback is logged so the original error is the one returned.
pub async fn finish_snapshot<S: Storage + ?Sized, T>(
    storage: &mut S,
    result: Result<T, LoyaltyError>,
) -> Result<T, LoyaltyError> {
    match result {
        Ok(value) => {
            storage.end_snapshot(true).await?;
            Ok(value)
        }
        Err(e) => {
            if let Err(err) = storage.end_snapshot(false).await {
                warn!("Error while discarding snapshot: {}", err);
            }
            Err(e)
        }
    }
}
