use async_trait::async_trait;
use log::{debug, trace};

use crate::core::{
    error::LoyaltyError,
    storage::{rocksdb::Snapshot, RocksStorage, SnapshotProvider},
};

#[async_trait]
impl SnapshotProvider for RocksStorage {
    async fn start_snapshot(&mut self) -> Result<(), LoyaltyError> {
        trace!("starting snapshot");
        if self.snapshot.is_some() {
            return Err(LoyaltyError::SnapshotAlreadyStarted);
        }

        self.snapshot = Some(Snapshot::new());
        Ok(())
    }

    async fn end_snapshot(&mut self, apply: bool) -> Result<(), LoyaltyError> {
        trace!("end snapshot");
        let snapshot = self
            .snapshot
            .take()
            .ok_or(LoyaltyError::SnapshotNotStarted)?;

        if apply {
            trace!("applying snapshot");
            self.write_snapshot(snapshot)?;
        } else {
            debug!("Discarding {} buffered writes", snapshot.len());
        }

        Ok(())
    }
}
