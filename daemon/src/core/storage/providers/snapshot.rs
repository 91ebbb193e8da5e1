use async_trait::async_trait;

use crate::core::error::LoyaltyError;

#[async_trait]
pub trait SnapshotProvider {
    // Start a snapshot, every write until `end_snapshot` is buffered
    async fn start_snapshot(&mut self) -> Result<(), LoyaltyError>;

    // Commit the buffered writes atomically, or drop them
    async fn end_snapshot(&mut self, apply: bool) -> Result<(), LoyaltyError>;
}
