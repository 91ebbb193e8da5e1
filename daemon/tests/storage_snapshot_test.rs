//! RocksStorage snapshot behavior
//!
//! - buffered writes are invisible on disk until committed
//! - a discarded snapshot leaves no trace
//! - scans merge buffered writes with committed data

#![allow(clippy::disallowed_methods)]

mod common;

use common::*;
use loyalty_common::{
    account::Account,
    ids::{AccountId, EntryId},
    ledger::{Balance, EntryStatus, IdempotencyKey, LedgerEntry, ReasonCode, SourceRefs},
};
use loyalty_daemon::core::{
    error::LoyaltyError,
    storage::{AccountProvider, LedgerProvider, SnapshotProvider},
};
use tempdir::TempDir;

fn entry(id: u64, account: u64, created_at: u64) -> LedgerEntry {
    LedgerEntry {
        id: EntryId::new(id),
        account: AccountId::new(account),
        delta: 10,
        reason: ReasonCode::ReviewVerified,
        status: EntryStatus::Pending,
        refs: SourceRefs::default(),
        key: IdempotencyKey::manual_adjustment(&format!("test-{}", id)),
        note: None,
        created_at,
        settled_at: None,
    }
}

#[tokio::test]
async fn test_discarded_snapshot_leaves_no_trace() {
    let dir = TempDir::new("loyalty-storage").unwrap();
    let mut storage = create_test_storage(&dir);

    storage.start_snapshot().await.unwrap();
    assert!(matches!(
        storage.start_snapshot().await,
        Err(LoyaltyError::SnapshotAlreadyStarted)
    ));

    let account = Account::new(AccountId::new(1), "alice@example.com", T0);
    storage.set_account(&account).await.unwrap();
    storage.set_balance(account.id, &Balance::new(10, 5)).await.unwrap();
    assert!(storage.has_account(account.id).await.unwrap());

    storage.end_snapshot(false).await.unwrap();
    assert!(!storage.has_account(account.id).await.unwrap());
    assert_eq!(storage.get_balance(account.id).await.unwrap(), Balance::default());

    assert!(matches!(
        storage.end_snapshot(true).await,
        Err(LoyaltyError::SnapshotNotStarted)
    ));
}

#[tokio::test]
async fn test_committed_snapshot_survives_reopen() {
    let dir = TempDir::new("loyalty-storage").unwrap();
    {
        let mut storage = create_test_storage(&dir);
        storage.start_snapshot().await.unwrap();
        let first = storage.next_entry_id().await.unwrap();
        let second = storage.next_entry_id().await.unwrap();
        assert_eq!(first, EntryId::new(1));
        assert_eq!(second, EntryId::new(2));

        storage.set_entry(&entry(2, 1, T0)).await.unwrap();
        storage.end_snapshot(true).await.unwrap();
    }

    let mut storage = create_test_storage(&dir);
    assert!(storage.get_entry(EntryId::new(2)).await.unwrap().is_some());
    assert_eq!(storage.next_entry_id().await.unwrap(), EntryId::new(3));
}

#[tokio::test]
async fn test_scans_merge_buffered_writes() {
    let dir = TempDir::new("loyalty-storage").unwrap();
    let mut storage = create_test_storage(&dir);

    let committed = entry(1, 7, T0);
    storage.index_account_entry(&committed).await.unwrap();
    storage.add_pending_entry(&committed).await.unwrap();

    storage.start_snapshot().await.unwrap();
    let buffered = entry(2, 7, T0 + 10);
    storage.index_account_entry(&buffered).await.unwrap();
    storage.add_pending_entry(&buffered).await.unwrap();
    storage.remove_pending_entry(&committed).await.unwrap();
    // other accounts never leak into the prefix
    storage.index_account_entry(&entry(3, 8, T0)).await.unwrap();

    let ids = storage.list_account_entries(AccountId::new(7), 0, 10).await.unwrap();
    assert_eq!(ids, vec![EntryId::new(2), EntryId::new(1)]);

    let pending = storage.list_pending_entries(None, T0 + 10, 10).await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].0.entry, EntryId::new(2));

    storage.end_snapshot(false).await.unwrap();
    let pending = storage.list_pending_entries(None, T0 + 10, 10).await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].0.entry, EntryId::new(1));
}

#[tokio::test]
async fn test_pending_cursor_and_cutoff() {
    let dir = TempDir::new("loyalty-storage").unwrap();
    let mut storage = create_test_storage(&dir);
    for i in 1..=5 {
        storage.add_pending_entry(&entry(i, 1, T0 + i)).await.unwrap();
    }

    let first = storage.list_pending_entries(None, T0 + 4, 2).await.unwrap();
    assert_eq!(first.len(), 2);
    let rest = storage
        .list_pending_entries(Some(&first[1].0), T0 + 4, 10)
        .await
        .unwrap();
    let ids: Vec<_> = rest.iter().map(|(key, _)| key.entry).collect();
    assert_eq!(ids, vec![EntryId::new(3), EntryId::new(4)]);
}
