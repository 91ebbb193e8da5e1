// Shared helpers for the loyalty integration tests
//
// Every test opens its own RocksDB instance in a temporary directory.

#![allow(dead_code)]

use std::sync::Arc;

use loyalty_common::{
    account::Account,
    booking::{BookingSnapshot, BookingStatus},
    config::LoyaltyPolicy,
    event::{BookingCompleted, RedemptionRequest},
    ids::{AccountId, BookingId},
    notification::Notification,
    time::{TimestampMillis, MILLIS_PER_DAY, MILLIS_PER_HOUR},
};
use loyalty_daemon::core::{
    config::RocksDBConfig,
    notify::ChannelNotifier,
    service::LoyaltyService,
    settlement::MemoryBookingSource,
    storage::rocksdb::{CacheMode, CompressionMode, RocksStorage},
};
use tempdir::TempDir;
use tokio::sync::mpsc;

pub const HOUR: TimestampMillis = MILLIS_PER_HOUR;
pub const DAY: TimestampMillis = MILLIS_PER_DAY;

// Arbitrary starting point, far enough from zero for window arithmetic
pub const T0: TimestampMillis = 1_700_000_000_000;

/// Create a RocksDBConfig with test defaults
pub fn test_rocksdb_config() -> RocksDBConfig {
    RocksDBConfig {
        parallelism: 2,
        max_background_jobs: 2,
        max_subcompaction_jobs: 1,
        low_priority_background_threads: 1,
        max_open_files: 100,
        keep_max_log_files: 1,
        compression_mode: CompressionMode::None,
        cache_mode: CacheMode::None,
        cache_size: 1024 * 1024,
        write_buffer_size: 1024 * 1024,
        write_buffer_shared: false,
    }
}

pub fn create_test_storage(temp_dir: &TempDir) -> RocksStorage {
    RocksStorage::new(temp_dir.path().to_str().unwrap(), &test_rocksdb_config()).unwrap()
}

pub struct TestContext {
    pub service: Arc<LoyaltyService<RocksStorage>>,
    pub bookings: Arc<MemoryBookingSource>,
    pub notifications: mpsc::Receiver<Notification>,
    // dropped last, the database lives inside
    _dir: TempDir,
}

impl TestContext {
    pub fn new() -> Self {
        Self::with_policy(LoyaltyPolicy::default())
    }

    pub fn with_policy(policy: LoyaltyPolicy) -> Self {
        let _ = env_logger::builder().is_test(true).try_init();

        let dir = TempDir::new("loyalty-test").unwrap();
        let storage = create_test_storage(&dir);
        let bookings = Arc::new(MemoryBookingSource::new());
        let (notifier, notifications) = ChannelNotifier::new(1024);
        let service =
            LoyaltyService::new(storage, policy, bookings.clone(), Arc::new(notifier)).unwrap();

        Self {
            service: Arc::new(service),
            bookings,
            notifications,
            _dir: dir,
        }
    }

    // Everything notified so far
    pub fn drain_notifications(&mut self) -> Vec<Notification> {
        let mut out = Vec::new();
        while let Ok(notification) = self.notifications.try_recv() {
            out.push(notification);
        }
        out
    }

    pub async fn register(&self, id: u64, email: &str) -> Account {
        let account = Account::new(AccountId::new(id), email, T0);
        self.service.register_account(account).await.unwrap()
    }

    // Registered account with a verified mobile, allowed to redeem
    pub async fn register_verified(&self, id: u64, email: &str, mobile: &str) -> Account {
        self.register(id, email).await;
        self.service
            .verify_mobile(AccountId::new(id), mobile)
            .await
            .unwrap()
    }

    // Confirmed points granted through a manual adjustment
    pub async fn fund(&self, id: u64, points: i64) {
        self.service
            .adjust_balance(
                AccountId::new(id),
                points,
                &format!("fund-{}-{}", id, points),
                "test funding",
                T0,
            )
            .await
            .unwrap();
    }

    pub async fn set_booking(&self, id: u64, customer: u64, status: BookingStatus) {
        self.bookings
            .upsert(BookingSnapshot {
                id: BookingId::new(id),
                customer: AccountId::new(customer),
                status,
                net_amount: 0,
                completed_at: None,
            })
            .await;
    }
}

pub fn booking_completed(booking: u64, account: u64, net_amount: u64) -> BookingCompleted {
    BookingCompleted {
        booking: BookingId::new(booking),
        account: AccountId::new(account),
        net_amount,
        completed_at: T0,
    }
}

pub fn redemption(request_id: &str, account: u64, points: u64, booking_amount: u64) -> RedemptionRequest {
    RedemptionRequest {
        request_id: request_id.to_owned(),
        account: AccountId::new(account),
        points,
        booking_amount,
        booking: None,
    }
}
