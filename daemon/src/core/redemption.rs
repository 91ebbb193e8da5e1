// Redemption engine
//
// Rules are evaluated against a read view first so that rejections never take
// the writer lock. They are all checked again under the writer lock
// right before the debit, along with the account state, so two concurrent
// requests can never both spend the same points.

use log::{info, warn};
use loyalty_common::{
    config::LoyaltyPolicy,
    event::RedemptionRequest,
    ledger::IdempotencyKey,
    notification::Notification,
    redemption::{
        cap_headroom, check_redemption, RedemptionContext, RedemptionOutcome, Reservation,
    },
    time::TimestampMillis,
};

use super::{
    error::LoyaltyError,
    ledger::{append_entry, redeemed_in_window, AppendOutcome, AppendRequest},
    service::LoyaltyService,
    storage::{finish_snapshot, Storage},
};

// Reservation stored for a request id that was already processed
async fn existing_reservation<S: Storage>(
    storage: &S,
    key: &IdempotencyKey,
) -> Result<Option<Reservation>, LoyaltyError> {
    let Some(id) = storage.get_entry_id_by_key(key).await? else {
        return Ok(None);
    };

    match storage.get_reservation(id).await? {
        Some(reservation) => Ok(Some(reservation)),
        None => Err(LoyaltyError::KeyConflict(key.to_string())),
    }
}

async fn load_context<S: Storage>(
    storage: &S,
    policy: &LoyaltyPolicy,
    request: &RedemptionRequest,
    now: TimestampMillis,
) -> Result<RedemptionContext, LoyaltyError> {
    let account = storage
        .get_account(request.account)
        .await?
        .ok_or(LoyaltyError::AccountNotFound(request.account))?;

    if !account.active {
        return Err(LoyaltyError::AccountInactive(account.id));
    }

    let balance = storage.get_balance(account.id).await?;
    let redeemed =
        redeemed_in_window(storage, account.id, policy.redemption_window_millis, now).await?;

    Ok(RedemptionContext {
        has_verified_mobile: account.can_redeem(),
        confirmed_balance: balance.confirmed,
        redeemed_in_window: redeemed,
        points_requested: request.points,
        booking_amount: request.booking_amount,
    })
}

// Debit the points and store the reservation. Must run inside a snapshot.
async fn reserve<S: Storage>(
    storage: &mut S,
    policy: &LoyaltyPolicy,
    request: &RedemptionRequest,
    headroom: u64,
    now: TimestampMillis,
) -> Result<Reservation, LoyaltyError> {
    let append = AppendRequest::redemption(request.account, request.points, &request.request_id)?;
    let entry_id = match append_entry(storage, append, now).await? {
        AppendOutcome::Appended(entry) => entry.id,
        AppendOutcome::Duplicate(id) => {
            return Err(LoyaltyError::KeyConflict(format!("redemption entry {}", id)))
        }
    };

    let reservation = Reservation {
        entry_id,
        points: request.points,
        value: policy.points_value(request.points),
        remaining_headroom: headroom - request.points,
    };
    storage.set_reservation(&reservation).await?;
    Ok(reservation)
}

// Every rule is evaluated again against the state the debit commits on, the
// account may have changed since the read phase. Caller holds the writer lock.
async fn commit_redemption<S: Storage>(
    storage: &mut S,
    policy: &LoyaltyPolicy,
    request: &RedemptionRequest,
    now: TimestampMillis,
) -> Result<RedemptionOutcome, LoyaltyError> {
    let ctx = load_context(&*storage, policy, request, now).await?;
    if let Err(rejection) = check_redemption(policy, &ctx) {
        warn!(
            "Redemption {} for {} no longer valid at write time: {}",
            request.request_id, request.account, rejection
        );
        return Ok(RedemptionOutcome::Rejected(rejection));
    }

    let headroom = cap_headroom(policy, ctx.redeemed_in_window);
    storage.start_snapshot().await?;
    let res = reserve(storage, policy, request, headroom, now).await;
    match finish_snapshot(storage, res).await {
        Ok(reservation) => Ok(RedemptionOutcome::Reserved(reservation)),
        Err(LoyaltyError::Rejected(rejection)) => Ok(RedemptionOutcome::Rejected(rejection)),
        Err(e) => Err(e),
    }
}

impl<S: Storage> LoyaltyService<S> {
    /// Validate a redemption and, when every rule passes, debit the points.
    ///
    /// Business rejections are returned as [`RedemptionOutcome::Rejected`];
    /// the error path is reserved for unknown accounts and infrastructure failures.
    /// Retrying a request id returns the original reservation.
    pub async fn validate_and_reserve(
        &self,
        request: &RedemptionRequest,
        now: TimestampMillis,
    ) -> Result<RedemptionOutcome, LoyaltyError> {
        let key = IdempotencyKey::redemption(&request.request_id);

        {
            let storage = self.storage.read().await;
            if let Some(reservation) = existing_reservation(&*storage, &key).await? {
                return Ok(RedemptionOutcome::Reserved(reservation));
            }

            let ctx = load_context(&*storage, &self.policy, request, now).await?;
            if let Err(rejection) = check_redemption(&self.policy, &ctx) {
                info!(
                    "Redemption {} of {} points for {} rejected: {}",
                    request.request_id, request.points, request.account, rejection
                );
                return Ok(RedemptionOutcome::Rejected(rejection));
            }
        }

        let reservation = {
            let mut storage = self.storage.write().await;
            if let Some(reservation) = existing_reservation(&*storage, &key).await? {
                return Ok(RedemptionOutcome::Reserved(reservation));
            }

            match commit_redemption(&mut *storage, &self.policy, request, now).await? {
                RedemptionOutcome::Reserved(reservation) => reservation,
                rejected => return Ok(rejected),
            }
        };

        info!(
            "Redeemed {} points for {} (entry {}), {} left in window",
            reservation.points,
            request.account,
            reservation.entry_id,
            reservation.remaining_headroom
        );

        self.notify(vec![Notification::PointsRedeemed {
            account: request.account,
            entry: reservation.entry_id,
            points: reservation.points,
            value: reservation.value,
        }])
        .await;

        Ok(RedemptionOutcome::Reserved(reservation))
    }
}

#[cfg(test)]
mod tests {
    use loyalty_common::{account::Account, ids::AccountId, redemption::RedemptionErrorKind};
    use tempdir::TempDir;

    use super::*;
    use crate::core::{
        accounts::register_account,
        config::RocksDBConfig,
        ledger::append_entry,
        storage::{AccountProvider, LedgerProvider, RocksStorage},
    };

    const NOW: TimestampMillis = 1_700_000_000_000;

    fn request(id: &str, points: u64) -> RedemptionRequest {
        RedemptionRequest {
            request_id: id.to_owned(),
            account: AccountId::new(1),
            points,
            booking_amount: 100_000,
            booking: None,
        }
    }

    // Verified account 1 holding `points` confirmed points
    async fn funded_storage(dir: &TempDir, points: i64) -> RocksStorage {
        let mut storage =
            RocksStorage::new(dir.path().to_str().unwrap(), &RocksDBConfig::default()).unwrap();
        let account = Account::new(AccountId::new(1), "a@example.com", NOW);
        let mut account = register_account(&mut storage, &account).await.unwrap();
        account.mobile_verified = true;
        account.mobile = Some("07700900001".to_owned());
        storage.set_account(&account).await.unwrap();

        let fund = AppendRequest::adjustment(AccountId::new(1), points, "fund", "test".to_owned());
        append_entry(&mut storage, fund, NOW).await.unwrap();
        storage
    }

    #[tokio::test]
    async fn test_commit_rejects_account_deactivated_after_read() {
        let dir = TempDir::new("loyalty-redemption").unwrap();
        let mut storage = funded_storage(&dir, 1_000).await;
        let policy = LoyaltyPolicy::default();

        let req = request("r-1", 500);
        let ctx = load_context(&storage, &policy, &req, NOW).await.unwrap();
        assert!(check_redemption(&policy, &ctx).is_ok());

        // deactivated between the read phase and the write
        let mut account = storage.get_account(AccountId::new(1)).await.unwrap().unwrap();
        account.active = false;
        storage.set_account(&account).await.unwrap();

        let err = commit_redemption(&mut storage, &policy, &req, NOW).await.unwrap_err();
        assert!(matches!(err, LoyaltyError::AccountInactive(_)));
        assert_eq!(storage.get_balance(AccountId::new(1)).await.unwrap().confirmed, 1_000);
    }

    #[tokio::test]
    async fn test_commit_rechecks_balance() {
        let dir = TempDir::new("loyalty-redemption").unwrap();
        let mut storage = funded_storage(&dir, 800).await;
        let policy = LoyaltyPolicy::default();

        let first = commit_redemption(&mut storage, &policy, &request("r-1", 500), NOW).await.unwrap();
        assert!(matches!(first, RedemptionOutcome::Reserved(ref r) if r.points == 500));

        let second = commit_redemption(&mut storage, &policy, &request("r-2", 500), NOW).await.unwrap();
        match second {
            RedemptionOutcome::Rejected(rejection) => {
                assert_eq!(rejection.kind, RedemptionErrorKind::InsufficientBalance)
            }
            other => panic!("unexpected outcome {:?}", other),
        }
        assert_eq!(storage.get_balance(AccountId::new(1)).await.unwrap().confirmed, 300);
    }
}
