// Account registry: records plus the email and mobile ownership indexes

use log::{debug, info, warn};
use loyalty_common::{
    account::{mobile_key, Account},
    ids::AccountId,
};

use super::{
    error::LoyaltyError,
    service::LoyaltyService,
    storage::{finish_snapshot, Storage},
};

// Store a new account. The first account to claim an email or mobile keeps the
// index entry. Verification flags are never taken from the caller, only
// `verify_mobile` sets them. Must run inside a snapshot.
pub async fn register_account<S: Storage>(
    storage: &mut S,
    account: &Account,
) -> Result<Account, LoyaltyError> {
    if let Some(existing) = storage.get_account(account.id).await? {
        debug!("account {} already registered", account.id);
        return Ok(existing);
    }

    if account.mobile_verified || account.identity_verified {
        warn!("Ignoring verification flags supplied at registration of {}", account.id);
    }

    let account = Account {
        mobile_verified: false,
        identity_verified: false,
        ..account.clone()
    };
    storage.set_account(&account).await?;

    let email = account.email_key();
    if storage.get_account_by_email(&email).await?.is_none() {
        storage.set_email_owner(&email, account.id).await?;
    }

    if let Some(mobile) = account.mobile_key() {
        if storage.get_account_by_mobile(&mobile).await?.is_none() {
            storage.set_mobile_owner(&mobile, account.id).await?;
        }
    }

    Ok(account)
}

async fn set_verified_mobile<S: Storage>(
    storage: &mut S,
    id: AccountId,
    mobile: &str,
) -> Result<Account, LoyaltyError> {
    let mut account = storage
        .get_account(id)
        .await?
        .ok_or(LoyaltyError::AccountNotFound(id))?;

    let key = mobile_key(mobile);
    if let Some(owner) = storage.get_account_by_mobile(&key).await? {
        if owner != id {
            let verified_elsewhere = storage
                .get_account(owner)
                .await?
                .is_some_and(|other| other.mobile_verified && other.mobile_key() == Some(key));
            if verified_elsewhere {
                return Err(LoyaltyError::MobileAlreadyInUse(owner));
            }
        }
    }

    // The previous number no longer belongs to this account
    if let Some(previous) = account.mobile_key().filter(|previous| *previous != key) {
        if storage.get_account_by_mobile(&previous).await? == Some(id) {
            storage.remove_mobile_owner(&previous).await?;
        }
    }

    account.mobile = Some(mobile.to_owned());
    account.mobile_verified = true;
    storage.set_account(&account).await?;
    storage.set_mobile_owner(&key, id).await?;
    Ok(account)
}

impl<S: Storage> LoyaltyService<S> {
    /// Register an account, a second call with the same id returns the stored record
    pub async fn register_account(&self, account: Account) -> Result<Account, LoyaltyError> {
        let mut storage = self.storage.write().await;
        storage.start_snapshot().await?;
        let res = register_account(&mut *storage, &account).await;
        finish_snapshot(&mut *storage, res).await
    }

    /// Mark a mobile number as verified, this is what unlocks redemption
    pub async fn verify_mobile(&self, id: AccountId, mobile: &str) -> Result<Account, LoyaltyError> {
        let mut storage = self.storage.write().await;
        storage.start_snapshot().await?;
        let res = set_verified_mobile(&mut *storage, id, mobile).await;
        let account = finish_snapshot(&mut *storage, res).await?;
        info!("Mobile verified for account {}", id);
        Ok(account)
    }

    // Inactive accounts keep their balance but cannot redeem
    pub async fn deactivate_account(&self, id: AccountId) -> Result<Account, LoyaltyError> {
        let mut storage = self.storage.write().await;
        let mut account = storage
            .get_account(id)
            .await?
            .ok_or(LoyaltyError::AccountNotFound(id))?;

        if account.active {
            account.active = false;
            storage.set_account(&account).await?;
            info!("Account {} deactivated", id);
        }

        Ok(account)
    }

    pub async fn get_account(&self, id: AccountId) -> Result<Option<Account>, LoyaltyError> {
        self.storage.read().await.get_account(id).await
    }
}
