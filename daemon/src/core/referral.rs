// Referral attribution guard
//
// A referral is attributed at signup only after the fraud checks pass. The
// checks read the state as it was before the signup, so the referee's own
// index entries never count against it. The signup itself always succeeds.

use itertools::Itertools;
use log::{debug, info, warn};
use loyalty_common::{
    account::Account,
    config::LoyaltyPolicy,
    ids::AccountId,
    referral::{
        generate_code, normalize_code, FraudSignal, ReferralCode, ReferralError, ReferralRecord,
        ReferralStatus, ReferrerRiskReport, SignupEvent,
    },
    time::TimestampMillis,
};

use crate::config::MAX_REFERRAL_CODE_ATTEMPTS;

use super::{
    accounts::register_account,
    error::LoyaltyError,
    service::LoyaltyService,
    storage::{finish_snapshot, Storage},
};

// First fraud signal raised by this signup against the referrer, if any
pub async fn detect_fraud<S: Storage>(
    storage: &S,
    signup: &SignupEvent,
    referrer: &Account,
) -> Result<Option<FraudSignal>, LoyaltyError> {
    let referee = &signup.account;
    if referrer.id == referee.id {
        return Ok(Some(FraudSignal::SelfReferral));
    }

    if referrer.email_key() == referee.email_key() {
        return Ok(Some(FraudSignal::SharedEmail));
    }

    if let Some(mobile) = referee.mobile_key() {
        if referrer.mobile_key() == Some(mobile) {
            return Ok(Some(FraudSignal::SharedMobile));
        }

        if let Some(owner) = storage.get_account_by_mobile(&mobile).await? {
            if owner != referee.id {
                return Ok(Some(FraudSignal::MobileCollision));
            }
        }
    }

    if let Some(owner) = storage.get_account_by_email(&referee.email_key()).await? {
        if owner != referee.id {
            return Ok(Some(FraudSignal::EmailCollision));
        }
    }

    if let Some(device) = signup.device_key() {
        if let Some(previous) = storage.get_device_referee(&device).await? {
            if previous != referee.id {
                return Ok(Some(FraudSignal::DeviceReused));
            }
        }
    }

    if let Some(payment_method) = signup.payment_method_key() {
        if let Some(previous) = storage.get_payment_method_referrer(&payment_method).await? {
            if previous != referrer.id {
                return Ok(Some(FraudSignal::PaymentMethodReused));
            }
        }
    }

    Ok(None)
}

// Create a fresh active code for `owner`, retrying on collisions.
// Must run inside a snapshot.
async fn create_code<S: Storage>(
    storage: &mut S,
    owner: AccountId,
    now: TimestampMillis,
) -> Result<ReferralCode, LoyaltyError> {
    for _ in 0..MAX_REFERRAL_CODE_ATTEMPTS {
        let candidate = generate_code(&mut rand::thread_rng());
        if storage.has_referral_code(&candidate).await? {
            debug!("referral code collision, retrying");
            continue;
        }

        let code = ReferralCode::new(candidate, owner, now);
        storage.set_referral_code(&code).await?;
        storage.set_active_code(owner, &code.code).await?;
        return Ok(code);
    }

    Err(ReferralError::CodeGenerationExhausted(MAX_REFERRAL_CODE_ATTEMPTS).into())
}

// Referrer behind the signup's code, if the code is usable
async fn resolve_referrer<S: Storage>(
    storage: &S,
    signup: &SignupEvent,
) -> Result<Option<(ReferralCode, Account)>, LoyaltyError> {
    let Some(input) = signup.resolved_code() else {
        return Ok(None);
    };

    let code = match normalize_code(input) {
        Ok(code) => code,
        Err(e) => {
            info!("Signup of {} ignored referral code: {}", signup.account.id, e);
            return Ok(None);
        }
    };

    let Some(code) = storage.get_referral_code(&code).await? else {
        info!("Signup of {} used unknown referral code {}", signup.account.id, code);
        return Ok(None);
    };

    if !code.is_active() {
        info!(
            "Signup of {} used referral code {} which is {}",
            signup.account.id, code.code, code.status
        );
        return Ok(None);
    }

    let referrer = match storage.get_account(code.owner).await? {
        Some(account) if account.active => account,
        _ => {
            warn!("Referral code {} has no active owner", code.code);
            return Ok(None);
        }
    };

    Ok(Some((code, referrer)))
}

// Register the referee and attribute the referral when it is legitimate.
// Must run inside a snapshot.
async fn attribute<S: Storage>(
    storage: &mut S,
    signup: &SignupEvent,
    now: TimestampMillis,
) -> Result<Option<ReferralRecord>, LoyaltyError> {
    let referee = &signup.account;
    if let Some(existing) = storage.get_referral(referee.id).await? {
        debug!("signup of {} already attributed", referee.id);
        return Ok(Some(existing));
    }

    let resolved = resolve_referrer(&*storage, signup).await?;
    let signal = match &resolved {
        Some((_, referrer)) => detect_fraud(&*storage, signup, referrer).await?,
        None => None,
    };

    register_account(storage, referee).await?;

    let Some((mut code, referrer)) = resolved else {
        return Ok(None);
    };

    if let Some(signal) = signal {
        info!(
            "Referral of {} by {} suppressed: {}",
            referee.id, referrer.id, signal
        );
        return Ok(None);
    }

    code.mark_used(referee.id, now)?;
    storage.set_referral_code(&code).await?;
    create_code(storage, referrer.id, now).await?;

    let record = ReferralRecord {
        referrer: referrer.id,
        referee: referee.id,
        code: code.code.clone(),
        device: signup.device_key(),
        payment_method: signup.payment_method_key(),
        ip: signup.ip.clone(),
        referee_mobile: referee.mobile_key(),
        status: ReferralStatus::SignedUp,
        signed_up_at: signup.signed_up_at,
        completed_at: None,
        completed_by: None,
    };
    storage.set_referral(&record).await?;

    if let Some(device) = record.device {
        storage.set_device_referee(&device, referee.id).await?;
    }

    if let Some(payment_method) = record.payment_method {
        if storage
            .get_payment_method_referrer(&payment_method)
            .await?
            .is_none()
        {
            storage
                .set_payment_method_referrer(&payment_method, referrer.id)
                .await?;
        }
    }

    info!(
        "Referral of {} attributed to {} with code {}",
        referee.id, referrer.id, code.code
    );
    Ok(Some(record))
}

async fn risk_report<S: Storage>(
    storage: &S,
    policy: &LoyaltyPolicy,
    referrer: AccountId,
) -> Result<ReferrerRiskReport, LoyaltyError> {
    let referees = storage.list_referees(referrer, 0, usize::MAX).await?;
    let mut records = Vec::with_capacity(referees.len());
    for referee in referees {
        if let Some(record) = storage.get_referral(referee).await? {
            records.push(record);
        }
    }

    // referrals without a device or mobile only count toward the volume
    let unique_devices = records.iter().filter_map(|r| r.device).unique().count();
    let unique_mobiles = records.iter().filter_map(|r| r.referee_mobile).unique().count();

    Ok(ReferrerRiskReport::new(
        policy,
        referrer,
        records.len() as u64,
        unique_devices as u64,
        unique_mobiles as u64,
    ))
}

impl<S: Storage> LoyaltyService<S> {
    /// Handle a signup: register the account and, when a usable referral code
    /// was presented and no fraud signal fires, record the referral.
    pub async fn attach_referral(
        &self,
        signup: &SignupEvent,
        now: TimestampMillis,
    ) -> Result<Option<ReferralRecord>, LoyaltyError> {
        let mut storage = self.storage.write().await;
        storage.start_snapshot().await?;
        let res = attribute(&mut *storage, signup, now).await;
        finish_snapshot(&mut *storage, res).await
    }

    /// Active referral code of the account, created on first request
    pub async fn issue_referral_code(
        &self,
        account: AccountId,
        now: TimestampMillis,
    ) -> Result<ReferralCode, LoyaltyError> {
        let mut storage = self.storage.write().await;
        if !storage.has_account(account).await? {
            return Err(LoyaltyError::AccountNotFound(account));
        }

        if let Some(active) = storage.get_active_code(account).await? {
            if let Some(code) = storage.get_referral_code(&active).await? {
                if code.is_active() {
                    return Ok(code);
                }
            }
        }

        storage.start_snapshot().await?;
        let res = create_code(&mut *storage, account, now).await;
        finish_snapshot(&mut *storage, res).await
    }

    pub async fn get_referral_code(&self, code: &str) -> Result<Option<ReferralCode>, LoyaltyError> {
        let code = normalize_code(code)?;
        self.storage.read().await.get_referral_code(&code).await
    }

    pub async fn get_referral_for_referee(
        &self,
        referee: AccountId,
    ) -> Result<Option<ReferralRecord>, LoyaltyError> {
        self.storage.read().await.get_referral(referee).await
    }

    pub async fn list_referrals(
        &self,
        referrer: AccountId,
        skip: usize,
        limit: usize,
    ) -> Result<Vec<ReferralRecord>, LoyaltyError> {
        let storage = self.storage.read().await;
        let referees = storage.list_referees(referrer, skip, limit).await?;
        let mut records = Vec::with_capacity(referees.len());
        for referee in referees {
            if let Some(record) = storage.get_referral(referee).await? {
                records.push(record);
            }
        }

        Ok(records)
    }

    pub async fn referrer_risk_report(
        &self,
        referrer: AccountId,
    ) -> Result<ReferrerRiskReport, LoyaltyError> {
        let storage = self.storage.read().await;
        risk_report(&*storage, &self.policy, referrer).await
    }

    // Referrers to hand over for manual review, never blocked automatically
    pub async fn flagged_referrers(&self) -> Result<Vec<ReferrerRiskReport>, LoyaltyError> {
        let storage = self.storage.read().await;
        let mut flagged = Vec::new();
        for referrer in storage.list_referrers().await? {
            let report = risk_report(&*storage, &self.policy, referrer).await?;
            if report.flagged {
                flagged.push(report);
            }
        }

        Ok(flagged)
    }
}
