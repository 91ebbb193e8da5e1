mod account;
mod ledger;
mod referral;
mod referral_code;
mod snapshot;
