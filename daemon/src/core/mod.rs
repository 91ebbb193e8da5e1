pub mod accounts;
pub mod config;
pub mod earning;
pub mod error;
pub mod ledger;
pub mod notify;
pub mod redemption;
pub mod referral;
pub mod service;
pub mod settlement;
pub mod storage;
