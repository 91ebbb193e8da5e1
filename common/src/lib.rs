#![allow(clippy::module_inception)]
#![allow(clippy::too_many_arguments)]

pub mod account;
pub mod booking;
pub mod config;
pub mod crypto;
pub mod earning;
pub mod error;
pub mod event;
pub mod ids;
pub mod ledger;
pub mod notification;
pub mod redemption;
pub mod referral;
pub mod serializer;
pub mod time;
