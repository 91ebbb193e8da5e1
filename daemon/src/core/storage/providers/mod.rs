mod account;
mod ledger;
mod referral;
mod referral_code;
mod snapshot;

pub use account::*;
pub use ledger::*;
pub use referral::*;
pub use referral_code::*;
pub use snapshot::*;
