// Referral attribution types
//
// A referee is bound to at most one referrer, at signup, through a single-use
// code. The referrer bonus is only awarded later by settlement.

mod code;
mod error;
mod fraud;
mod record;
mod signup;

pub use code::*;
pub use error::*;
pub use fraud::*;
pub use record::*;
pub use signup::*;
