// Ledger entry data structures
//
// An entry is the immutable record of one point-affecting event. Only its
// status (and settlement timestamp) ever changes, and only once:
// pending -> confirmed or pending -> reversed.

mod balance;
mod entry;
mod key;

pub use balance::*;
pub use entry::*;
pub use key::*;
