// Referral system error types

use thiserror::Error;

/// Errors that can occur while managing referral codes and records
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ReferralError {
    /// No referral code with this value exists
    #[error("Referral code {0} not found")]
    CodeNotFound(String),

    /// Code exists but was already used or superseded
    #[error("Referral code {0} is no longer active")]
    CodeNotActive(String),

    /// Code value is not made of the referral alphabet
    #[error("Malformed referral code {0}")]
    MalformedCode(String),

    /// Attempted to refer oneself
    #[error("Cannot refer own account")]
    SelfReferral,

    /// Referee already has a referral record
    #[error("Account {0} was already referred")]
    AlreadyReferred(u64),

    /// Could not draw an unused code value
    #[error("Unable to generate a unique referral code after {0} attempts")]
    CodeGenerationExhausted(usize),

    /// Status change not allowed from the current state
    #[error("Referral record cannot move from {from} to {to}")]
    InvalidTransition { from: &'static str, to: &'static str },
}

/// Result type for referral operations
pub type ReferralResult<T> = Result<T, ReferralError>;
