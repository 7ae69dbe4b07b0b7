//! Error types for the credit-line ledger.
//!
//! Every ledger operation that can fail returns a [`LedgerError`]. All
//! variants are raised before anything is written, so an error always means
//! the stored state is exactly what it was before the call.

use thiserror::Error;

use super::Amount;
use crate::identity::{IdentityError, PairKey, PartyId};
use crate::storage::StoreError;

/// Errors that can occur during credit-line operations.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// A participant identifier is malformed, or both sides are the same.
    #[error("invalid party: {0}")]
    InvalidParty(#[from] IdentityError),

    /// An active line already exists for the pair.
    #[error("credit line {0} already exists")]
    AlreadyExists(PairKey),

    /// No line has ever been created for the pair.
    #[error("credit line {0} not found")]
    NotFound(PairKey),

    /// The line was closed and accepts no further mutations.
    #[error("credit line {0} is not active")]
    NotActive(PairKey),

    /// The authenticated caller may not perform this operation.
    #[error("{caller} is not authorized: {reason}")]
    Unauthorized {
        /// The authenticated principal that made the call.
        caller: PartyId,
        /// What the guard objected to.
        reason: &'static str,
    },

    /// Payment amounts must be strictly positive.
    #[error("payment amount must be greater than zero")]
    InvalidAmount,

    /// A credit limit is outside what the ledger configuration accepts.
    #[error("credit limit {limit} rejected (maximum {max}, zero allowed: {zero_allowed})")]
    InvalidLimit {
        /// The rejected limit.
        limit: Amount,
        /// Configured ceiling.
        max: Amount,
        /// Whether zero limits are accepted.
        zero_allowed: bool,
    },

    /// Netting would leave the debtor above the ceiling on its side.
    #[error("credit limit exceeded on {pair}: resulting balance {attempted}, ceiling {ceiling}")]
    LimitExceeded {
        /// The line the payment targeted.
        pair: PairKey,
        /// Magnitude the payment would have produced.
        attempted: Amount,
        /// Ceiling on the side that would owe it.
        ceiling: Amount,
    },

    /// A line can only be closed once its balance is settled.
    #[error("credit line {pair} still carries a balance of {magnitude}")]
    BalanceNotZero {
        /// The line the caller tried to close.
        pair: PairKey,
        /// Outstanding magnitude.
        magnitude: Amount,
    },

    /// Checked arithmetic overflowed.
    #[error("arithmetic overflow")]
    ArithmeticOverflow,

    /// The persistence layer failed.
    #[error("storage error: {0}")]
    Storage(#[from] StoreError),
}

impl LedgerError {
    /// Stable machine-readable code, used by the API layer and in logs.
    pub fn code(&self) -> &'static str {
        match self {
            LedgerError::InvalidParty(_) => "invalid_party",
            LedgerError::AlreadyExists(_) => "already_exists",
            LedgerError::NotFound(_) => "not_found",
            LedgerError::NotActive(_) => "not_active",
            LedgerError::Unauthorized { .. } => "unauthorized",
            LedgerError::InvalidAmount => "invalid_amount",
            LedgerError::InvalidLimit { .. } => "invalid_limit",
            LedgerError::LimitExceeded { .. } => "limit_exceeded",
            LedgerError::BalanceNotZero { .. } => "balance_not_zero",
            LedgerError::ArithmeticOverflow => "arithmetic_overflow",
            LedgerError::Storage(_) => "storage",
        }
    }
}

/// Convenience alias used throughout the ledger.
pub type LedgerResult<T> = Result<T, LedgerError>;
