//! # Ledger Configuration & Constants
//!
//! Every tunable number in the ledger lives here. The constants are the
//! compiled-in defaults; [`LedgerConfig`] is the runtime view that the node
//! loads from TOML and hands to the registry.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ledger::Amount;

// ---------------------------------------------------------------------------
// Protocol Version
// ---------------------------------------------------------------------------

/// Version string of the ledger semantics. Bump when netting rules change.
pub const PROTOCOL_VERSION: &str = "0.1.0";

// ---------------------------------------------------------------------------
// Identifiers
// ---------------------------------------------------------------------------

/// Longest accepted participant identifier, in bytes.
///
/// Enough for a Bech32 address or a hex-encoded 32-byte public key with a
/// short prefix. Anything longer is almost certainly garbage input.
pub const MAX_PARTY_ID_LENGTH: usize = 64;

// ---------------------------------------------------------------------------
// Queries
// ---------------------------------------------------------------------------

/// Page size used by `lines_for` when the caller does not ask for one.
pub const DEFAULT_PAGE_SIZE: usize = 10;

/// Hard ceiling on the page size of `lines_for`.
pub const MAX_PAGE_SIZE: usize = 100;

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

/// Capacity of the broadcast channel feeding event subscribers. Slow
/// subscribers lag and lose events rather than blocking the ledger.
pub const EVENT_CHANNEL_CAPACITY: usize = 1024;

// ---------------------------------------------------------------------------
// Node defaults
// ---------------------------------------------------------------------------

/// Default port for the JSON API.
pub const DEFAULT_API_PORT: u16 = 9841;

/// Default port for the Prometheus metrics endpoint.
pub const DEFAULT_METRICS_PORT: u16 = 9842;

// ---------------------------------------------------------------------------
// LedgerConfig
// ---------------------------------------------------------------------------

/// Errors raised when a configuration is internally inconsistent.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// `max_page_size` must allow at least one result per page.
    #[error("max_page_size must be at least 1")]
    ZeroPageSize,

    /// A zero ceiling would make every non-zero limit invalid while still
    /// rejecting zero limits, so no line could ever be created.
    #[error("max_credit_limit is 0 while reject_zero_limits is set")]
    UnsatisfiableLimits,
}

/// Runtime parameters of the credit-line registry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Largest credit limit a party may extend. Limits above this fail with
    /// `InvalidLimit` on both `create` and `set_limit`.
    ///
    /// Defaults to `u64::MAX`. TOML integers are signed 64-bit, so a node
    /// config file can only set values up to `i64::MAX`; omit the key to keep
    /// the unbounded default.
    pub max_credit_limit: Amount,

    /// Reject zero limits on `create` and `set_limit`. Off by default: a
    /// zero limit is a legitimate one-way line.
    pub reject_zero_limits: bool,

    /// Upper bound on the page size of `lines_for`.
    pub max_page_size: usize,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            max_credit_limit: Amount::MAX,
            reject_zero_limits: false,
            max_page_size: MAX_PAGE_SIZE,
        }
    }
}

impl LedgerConfig {
    /// Checks the configuration for contradictions.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_page_size == 0 {
            return Err(ConfigError::ZeroPageSize);
        }
        if self.reject_zero_limits && self.max_credit_limit == 0 {
            return Err(ConfigError::UnsatisfiableLimits);
        }
        Ok(())
    }

    /// Returns `true` if `limit` is acceptable as a credit ceiling.
    pub fn accepts_limit(&self, limit: Amount) -> bool {
        if self.reject_zero_limits && limit == 0 {
            return false;
        }
        limit <= self.max_credit_limit
    }

    /// Clamps a requested page size into `[1, max_page_size]`.
    pub fn page_size(&self, requested: Option<usize>) -> usize {
        requested
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .clamp(1, self.max_page_size.max(1))
    }
}
