//! # Access Guard
//!
//! Authorization for mutating operations. The guard only ever compares
//! identifiers: authentication happened upstream, and what arrives here is a
//! [`Principal`] the transport layer vouches for.
//!
//! Rules:
//!
//! - The caller must be one of the two parties of the line.
//! - A payment's sender must be the caller. Nobody pays on someone else's
//!   behalf.
//! - A caller changes only the ceiling it extends. Which ceiling that is
//!   follows from the caller's canonical side; there is no parameter that
//!   could name the other one.
//!
//! Every check runs on the canonical pair, before the registry takes the
//! key lock or reads the stored record.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::error::{LedgerError, LedgerResult};
use super::line::Side;
use crate::identity::{CanonicalPair, PartyId};

/// An authenticated caller.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Principal(PartyId);

impl Principal {
    /// Wraps an identity that the transport layer has already authenticated.
    pub fn authenticated(id: PartyId) -> Self {
        Self(id)
    }

    /// The caller's party identifier.
    pub fn id(&self) -> &PartyId {
        &self.0
    }
}

impl fmt::Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl fmt::Debug for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Principal({})", self.0)
    }
}

fn deny(caller: &Principal, reason: &'static str) -> LedgerError {
    LedgerError::Unauthorized {
        caller: caller.id().clone(),
        reason,
    }
}

/// Requires the caller to be one of the two parties of `pair`.
pub fn authorize_party(caller: &Principal, pair: &CanonicalPair) -> LedgerResult<Side> {
    if pair.low() == caller.id() {
        Ok(Side::Low)
    } else if pair.high() == caller.id() {
        Ok(Side::High)
    } else {
        Err(deny(caller, "caller is not a party to this credit line"))
    }
}

/// Requires the caller to be the sender of a payment.
pub fn authorize_sender(caller: &Principal, sender: &PartyId) -> LedgerResult<()> {
    if caller.id() != sender {
        return Err(deny(caller, "caller may only send payments from itself"));
    }
    Ok(())
}

/// Resolves which ceiling the caller may change on `pair`.
///
/// The caller must be a party, and the returned side is the caller's own:
/// the ceiling it extends. The ceiling extended *to* the caller is never
/// reachable through this path.
pub fn limit_side(caller: &Principal, pair: &CanonicalPair) -> LedgerResult<Side> {
    authorize_party(caller, pair)
}
