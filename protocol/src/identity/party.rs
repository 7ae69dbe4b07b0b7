//! # Party Identifiers
//!
//! A [`PartyId`] names a participant of a credit line. The ledger does not
//! authenticate anyone; it receives identifiers that an outer layer has
//! already verified. What it does insist on is that identifiers are
//! well-formed, because two spellings of the same participant would map
//! to two different credit lines.
//!
//! Ordering is byte-wise over the UTF-8 form, which is exactly what the
//! derived `Ord` on `String` gives us. The canonicalizer relies on this.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::config::MAX_PARTY_ID_LENGTH;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Reasons a participant identifier (or pair of them) is rejected.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum IdentityError {
    /// The identifier is the empty string.
    #[error("party identifier is empty")]
    Empty,

    /// The identifier exceeds [`MAX_PARTY_ID_LENGTH`] bytes.
    #[error("party identifier is {len} bytes, maximum is {max}")]
    TooLong {
        /// Actual length in bytes.
        len: usize,
        /// Configured maximum.
        max: usize,
    },

    /// The identifier contains whitespace or a control character.
    #[error("party identifier contains forbidden character {0:?}")]
    ForbiddenCharacter(char),

    /// Both sides of a pair name the same participant.
    #[error("a credit line needs two distinct parties, got {0} twice")]
    SelfPair(PartyId),
}

// ---------------------------------------------------------------------------
// PartyId
// ---------------------------------------------------------------------------

/// A validated participant identifier.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PartyId(String);

impl PartyId {
    /// Validates and wraps an identifier.
    pub fn new(raw: impl Into<String>) -> Result<Self, IdentityError> {
        let raw = raw.into();
        if raw.is_empty() {
            return Err(IdentityError::Empty);
        }
        if raw.len() > MAX_PARTY_ID_LENGTH {
            return Err(IdentityError::TooLong {
                len: raw.len(),
                max: MAX_PARTY_ID_LENGTH,
            });
        }
        if let Some(c) = raw.chars().find(|c| c.is_whitespace() || c.is_control()) {
            return Err(IdentityError::ForbiddenCharacter(c));
        }
        Ok(Self(raw))
    }

    /// The identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The identifier's bytes, as used for ordering and key derivation.
    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl TryFrom<String> for PartyId {
    type Error = IdentityError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<PartyId> for String {
    fn from(id: PartyId) -> Self {
        id.0
    }
}

impl FromStr for PartyId {
    type Err = IdentityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl AsRef<str> for PartyId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PartyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for PartyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PartyId({})", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_typical_identifiers() {
        for raw in ["alice", "nova1qw508d6qejxtdg4y5r3zarvary0c5xw7k3sxhl", "0xdeadbeef"] {
            let id = PartyId::new(raw).unwrap();
            assert_eq!(id.as_str(), raw);
        }
    }

    #[test]
    fn rejects_empty() {
        assert_eq!(PartyId::new(""), Err(IdentityError::Empty));
    }

    #[test]
    fn rejects_too_long() {
        let raw = "a".repeat(MAX_PARTY_ID_LENGTH + 1);
        assert!(matches!(
            PartyId::new(raw),
            Err(IdentityError::TooLong { len, .. }) if len == MAX_PARTY_ID_LENGTH + 1
        ));
        assert!(PartyId::new("a".repeat(MAX_PARTY_ID_LENGTH)).is_ok());
    }

    #[test]
    fn rejects_whitespace_and_control() {
        assert_eq!(
            PartyId::new("alice bob"),
            Err(IdentityError::ForbiddenCharacter(' '))
        );
        assert_eq!(
            PartyId::new("alice\n"),
            Err(IdentityError::ForbiddenCharacter('\n'))
        );
    }

    #[test]
    fn ordering_is_bytewise() {
        let upper = PartyId::new("Zed").unwrap();
        let lower = PartyId::new("alice").unwrap();
        // 'Z' (0x5A) sorts before 'a' (0x61).
        assert!(upper < lower);
    }

    #[test]
    fn serde_validates_on_the_way_in() {
        let id: PartyId = serde_json::from_str("\"bob\"").unwrap();
        assert_eq!(id.as_str(), "bob");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"bob\"");

        assert!(serde_json::from_str::<PartyId>("\"\"").is_err());
        assert!(serde_json::from_str::<PartyId>("\"has space\"").is_err());
    }
}
