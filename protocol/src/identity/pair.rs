//! # Canonical Pairs
//!
//! A credit line belongs to an *unordered* pair of participants, but storage
//! needs one key per pair no matter who opened the line or who is calling.
//! [`canonicalize`] sorts the two identifiers and derives that key:
//!
//! ```text
//! (a, b) -> (low, high) = sort(a, b)
//! key    = BLAKE3( u32_be(len(low)) || low || u32_be(len(high)) || high )
//! ```
//!
//! The length prefixes keep the preimage unambiguous: without them `("ab",
//! "c")` and `("a", "bc")` would hash the same bytes.
//!
//! The function is pure. Swapping the arguments yields the same
//! [`CanonicalPair`], bit for bit.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::party::{IdentityError, PartyId};

/// Domain separation tag mixed into every pair key.
const PAIR_KEY_DOMAIN: &[u8] = b"trustline/pair/v1";

// ---------------------------------------------------------------------------
// PairKey
// ---------------------------------------------------------------------------

/// The storage key of a credit line: a 32-byte BLAKE3 digest.
///
/// Serialized as lowercase hex in human-readable formats and as raw bytes
/// otherwise, so sled keys stay compact.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PairKey([u8; 32]);

impl PairKey {
    /// Wraps raw digest bytes.
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// The raw digest.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Lowercase hex encoding.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for PairKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for PairKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PairKey({})", &self.to_hex()[..16])
    }
}

impl FromStr for PairKey {
    type Err = hex::FromHexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut bytes = [0u8; 32];
        hex::decode_to_slice(s, &mut bytes)?;
        Ok(Self(bytes))
    }
}

impl Serialize for PairKey {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if serializer.is_human_readable() {
            serializer.serialize_str(&self.to_hex())
        } else {
            self.0.serialize(serializer)
        }
    }
}

impl<'de> Deserialize<'de> for PairKey {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        if deserializer.is_human_readable() {
            let s = String::deserialize(deserializer)?;
            s.parse().map_err(serde::de::Error::custom)
        } else {
            let bytes = <[u8; 32]>::deserialize(deserializer)?;
            Ok(Self(bytes))
        }
    }
}

// ---------------------------------------------------------------------------
// CanonicalPair
// ---------------------------------------------------------------------------

/// Two distinct parties in canonical order, plus their storage key.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CanonicalPair {
    low: PartyId,
    high: PartyId,
    key: PairKey,
}

impl CanonicalPair {
    /// The party that sorts first.
    pub fn low(&self) -> &PartyId {
        &self.low
    }

    /// The party that sorts second.
    pub fn high(&self) -> &PartyId {
        &self.high
    }

    /// The storage key of the pair.
    pub fn key(&self) -> PairKey {
        self.key
    }

    /// Returns `true` if `party` is one of the two sides.
    pub fn contains(&self, party: &PartyId) -> bool {
        &self.low == party || &self.high == party
    }

    /// Returns the other side of the pair, or `None` if `party` is not in it.
    pub fn counterparty_of(&self, party: &PartyId) -> Option<&PartyId> {
        if &self.low == party {
            Some(&self.high)
        } else if &self.high == party {
            Some(&self.low)
        } else {
            None
        }
    }

    /// Consumes the pair, returning `(low, high)`.
    pub fn into_parties(self) -> (PartyId, PartyId) {
        (self.low, self.high)
    }
}

/// Orders two parties and derives their pair key.
///
/// # Errors
///
/// [`IdentityError::SelfPair`] if `a == b`.
pub fn canonicalize(a: &PartyId, b: &PartyId) -> Result<CanonicalPair, IdentityError> {
    let (low, high) = match a.cmp(b) {
        std::cmp::Ordering::Less => (a, b),
        std::cmp::Ordering::Greater => (b, a),
        std::cmp::Ordering::Equal => return Err(IdentityError::SelfPair(a.clone())),
    };

    Ok(CanonicalPair {
        key: derive_key(low, high),
        low: low.clone(),
        high: high.clone(),
    })
}

/// Pair key for parties already in canonical order.
fn derive_key(low: &PartyId, high: &PartyId) -> PairKey {
    let mut hasher = blake3::Hasher::new();
    hasher.update(PAIR_KEY_DOMAIN);
    for party in [low, high] {
        let bytes = party.as_bytes();
        // PartyId length is bounded well below u32::MAX.
        hasher.update(&(bytes.len() as u32).to_be_bytes());
        hasher.update(bytes);
    }
    PairKey(*hasher.finalize().as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn party(s: &str) -> PartyId {
        PartyId::new(s).unwrap()
    }

    #[test]
    fn orders_parties_bytewise() {
        let pair = canonicalize(&party("bob"), &party("alice")).unwrap();
        assert_eq!(pair.low().as_str(), "alice");
        assert_eq!(pair.high().as_str(), "bob");
    }

    #[test]
    fn swapped_arguments_give_same_pair() {
        let ab = canonicalize(&party("alice"), &party("bob")).unwrap();
        let ba = canonicalize(&party("bob"), &party("alice")).unwrap();
        assert_eq!(ab, ba);
        assert_eq!(ab.key(), ba.key());
    }

    #[test]
    fn deterministic_across_calls() {
        let first = canonicalize(&party("carol"), &party("dave")).unwrap().key();
        let second = canonicalize(&party("carol"), &party("dave")).unwrap().key();
        assert_eq!(first, second);
    }

    #[test]
    fn self_pair_rejected() {
        let alice = party("alice");
        assert_eq!(
            canonicalize(&alice, &alice),
            Err(IdentityError::SelfPair(alice.clone()))
        );
    }

    #[test]
    fn length_prefix_prevents_concatenation_collisions() {
        let k1 = canonicalize(&party("ab"), &party("c")).unwrap().key();
        let k2 = canonicalize(&party("a"), &party("bc")).unwrap().key();
        assert_ne!(k1, k2);
    }

    #[test]
    fn distinct_pairs_have_distinct_keys() {
        let k1 = canonicalize(&party("alice"), &party("bob")).unwrap().key();
        let k2 = canonicalize(&party("alice"), &party("carol")).unwrap().key();
        assert_ne!(k1, k2);
    }

    #[test]
    fn counterparty_lookup() {
        let pair = canonicalize(&party("alice"), &party("bob")).unwrap();
        assert_eq!(pair.counterparty_of(&party("alice")), Some(&party("bob")));
        assert_eq!(pair.counterparty_of(&party("bob")), Some(&party("alice")));
        assert_eq!(pair.counterparty_of(&party("mallory")), None);
        assert!(!pair.contains(&party("mallory")));
    }

    #[test]
    fn pair_key_hex_roundtrip() {
        let key = canonicalize(&party("alice"), &party("bob")).unwrap().key();
        let hex = key.to_string();
        assert_eq!(hex.len(), 64);
        assert_eq!(hex.parse::<PairKey>().unwrap(), key);

        let json = serde_json::to_string(&key).unwrap();
        assert_eq!(json, format!("\"{hex}\""));
        assert_eq!(serde_json::from_str::<PairKey>(&json).unwrap(), key);
    }
}
