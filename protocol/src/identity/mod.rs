//! # Identity Module
//!
//! Participant identifiers and the canonical ordering of participant pairs.
//!
//! 1. **Party**: a validated, opaque participant identifier. The ledger
//!    never authenticates; it receives identifiers an outer layer vouches for.
//! 2. **Pair**: the canonicalizer. Maps an unordered pair of parties to a
//!    fixed `(low, high)` order and one BLAKE3 storage key, so a relationship
//!    is stored exactly once regardless of who initiated it.

pub mod pair;
pub mod party;

pub use pair::{canonicalize, CanonicalPair, PairKey};
pub use party::{IdentityError, PartyId};
