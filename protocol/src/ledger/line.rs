//! # Credit Line Records
//!
//! A [`CreditLine`] is the stored state of one bilateral relationship. The
//! two participants sit in canonical order (`party_low < party_high`), and
//! each extends its own ceiling:
//!
//! - `limit_low_to_high` is set by `party_low` and bounds the balance while
//!   `party_low` is the net debtor.
//! - `limit_high_to_low` is set by `party_high` and bounds the balance while
//!   `party_high` is the net debtor.
//!
//! The net balance is stored as an unsigned `magnitude` plus an
//! `owed_by_low` polarity flag. Read as a signed integer (positive when
//! `party_low` owes), it always lies in
//! `[-limit_high_to_low, +limit_low_to_high]` after a payment.
//!
//! ## Limit reductions
//!
//! [`CreditLine::set_limit`] does **not** compare the new ceiling with the
//! current balance. Lowering a ceiling below what is already owed is
//! accepted; it simply blocks further netting in that direction until the
//! debtor pays the balance back under the new ceiling. This is intentional
//! and covered by tests; do not add a retroactive check.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Amount;
use crate::identity::{CanonicalPair, PairKey, PartyId};

// ---------------------------------------------------------------------------
// Side
// ---------------------------------------------------------------------------

/// One of the two canonical positions on a line.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    /// The party that sorts first.
    Low,
    /// The party that sorts second.
    High,
}

impl Side {
    /// The opposite position.
    pub fn other(self) -> Self {
        match self {
            Side::Low => Side::High,
            Side::High => Side::Low,
        }
    }
}

// ---------------------------------------------------------------------------
// CreditAvailability
// ---------------------------------------------------------------------------

/// How much one party can still pay the other over a line right now.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreditAvailability {
    /// The ceiling the paying party extends.
    pub limit: Amount,
    /// What the paying party currently owes (0 if it is the creditor).
    pub used: Amount,
    /// The largest payment that would currently succeed.
    pub available: Amount,
}

// ---------------------------------------------------------------------------
// CreditLine
// ---------------------------------------------------------------------------

/// The stored record of a bilateral credit line.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreditLine {
    /// Storage key of the canonical pair.
    pub key: PairKey,

    /// Participant that sorts first.
    pub party_low: PartyId,

    /// Participant that sorts second.
    pub party_high: PartyId,

    /// Ceiling set by `party_low`; bounds the balance while `party_low` owes.
    pub limit_low_to_high: Amount,

    /// Ceiling set by `party_high`; bounds the balance while `party_high` owes.
    pub limit_high_to_low: Amount,

    /// Unsigned net balance.
    pub magnitude: Amount,

    /// `true` when `party_low` owes `magnitude` to `party_high`.
    pub owed_by_low: bool,

    /// Whether the line accepts payments and limit changes.
    pub active: bool,

    /// When the line was opened.
    pub created_at: DateTime<Utc>,

    /// When the line was last mutated.
    pub updated_at: DateTime<Utc>,
}

impl CreditLine {
    /// Opens a fresh line between the two parties of `pair`.
    ///
    /// `limit_out` is the ceiling `creator` extends and `limit_in` the one it
    /// proposes for the counterparty; both are mapped onto the canonical
    /// sides here.
    pub fn open(
        pair: CanonicalPair,
        creator: &PartyId,
        limit_out: Amount,
        limit_in: Amount,
        now: DateTime<Utc>,
    ) -> Self {
        let key = pair.key();
        let creator_is_low = pair.low() == creator;
        let (party_low, party_high) = pair.into_parties();
        let (limit_low_to_high, limit_high_to_low) = if creator_is_low {
            (limit_out, limit_in)
        } else {
            (limit_in, limit_out)
        };

        Self {
            key,
            party_low,
            party_high,
            limit_low_to_high,
            limit_high_to_low,
            magnitude: 0,
            owed_by_low: false,
            active: true,
            created_at: now,
            updated_at: now,
        }
    }

    /// The canonical position of `party`, or `None` if it is not on the line.
    pub fn side_of(&self, party: &PartyId) -> Option<Side> {
        if &self.party_low == party {
            Some(Side::Low)
        } else if &self.party_high == party {
            Some(Side::High)
        } else {
            None
        }
    }

    /// The participant at `side`.
    pub fn party(&self, side: Side) -> &PartyId {
        match side {
            Side::Low => &self.party_low,
            Side::High => &self.party_high,
        }
    }

    /// The ceiling extended by the party at `side`.
    pub fn limit_extended_by(&self, side: Side) -> Amount {
        match side {
            Side::Low => self.limit_low_to_high,
            Side::High => self.limit_high_to_low,
        }
    }

    /// The side that currently owes, or `None` when the balance is zero.
    pub fn debtor_side(&self) -> Option<Side> {
        if self.magnitude == 0 {
            None
        } else if self.owed_by_low {
            Some(Side::Low)
        } else {
            Some(Side::High)
        }
    }

    /// The participant that currently owes, or `None` when settled.
    pub fn debtor(&self) -> Option<&PartyId> {
        self.debtor_side().map(|side| self.party(side))
    }

    /// The ceiling that bounds the current balance.
    pub fn current_ceiling(&self) -> Amount {
        let side = if self.owed_by_low { Side::Low } else { Side::High };
        self.limit_extended_by(side)
    }

    /// Returns `true` if the balance is within the ceiling of its side.
    ///
    /// Can only be `false` after a ceiling was lowered below an existing
    /// balance (see the module docs).
    pub fn within_ceiling(&self) -> bool {
        self.magnitude <= self.current_ceiling()
    }

    /// Replaces the ceiling extended by `side`.
    pub fn set_limit(&mut self, side: Side, new_limit: Amount, now: DateTime<Utc>) {
        match side {
            Side::Low => self.limit_low_to_high = new_limit,
            Side::High => self.limit_high_to_low = new_limit,
        }
        self.updated_at = now;
    }

    /// Commits a netted balance.
    pub fn set_balance(&mut self, magnitude: Amount, owed_by_low: bool, now: DateTime<Utc>) {
        self.magnitude = magnitude;
        self.owed_by_low = owed_by_low;
        self.updated_at = now;
    }

    /// Marks the line closed.
    pub fn deactivate(&mut self, now: DateTime<Utc>) {
        self.active = false;
        self.updated_at = now;
    }

    /// What the party at `from` can currently pay its counterparty.
    ///
    /// As creditor it can first absorb the whole outstanding balance and
    /// then go into debt up to its own ceiling; as debtor it only has the
    /// headroom left under its ceiling. Closed lines have no availability.
    pub fn availability_for(&self, from: Side) -> CreditAvailability {
        let limit = self.limit_extended_by(from);
        let from_owes = self.debtor_side() == Some(from);
        let used = if from_owes { self.magnitude } else { 0 };

        let available = if !self.active {
            0
        } else if from_owes {
            limit.saturating_sub(self.magnitude)
        } else {
            self.magnitude.saturating_add(limit)
        };

        CreditAvailability {
            limit,
            used,
            available,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::canonicalize;

    fn party(s: &str) -> PartyId {
        PartyId::new(s).unwrap()
    }

    fn open(creator: &str, other: &str, out: Amount, inn: Amount) -> CreditLine {
        let pair = canonicalize(&party(creator), &party(other)).unwrap();
        CreditLine::open(pair, &party(creator), out, inn, Utc::now())
    }

    #[test]
    fn open_maps_limits_for_low_creator() {
        let line = open("alice", "bob", 100, 50);
        assert_eq!(line.party_low.as_str(), "alice");
        assert_eq!(line.limit_low_to_high, 100);
        assert_eq!(line.limit_high_to_low, 50);
        assert_eq!(line.magnitude, 0);
        assert!(line.active);
    }

    #[test]
    fn open_maps_limits_for_high_creator() {
        let line = open("bob", "alice", 100, 50);
        assert_eq!(line.party_low.as_str(), "alice");
        assert_eq!(line.party_high.as_str(), "bob");
        assert_eq!(line.limit_high_to_low, 100);
        assert_eq!(line.limit_low_to_high, 50);
    }

    #[test]
    fn side_lookup() {
        let line = open("alice", "bob", 1, 1);
        assert_eq!(line.side_of(&party("alice")), Some(Side::Low));
        assert_eq!(line.side_of(&party("bob")), Some(Side::High));
        assert_eq!(line.side_of(&party("carol")), None);
        assert_eq!(Side::Low.other(), Side::High);
    }

    #[test]
    fn settled_line_has_no_debtor() {
        let line = open("alice", "bob", 1, 1);
        assert_eq!(line.debtor(), None);
    }

    #[test]
    fn availability_as_debtor_and_creditor() {
        let mut line = open("alice", "bob", 100, 50);
        line.set_balance(40, true, Utc::now());

        let alice = line.availability_for(Side::Low);
        assert_eq!(alice.limit, 100);
        assert_eq!(alice.used, 40);
        assert_eq!(alice.available, 60);

        let bob = line.availability_for(Side::High);
        assert_eq!(bob.limit, 50);
        assert_eq!(bob.used, 0);
        assert_eq!(bob.available, 90);
    }

    #[test]
    fn availability_after_limit_cut_is_zero_not_negative() {
        let mut line = open("alice", "bob", 100, 50);
        line.set_balance(40, true, Utc::now());
        line.set_limit(Side::Low, 30, Utc::now());

        assert!(!line.within_ceiling());
        assert_eq!(line.availability_for(Side::Low).available, 0);
    }

    #[test]
    fn closed_line_has_no_availability() {
        let mut line = open("alice", "bob", 100, 50);
        line.deactivate(Utc::now());
        assert_eq!(line.availability_for(Side::Low).available, 0);
        assert_eq!(line.availability_for(Side::High).available, 0);
    }

    #[test]
    fn bincode_roundtrip_preserves_record() {
        let mut line = open("alice", "bob", 100, 50);
        line.set_balance(7, false, Utc::now());

        let bytes = bincode::serialize(&line).expect("serialize");
        let recovered: CreditLine = bincode::deserialize(&bytes).expect("deserialize");
        assert_eq!(recovered, line);
    }
}
