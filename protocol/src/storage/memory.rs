//! In-memory [`LineStore`].
//!
//! Nothing survives a restart. Used by tests, benches, and nodes started
//! with `--in-memory`.

use dashmap::DashMap;
use std::collections::BTreeSet;
use std::ops::Bound;

use super::store::{LineStore, StoreResult};
use crate::identity::{PairKey, PartyId};
use crate::ledger::CreditLine;

/// A [`LineStore`] backed by concurrent hash maps.
#[derive(Debug, Default)]
pub struct MemoryStore {
    lines: DashMap<PairKey, CreditLine>,
    /// party -> keys of every line it participates in, ordered.
    by_party: DashMap<PartyId, BTreeSet<PairKey>>,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn index(&self, party: &PartyId, key: PairKey) {
        self.by_party.entry(party.clone()).or_default().insert(key);
    }
}

impl LineStore for MemoryStore {
    fn load(&self, key: &PairKey) -> StoreResult<Option<CreditLine>> {
        Ok(self.lines.get(key).map(|entry| entry.value().clone()))
    }

    fn save(&self, line: &CreditLine) -> StoreResult<()> {
        self.lines.insert(line.key, line.clone());
        self.index(&line.party_low, line.key);
        self.index(&line.party_high, line.key);
        Ok(())
    }

    fn lines_for(
        &self,
        party: &PartyId,
        start_after: Option<&PairKey>,
        limit: usize,
    ) -> StoreResult<Vec<CreditLine>> {
        // Copy the page of keys out first so the index shard is not held
        // while the lines map is read.
        let keys: Vec<PairKey> = match self.by_party.get(party) {
            Some(set) => {
                let lower = match start_after {
                    Some(key) => Bound::Excluded(*key),
                    None => Bound::Unbounded,
                };
                set.range((lower, Bound::Unbounded))
                    .take(limit)
                    .copied()
                    .collect()
            }
            None => return Ok(Vec::new()),
        };

        Ok(keys
            .iter()
            .filter_map(|key| self.lines.get(key).map(|entry| entry.value().clone()))
            .collect())
    }

    fn len(&self) -> StoreResult<usize> {
        Ok(self.lines.len())
    }

    fn active_len(&self) -> StoreResult<usize> {
        Ok(self.lines.iter().filter(|entry| entry.value().active).count())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::canonicalize;
    use chrono::Utc;

    fn party(s: &str) -> PartyId {
        PartyId::new(s).unwrap()
    }

    fn line(a: &str, b: &str) -> CreditLine {
        let pair = canonicalize(&party(a), &party(b)).unwrap();
        CreditLine::open(pair, &party(a), 10, 10, Utc::now())
    }

    #[test]
    fn save_then_load() {
        let store = MemoryStore::new();
        let l = line("alice", "bob");
        assert!(store.load(&l.key).unwrap().is_none());

        store.save(&l).unwrap();
        assert_eq!(store.load(&l.key).unwrap(), Some(l));
        assert_eq!(store.len().unwrap(), 1);
        assert_eq!(store.active_len().unwrap(), 1);
    }

    #[test]
    fn save_replaces_without_duplicating_index() {
        let store = MemoryStore::new();
        let mut l = line("alice", "bob");
        store.save(&l).unwrap();
        l.set_balance(5, true, Utc::now());
        store.save(&l).unwrap();

        let lines = store.lines_for(&party("alice"), None, 10).unwrap();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].magnitude, 5);
    }

    #[test]
    fn lines_for_pages_in_key_order() {
        let store = MemoryStore::new();
        for other in ["bob", "carol", "dave", "erin"] {
            store.save(&line("alice", other)).unwrap();
        }
        store.save(&line("bob", "carol")).unwrap();

        let first = store.lines_for(&party("alice"), None, 3).unwrap();
        assert_eq!(first.len(), 3);
        assert!(first.windows(2).all(|w| w[0].key < w[1].key));

        let rest = store
            .lines_for(&party("alice"), Some(&first[2].key), 3)
            .unwrap();
        assert_eq!(rest.len(), 1);
        assert!(rest[0].key > first[2].key);

        assert!(store.lines_for(&party("zoe"), None, 3).unwrap().is_empty());
    }
}
