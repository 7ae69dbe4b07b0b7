//! # LedgerDb: Persistent Line Store
//!
//! Durable [`LineStore`] on sled's embedded key-value store.
//!
//! ## Tree Layout
//!
//! | Tree          | Key                                      | Value                |
//! |---------------|------------------------------------------|----------------------|
//! | `lines`       | pair key (32B)                           | `bincode(CreditLine)`|
//! | `party_index` | `len(party)` (4B BE) ‖ party ‖ pair key  | pair key (32B)       |
//! | `metadata`    | key (UTF-8)                              | value (bytes)        |
//!
//! The party id is length-prefixed so that one party's prefix can never be
//! a prefix of another's (`"al"` vs `"alice"`). Within a party, entries sort
//! by pair key, which is the order `lines_for` pages in.
//!
//! ## Atomicity
//!
//! A record and both of its index entries are written in one multi-tree
//! transaction. Either all three land or none do.

use sled::transaction::{ConflictableTransactionError, TransactionError, Transactional};
use sled::{Db, Tree};
use std::ops::Bound;
use std::path::Path;

use super::store::{LineStore, StoreError, StoreResult};
use crate::identity::{PairKey, PartyId};
use crate::ledger::CreditLine;

// ---------------------------------------------------------------------------
// Metadata
// ---------------------------------------------------------------------------

/// Key in the `metadata` tree holding the on-disk format version.
const META_FORMAT_VERSION: &[u8] = b"format_version";

/// Current on-disk format. Bump whenever the record encoding changes.
const FORMAT_VERSION: u32 = 1;

// ---------------------------------------------------------------------------
// LedgerDb
// ---------------------------------------------------------------------------

/// sled-backed credit-line storage.
///
/// Cheap to clone; clones share the same underlying database.
#[derive(Debug, Clone)]
pub struct LedgerDb {
    db: Db,
    /// Records by pair key.
    lines: Tree,
    /// Secondary index: party -> pair keys.
    party_index: Tree,
    metadata: Tree,
}

impl LedgerDb {
    /// Opens or creates a database at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> StoreResult<Self> {
        let db = sled::open(path)?;
        Self::from_db(db)
    }

    /// Creates a throwaway database that is removed when dropped.
    pub fn open_temporary() -> StoreResult<Self> {
        let db = sled::Config::new().temporary(true).open()?;
        Self::from_db(db)
    }

    fn from_db(db: Db) -> StoreResult<Self> {
        let lines = db.open_tree("lines")?;
        let party_index = db.open_tree("party_index")?;
        let metadata = db.open_tree("metadata")?;

        let store = Self {
            db,
            lines,
            party_index,
            metadata,
        };
        store.check_format()?;
        Ok(store)
    }

    /// Stamps a fresh database with the current format, or verifies an
    /// existing one matches it.
    fn check_format(&self) -> StoreResult<()> {
        match self.metadata.get(META_FORMAT_VERSION)? {
            Some(bytes) => {
                let raw = <[u8; 4]>::try_from(&bytes[..]).map_err(|_| {
                    StoreError::Serialization("malformed format_version".to_string())
                })?;
                let found = u32::from_be_bytes(raw);
                if found != FORMAT_VERSION {
                    return Err(StoreError::IncompatibleFormat {
                        found,
                        expected: FORMAT_VERSION,
                    });
                }
            }
            None => {
                self.metadata
                    .insert(META_FORMAT_VERSION, &FORMAT_VERSION.to_be_bytes()[..])?;
            }
        }
        Ok(())
    }

    /// Total bytes used on disk.
    pub fn size_on_disk(&self) -> StoreResult<u64> {
        Ok(self.db.size_on_disk()?)
    }
}

/// `len(party)` as 4 big-endian bytes, followed by the party bytes.
fn party_prefix(party: &PartyId) -> Vec<u8> {
    let bytes = party.as_bytes();
    let mut prefix = Vec::with_capacity(4 + bytes.len() + 32);
    prefix.extend_from_slice(&(bytes.len() as u32).to_be_bytes());
    prefix.extend_from_slice(bytes);
    prefix
}

fn index_key(party: &PartyId, key: &PairKey) -> Vec<u8> {
    let mut entry = party_prefix(party);
    entry.extend_from_slice(key.as_bytes());
    entry
}

fn decode_line(bytes: &[u8]) -> StoreResult<CreditLine> {
    bincode::deserialize(bytes).map_err(|e| StoreError::Serialization(e.to_string()))
}

impl LineStore for LedgerDb {
    fn load(&self, key: &PairKey) -> StoreResult<Option<CreditLine>> {
        match self.lines.get(key.as_bytes())? {
            Some(bytes) => Ok(Some(decode_line(&bytes)?)),
            None => Ok(None),
        }
    }

    fn save(&self, line: &CreditLine) -> StoreResult<()> {
        let value =
            bincode::serialize(line).map_err(|e| StoreError::Serialization(e.to_string()))?;
        let key = line.key.as_bytes().to_vec();
        let low_entry = index_key(&line.party_low, &line.key);
        let high_entry = index_key(&line.party_high, &line.key);

        let result: Result<(), TransactionError<()>> = (&self.lines, &self.party_index)
            .transaction(|(lines, index)| {
                lines.insert(key.as_slice(), value.as_slice())?;
                index.insert(low_entry.as_slice(), key.as_slice())?;
                index.insert(high_entry.as_slice(), key.as_slice())?;
                Ok::<(), ConflictableTransactionError<()>>(())
            });

        result.map_err(|e| match e {
            TransactionError::Storage(e) => StoreError::Sled(e),
            TransactionError::Abort(()) => {
                StoreError::Serialization("line write aborted".to_string())
            }
        })
    }

    fn lines_for(
        &self,
        party: &PartyId,
        start_after: Option<&PairKey>,
        limit: usize,
    ) -> StoreResult<Vec<CreditLine>> {
        let prefix = party_prefix(party);
        let lower = match start_after {
            Some(key) => Bound::Excluded(index_key(party, key)),
            None => Bound::Included(prefix.clone()),
        };

        let mut out = Vec::new();
        for entry in self.party_index.range((lower, Bound::Unbounded)) {
            if out.len() >= limit {
                break;
            }
            let (index_entry, pair_bytes) = entry?;
            if !index_entry.starts_with(&prefix) {
                break;
            }
            let raw = <[u8; 32]>::try_from(&pair_bytes[..]).map_err(|_| {
                StoreError::CorruptIndex(format!("{} bytes under {party}", pair_bytes.len()))
            })?;
            let key = PairKey::from_bytes(raw);
            let line = self.load(&key)?.ok_or_else(|| {
                StoreError::CorruptIndex(format!("{party} -> {key} has no record"))
            })?;
            out.push(line);
        }
        Ok(out)
    }

    fn len(&self) -> StoreResult<usize> {
        Ok(self.lines.len())
    }

    fn active_len(&self) -> StoreResult<usize> {
        let mut active = 0;
        for entry in self.lines.iter() {
            let (_, bytes) = entry?;
            if decode_line(&bytes)?.active {
                active += 1;
            }
        }
        Ok(active)
    }

    fn flush(&self) -> StoreResult<()> {
        self.db.flush()?;
        Ok(())
    }
}
