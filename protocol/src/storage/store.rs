//! The persistence contract of the registry.

use crate::identity::{PairKey, PartyId};
use crate::ledger::CreditLine;

/// Errors that can occur in a [`LineStore`].
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("sled error: {0}")]
    Sled(#[from] sled::Error),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("corrupt index entry: {0}")]
    CorruptIndex(String),

    #[error("incompatible storage format: found v{found}, expected v{expected}")]
    IncompatibleFormat { found: u32, expected: u32 },
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Keyed storage of credit-line records.
///
/// Implementations must make each `save` atomic (a reader sees either the
/// old record or the new one, never a mix) and must be safe to share across
/// threads.
pub trait LineStore: Send + Sync {
    /// Loads the record for `key`, if any.
    fn load(&self, key: &PairKey) -> StoreResult<Option<CreditLine>>;

    /// Inserts or replaces the record under `line.key`, and indexes it under
    /// both parties.
    fn save(&self, line: &CreditLine) -> StoreResult<()>;

    /// Records involving `party`, ordered by pair key, starting strictly
    /// after `start_after`, at most `limit` of them.
    fn lines_for(
        &self,
        party: &PartyId,
        start_after: Option<&PairKey>,
        limit: usize,
    ) -> StoreResult<Vec<CreditLine>>;

    /// Total number of stored records, active or not.
    fn len(&self) -> StoreResult<usize>;

    /// Number of records with `active` set. May scan the whole store.
    fn active_len(&self) -> StoreResult<usize>;

    /// Forces buffered writes to durable storage. A no-op for stores that
    /// have nothing to flush.
    fn flush(&self) -> StoreResult<()> {
        Ok(())
    }

    /// Returns `true` if the store holds no records.
    fn is_empty(&self) -> StoreResult<bool> {
        Ok(self.len()? == 0)
    }
}
