//! # Storage Module
//!
//! Persistence behind the credit-line registry. The registry talks to a
//! [`LineStore`]; this module ships two of them:
//!
//! ```text
//! store.rs   the LineStore trait and StoreError
//! memory.rs  MemoryStore: DashMap-backed, for tests and ephemeral nodes
//! db.rs      LedgerDb: sled-backed, durable across restarts
//! ```
//!
//! ## Design Decisions
//!
//! 1. **Records keyed by pair key.** One record per canonical pair; the key
//!    is the 32-byte BLAKE3 digest from the canonicalizer.
//! 2. **Secondary index by party.** `lines_for` is served from a per-party
//!    index ordered by pair key, so pagination is a range scan.
//! 3. **Bincode on disk.** Compact and deterministic. JSON is for the API.
//!
//! Stores do not serialize writers. Per-key mutual exclusion is the
//! registry's job; a store only has to make each single `save` atomic.

pub mod db;
pub mod memory;
pub mod store;

pub use db::LedgerDb;
pub use memory::MemoryStore;
pub use store::{LineStore, StoreError, StoreResult};
