//! # Ledger Module
//!
//! Bilateral credit lines and the payments that ripple over them.
//!
//! ```text
//! caller ──► guard ──► canonicalize ──► registry ──► netting ──► store ──► events
//! ```
//!
//! - `line.rs`     the stored record, sides and availability
//! - `netting.rs`  pure balance update for one payment
//! - `guard.rs`    who may do what
//! - `registry.rs` the operations, per-pair locking, persistence, events
//! - `events.rs`   domain events and sinks
//! - `error.rs`    `LedgerError`

pub mod error;
pub mod events;
pub mod guard;
pub mod line;
pub mod netting;
pub mod registry;

/// Credit limits, balances and payment amounts.
pub type Amount = u64;

pub use error::{LedgerError, LedgerResult};
pub use events::{BroadcastSink, EventEnvelope, EventSink, LedgerEvent, NullSink, RecordingSink};
pub use guard::Principal;
pub use line::{CreditAvailability, CreditLine, Side};
pub use netting::{net_payment, NettingOutcome};
pub use registry::CreditLineRegistry;
