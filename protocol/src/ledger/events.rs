//! # Domain Events
//!
//! Every successful mutation emits exactly one [`LedgerEvent`], wrapped in
//! an [`EventEnvelope`] with a unique id and the commit timestamp. Events
//! are for external indexers and live feeds; nothing inside the ledger
//! reads them back.
//!
//! Sinks are pluggable through [`EventSink`]:
//!
//! - [`BroadcastSink`] fans events out over a `tokio::sync::broadcast`
//!   channel. Slow subscribers lag instead of blocking writers.
//! - [`RecordingSink`] keeps everything in memory, for tests and tooling.
//! - [`NullSink`] drops everything.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

use super::line::Side;
use super::Amount;
use crate::identity::{PairKey, PartyId};

/// A state change on a credit line.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LedgerEvent {
    /// A line was opened (or re-opened after a close).
    LineCreated {
        pair: PairKey,
        party_low: PartyId,
        party_high: PartyId,
        creator: PartyId,
        /// Ceiling the creator extends.
        limit_out: Amount,
        /// Ceiling the creator assigned to the counterparty.
        limit_in: Amount,
    },
    /// A party changed the ceiling it extends.
    LimitUpdated {
        pair: PairKey,
        setter: PartyId,
        side: Side,
        new_limit: Amount,
    },
    /// A payment was netted into the balance.
    PaymentRippled {
        pair: PairKey,
        sender: PartyId,
        receiver: PartyId,
        amount: Amount,
        resulting_magnitude: Amount,
        resulting_owed_by_low: bool,
    },
    /// A settled line was deactivated.
    LineClosed { pair: PairKey, closed_by: PartyId },
}

impl LedgerEvent {
    /// The line this event concerns.
    pub fn pair(&self) -> PairKey {
        match self {
            LedgerEvent::LineCreated { pair, .. }
            | LedgerEvent::LimitUpdated { pair, .. }
            | LedgerEvent::PaymentRippled { pair, .. }
            | LedgerEvent::LineClosed { pair, .. } => *pair,
        }
    }

    /// Short name, used for log fields and metric labels.
    pub fn kind(&self) -> &'static str {
        match self {
            LedgerEvent::LineCreated { .. } => "line_created",
            LedgerEvent::LimitUpdated { .. } => "limit_updated",
            LedgerEvent::PaymentRippled { .. } => "payment_rippled",
            LedgerEvent::LineClosed { .. } => "line_closed",
        }
    }
}

/// An event plus delivery metadata.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventEnvelope {
    /// Unique event id.
    pub id: Uuid,
    /// Commit time of the mutation.
    pub at: DateTime<Utc>,
    /// The event itself.
    pub event: LedgerEvent,
}

impl EventEnvelope {
    /// Wraps `event` with a fresh id.
    pub fn new(event: LedgerEvent, at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            at,
            event,
        }
    }
}

// ---------------------------------------------------------------------------
// Sinks
// ---------------------------------------------------------------------------

/// Destination for emitted events.
///
/// `emit` is called while the registry holds the line's key lock, so it
/// must not block and must not call back into the registry.
pub trait EventSink: Send + Sync {
    /// Delivers one event.
    fn emit(&self, envelope: EventEnvelope);
}

/// Broadcasts events to any number of async subscribers.
#[derive(Clone, Debug)]
pub struct BroadcastSink {
    tx: broadcast::Sender<EventEnvelope>,
}

impl BroadcastSink {
    /// Creates a sink whose channel buffers `capacity` events per subscriber.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Opens a new subscription. Only events emitted afterwards are seen.
    pub fn subscribe(&self) -> broadcast::Receiver<EventEnvelope> {
        self.tx.subscribe()
    }

    /// Current number of live subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl EventSink for BroadcastSink {
    fn emit(&self, envelope: EventEnvelope) {
        // No subscribers is not an error: the ledger does not depend on
        // anyone listening.
        let _ = self.tx.send(envelope);
    }
}

/// Keeps every event in memory.
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<EventEnvelope>>,
}

impl RecordingSink {
    /// Creates an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the recorded events, oldest first.
    pub fn events(&self) -> Vec<LedgerEvent> {
        self.events.lock().iter().map(|e| e.event.clone()).collect()
    }

    /// Snapshot including envelopes.
    pub fn envelopes(&self) -> Vec<EventEnvelope> {
        self.events.lock().clone()
    }

    /// Number of recorded events.
    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    /// Returns `true` if nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }
}

impl EventSink for RecordingSink {
    fn emit(&self, envelope: EventEnvelope) {
        self.events.lock().push(envelope);
    }
}

/// Discards every event.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&self, _envelope: EventEnvelope) {}
}
