//! # Credit-Line Registry
//!
//! The entry point for every ledger operation. Each mutation is one
//! read–compute–commit step:
//!
//! 1. The guard checks the caller against the canonical pair.
//! 2. The pair's key lock is taken.
//! 3. The record is loaded and validated (exists, active, limits).
//! 4. The new state is computed; nothing is written if that fails.
//! 5. The record is saved and one event is emitted, still under the lock.
//!
//! Locks are per pair key, so unrelated lines never contend. Reads
//! (`get`, `lines_for`, `available_credit`) take no lock; the store returns
//! whole records, so a reader sees one committed state or the next.

use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, warn};

use super::error::{LedgerError, LedgerResult};
use super::events::{EventEnvelope, EventSink, LedgerEvent, NullSink};
use super::guard::{self, Principal};
use super::line::{CreditAvailability, CreditLine};
use super::netting::net_payment;
use super::Amount;
use crate::clock::{Clock, SystemClock};
use crate::config::{ConfigError, LedgerConfig};
use crate::identity::{canonicalize, PairKey, PartyId};
use crate::storage::{LineStore, MemoryStore};

/// Keyed store of credit lines with serialized per-pair mutation.
pub struct CreditLineRegistry {
    config: LedgerConfig,
    store: Arc<dyn LineStore>,
    clock: Arc<dyn Clock>,
    events: Arc<dyn EventSink>,
    locks: DashMap<PairKey, Arc<Mutex<()>>>,
}

impl CreditLineRegistry {
    /// Builds a registry over the given collaborators.
    pub fn new(
        config: LedgerConfig,
        store: Arc<dyn LineStore>,
        clock: Arc<dyn Clock>,
        events: Arc<dyn EventSink>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            store,
            clock,
            events,
            locks: DashMap::new(),
        })
    }

    /// A registry with default configuration, an in-memory store, the
    /// system clock, and no event delivery.
    pub fn in_memory() -> Self {
        Self {
            config: LedgerConfig::default(),
            store: Arc::new(MemoryStore::new()),
            clock: Arc::new(SystemClock),
            events: Arc::new(NullSink),
            locks: DashMap::new(),
        }
    }

    /// The active configuration.
    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    /// Forces pending writes to durable storage.
    pub fn flush(&self) -> LedgerResult<()> {
        Ok(self.store.flush()?)
    }

    fn key_lock(&self, key: PairKey) -> Arc<Mutex<()>> {
        self.locks.entry(key).or_default().clone()
    }

    fn check_limit(&self, limit: Amount) -> LedgerResult<()> {
        if self.config.accepts_limit(limit) {
            Ok(())
        } else {
            Err(LedgerError::InvalidLimit {
                limit,
                max: self.config.max_credit_limit,
                zero_allowed: !self.config.reject_zero_limits,
            })
        }
    }

    fn load_active(&self, key: PairKey) -> LedgerResult<CreditLine> {
        let line = self.store.load(&key)?.ok_or(LedgerError::NotFound(key))?;
        if !line.active {
            return Err(LedgerError::NotActive(key));
        }
        Ok(line)
    }

    fn emit(&self, event: LedgerEvent, line: &CreditLine) {
        self.events.emit(EventEnvelope::new(event, line.updated_at));
    }

    // -- Mutations ----------------------------------------------------------

    /// Opens a line between the caller and `counterparty`.
    ///
    /// `limit_out` is the ceiling the caller extends (bounding what the
    /// caller may come to owe); `limit_in` is the ceiling assigned to the
    /// counterparty. A closed line for the same pair is replaced by a fresh
    /// record.
    pub fn create(
        &self,
        caller: &Principal,
        counterparty: &PartyId,
        limit_out: Amount,
        limit_in: Amount,
    ) -> LedgerResult<PairKey> {
        let pair = canonicalize(caller.id(), counterparty)?;
        guard::authorize_party(caller, &pair)?;
        self.check_limit(limit_out)?;
        self.check_limit(limit_in)?;

        let key = pair.key();
        let lock = self.key_lock(key);
        let _held = lock.lock();

        if let Some(existing) = self.store.load(&key)? {
            if existing.active {
                return Err(LedgerError::AlreadyExists(key));
            }
        }

        let line = CreditLine::open(pair, caller.id(), limit_out, limit_in, self.clock.now());
        self.store.save(&line)?;
        self.emit(
            LedgerEvent::LineCreated {
                pair: key,
                party_low: line.party_low.clone(),
                party_high: line.party_high.clone(),
                creator: caller.id().clone(),
                limit_out,
                limit_in,
            },
            &line,
        );

        debug!(pair = %key, creator = %caller, limit_out, limit_in, "credit line created");
        Ok(key)
    }

    /// Replaces the ceiling the caller extends to `counterparty`.
    ///
    /// Not checked against the current balance; see the `line` module docs.
    pub fn set_limit(
        &self,
        caller: &Principal,
        counterparty: &PartyId,
        new_limit: Amount,
    ) -> LedgerResult<()> {
        let pair = canonicalize(caller.id(), counterparty)?;
        let side = guard::limit_side(caller, &pair)?;
        self.check_limit(new_limit)?;

        let key = pair.key();
        let lock = self.key_lock(key);
        let _held = lock.lock();

        let mut line = self.load_active(key)?;
        line.set_limit(side, new_limit, self.clock.now());
        self.store.save(&line)?;
        self.emit(
            LedgerEvent::LimitUpdated {
                pair: key,
                setter: caller.id().clone(),
                side,
                new_limit,
            },
            &line,
        );

        debug!(pair = %key, setter = %caller, ?side, new_limit, "credit limit updated");
        Ok(())
    }

    /// Nets a payment of `amount` from `sender` to `receiver`.
    ///
    /// Returns the resulting `(magnitude, owed_by_low)`.
    pub fn pay(
        &self,
        caller: &Principal,
        sender: &PartyId,
        receiver: &PartyId,
        amount: Amount,
    ) -> LedgerResult<(Amount, bool)> {
        let result = self.try_pay(caller, sender, receiver, amount);
        if let Err(err) = &result {
            warn!(
                sender = %sender,
                receiver = %receiver,
                amount,
                code = err.code(),
                "payment rejected: {err}"
            );
        }
        result
    }

    fn try_pay(
        &self,
        caller: &Principal,
        sender: &PartyId,
        receiver: &PartyId,
        amount: Amount,
    ) -> LedgerResult<(Amount, bool)> {
        guard::authorize_sender(caller, sender)?;
        if amount == 0 {
            return Err(LedgerError::InvalidAmount);
        }
        let pair = canonicalize(sender, receiver)?;
        let sender_side = guard::authorize_party(caller, &pair)?;

        let key = pair.key();
        let lock = self.key_lock(key);
        let _held = lock.lock();

        let mut line = self.load_active(key)?;
        let outcome = net_payment(&line, sender_side, amount)?;
        line.set_balance(outcome.magnitude, outcome.owed_by_low, self.clock.now());
        self.store.save(&line)?;
        self.emit(
            LedgerEvent::PaymentRippled {
                pair: key,
                sender: sender.clone(),
                receiver: receiver.clone(),
                amount,
                resulting_magnitude: outcome.magnitude,
                resulting_owed_by_low: outcome.owed_by_low,
            },
            &line,
        );

        debug!(
            pair = %key,
            sender = %sender,
            amount,
            magnitude = outcome.magnitude,
            owed_by_low = outcome.owed_by_low,
            flipped = outcome.flipped,
            "payment netted"
        );
        Ok((outcome.magnitude, outcome.owed_by_low))
    }

    /// Deactivates a settled line.
    pub fn close(&self, caller: &Principal, counterparty: &PartyId) -> LedgerResult<()> {
        let pair = canonicalize(caller.id(), counterparty)?;
        guard::authorize_party(caller, &pair)?;

        let key = pair.key();
        let lock = self.key_lock(key);
        let _held = lock.lock();

        let mut line = self.load_active(key)?;
        if line.magnitude != 0 {
            return Err(LedgerError::BalanceNotZero {
                pair: key,
                magnitude: line.magnitude,
            });
        }
        line.deactivate(self.clock.now());
        self.store.save(&line)?;
        self.emit(
            LedgerEvent::LineClosed {
                pair: key,
                closed_by: caller.id().clone(),
            },
            &line,
        );

        debug!(pair = %key, closed_by = %caller, "credit line closed");
        Ok(())
    }

    // -- Queries ------------------------------------------------------------

    /// The record for the pair, active or not.
    pub fn get(&self, a: &PartyId, b: &PartyId) -> LedgerResult<CreditLine> {
        let pair = canonicalize(a, b)?;
        let key = pair.key();
        self.store.load(&key)?.ok_or(LedgerError::NotFound(key))
    }

    /// Every line `party` participates in, ordered by pair key.
    ///
    /// `start_after` is an exclusive cursor (the key of the last line of the
    /// previous page). `limit` is clamped to `[1, max_page_size]`.
    pub fn lines_for(
        &self,
        party: &PartyId,
        start_after: Option<&PairKey>,
        limit: Option<usize>,
    ) -> LedgerResult<Vec<CreditLine>> {
        let page = self.config.page_size(limit);
        Ok(self.store.lines_for(party, start_after, page)?)
    }

    /// How much `from` can currently pay `to`.
    pub fn available_credit(&self, from: &PartyId, to: &PartyId) -> LedgerResult<CreditAvailability> {
        let line = self.get(from, to)?;
        // `get` canonicalized the pair, so `from` is always on the line.
        let side = line.side_of(from).ok_or(LedgerError::NotFound(line.key))?;
        Ok(line.availability_for(side))
    }

    /// Total number of stored lines, including closed ones.
    pub fn line_count(&self) -> LedgerResult<usize> {
        Ok(self.store.len()?)
    }

    /// Number of open lines.
    pub fn active_line_count(&self) -> LedgerResult<usize> {
        Ok(self.store.active_len()?)
    }
}
