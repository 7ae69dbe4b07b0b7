// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Trustline Protocol: Core Library
//!
//! A ledger of bilateral credit lines. Two parties each extend the other a
//! ceiling, payments between them net into a single signed balance, and a
//! payment that would push the debtor past the ceiling it extended is
//! refused. Chains of such lines are what lets value ripple across parties
//! who never trusted each other directly.
//!
//! ## Architecture
//!
//! - **identity**: participant ids and the canonical pair key.
//! - **ledger**: credit-line records, netting, access guard, the registry,
//!   and domain events.
//! - **storage**: the `LineStore` seam, with in-memory and sled backends.
//! - **clock**: the time source the registry stamps records with.
//! - **config**: constants and the runtime `LedgerConfig`.
//!
//! ## Example
//!
//! ```
//! use trustline_protocol::identity::PartyId;
//! use trustline_protocol::ledger::{CreditLineRegistry, Principal};
//!
//! let alice = PartyId::new("alice").unwrap();
//! let bob = PartyId::new("bob").unwrap();
//! let registry = CreditLineRegistry::in_memory();
//!
//! let as_alice = Principal::authenticated(alice.clone());
//! registry.create(&as_alice, &bob, 100, 50).unwrap();
//! let (owed, owed_by_low) = registry.pay(&as_alice, &alice, &bob, 40).unwrap();
//! assert_eq!((owed, owed_by_low), (40, true));
//! ```
//!
//! ## Design Philosophy
//!
//! 1. Every failure is detected before anything is written.
//! 2. Money arithmetic is checked. No wrapping, no saturation on balances.
//! 3. If it touches a balance, it has tests. Plural.

pub mod clock;
pub mod config;
pub mod identity;
pub mod ledger;
pub mod storage;
