//! Integration tests for the credit-line ledger.
//!
//! These drive the public API only: a registry built from its collaborators,
//! the sled store on a real directory, and many threads hammering one line.
//! Each test owns its store; nothing is shared between tests.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;

use trustline_protocol::clock::SystemClock;
use trustline_protocol::config::LedgerConfig;
use trustline_protocol::identity::PartyId;
use trustline_protocol::ledger::{
    Amount, CreditLineRegistry, LedgerError, LedgerEvent, NullSink, Principal, RecordingSink,
};
use trustline_protocol::storage::{LedgerDb, LineStore, MemoryStore};

// ---------------------------------------------------------------------------
// Test Helpers
// ---------------------------------------------------------------------------

fn party(s: &str) -> PartyId {
    PartyId::new(s).expect("valid party id")
}

fn as_caller(s: &str) -> Principal {
    Principal::authenticated(party(s))
}

fn registry_over(store: Arc<dyn LineStore>, events: Arc<RecordingSink>) -> CreditLineRegistry {
    CreditLineRegistry::new(LedgerConfig::default(), store, Arc::new(SystemClock), events)
        .expect("default config is valid")
}

// ---------------------------------------------------------------------------
// Lifecycle
// ---------------------------------------------------------------------------

#[test]
fn full_lifecycle_emits_one_event_per_mutation() {
    let events = Arc::new(RecordingSink::new());
    let registry = registry_over(Arc::new(MemoryStore::new()), events.clone());
    let (alice, bob) = (party("alice"), party("bob"));

    registry.create(&as_caller("alice"), &bob, 100, 50).unwrap();
    registry.pay(&as_caller("alice"), &alice, &bob, 40).unwrap();
    registry.pay(&as_caller("bob"), &bob, &alice, 90).unwrap();
    registry.set_limit(&as_caller("bob"), &alice, 60).unwrap();
    registry.pay(&as_caller("alice"), &alice, &bob, 50).unwrap();
    registry.close(&as_caller("alice"), &bob).unwrap();

    let kinds: Vec<_> = events.events().iter().map(|e| e.kind()).collect();
    assert_eq!(
        kinds,
        vec![
            "line_created",
            "payment_rippled",
            "payment_rippled",
            "limit_updated",
            "payment_rippled",
            "line_closed",
        ]
    );

    let line = registry.get(&bob, &alice).unwrap();
    assert!(!line.active);
    assert_eq!(line.magnitude, 0);
    assert_eq!(line.limit_high_to_low, 60);
}

#[test]
fn rejected_operations_leave_state_and_feed_untouched() {
    let events = Arc::new(RecordingSink::new());
    let registry = registry_over(Arc::new(MemoryStore::new()), events.clone());
    let (alice, bob) = (party("alice"), party("bob"));

    registry.create(&as_caller("alice"), &bob, 100, 50).unwrap();
    registry.pay(&as_caller("alice"), &alice, &bob, 40).unwrap();
    let before = registry.get(&alice, &bob).unwrap();

    let failures = [
        registry.pay(&as_caller("alice"), &alice, &bob, 61).map(|_| ()),
        registry.pay(&as_caller("bob"), &bob, &alice, 91).map(|_| ()),
        registry.pay(&as_caller("carol"), &alice, &bob, 1).map(|_| ()),
        registry.close(&as_caller("bob"), &alice),
        registry.create(&as_caller("bob"), &alice, 1, 1).map(|_| ()),
    ];
    assert!(failures.iter().all(Result::is_err));

    assert_eq!(registry.get(&alice, &bob).unwrap(), before);
    assert_eq!(events.len(), 2);
}

#[test]
fn event_feed_reflects_pair_and_polarity() {
    let events = Arc::new(RecordingSink::new());
    let registry = registry_over(Arc::new(MemoryStore::new()), events.clone());
    let (alice, bob) = (party("alice"), party("bob"));

    let key = registry.create(&as_caller("bob"), &alice, 10, 10).unwrap();
    registry.pay(&as_caller("bob"), &bob, &alice, 3).unwrap();

    let all = events.events();
    assert!(all.iter().all(|e| e.pair() == key));
    match &all[1] {
        LedgerEvent::PaymentRippled {
            resulting_magnitude,
            resulting_owed_by_low,
            ..
        } => {
            assert_eq!(*resulting_magnitude, 3);
            assert!(!*resulting_owed_by_low);
        }
        other => panic!("expected a payment, got {other:?}"),
    }
}

// ---------------------------------------------------------------------------
// Persistence
// ---------------------------------------------------------------------------

#[test]
fn sled_registry_survives_reopen() {
    let dir = tempfile::tempdir().expect("temp dir");
    let (alice, bob, carol) = (party("alice"), party("bob"), party("carol"));

    {
        let db = LedgerDb::open(dir.path()).expect("open db");
        let registry = registry_over(Arc::new(db), Arc::new(RecordingSink::new()));
        registry.create(&as_caller("alice"), &bob, 100, 50).unwrap();
        registry.create(&as_caller("carol"), &alice, 20, 20).unwrap();
        registry.pay(&as_caller("bob"), &bob, &alice, 30).unwrap();
        registry.flush().unwrap();
    }

    let db = LedgerDb::open(dir.path()).expect("reopen db");
    let registry = registry_over(Arc::new(db), Arc::new(RecordingSink::new()));

    let line = registry.get(&alice, &bob).unwrap();
    assert_eq!(line.magnitude, 30);
    assert!(!line.owed_by_low);
    assert_eq!(line.debtor(), Some(&bob));

    let alices = registry.lines_for(&alice, None, None).unwrap();
    assert_eq!(alices.len(), 2);
    assert!(alices.iter().any(|l| l.party_low == carol || l.party_high == carol));

    // The reopened registry keeps enforcing the stored ceilings.
    let err = registry.pay(&as_caller("bob"), &bob, &alice, 21).unwrap_err();
    assert!(matches!(err, LedgerError::LimitExceeded { .. }));
}

// ---------------------------------------------------------------------------
// Concurrency
// ---------------------------------------------------------------------------

#[test]
fn concurrent_payments_on_one_line_respect_the_ceiling() {
    const THREADS: usize = 8;
    const PAYMENTS_PER_THREAD: usize = 50;
    const CEILING: Amount = 1_000;

    let registry = Arc::new(CreditLineRegistry::in_memory());
    let (alice, bob) = (party("alice"), party("bob"));
    registry
        .create(&as_caller("alice"), &bob, CEILING, CEILING)
        .unwrap();

    let accepted = Arc::new(AtomicU64::new(0));
    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let registry = Arc::clone(&registry);
            let accepted = Arc::clone(&accepted);
            let (alice, bob) = (alice.clone(), bob.clone());
            thread::spawn(move || {
                let caller = Principal::authenticated(alice.clone());
                for _ in 0..PAYMENTS_PER_THREAD {
                    match registry.pay(&caller, &alice, &bob, 3) {
                        Ok((magnitude, _)) => {
                            assert!(magnitude <= CEILING);
                            accepted.fetch_add(3, Ordering::SeqCst);
                        }
                        Err(LedgerError::LimitExceeded { .. }) => {}
                        Err(other) => panic!("unexpected error: {other}"),
                    }
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().expect("payer thread panicked");
    }

    let line = registry.get(&alice, &bob).unwrap();
    assert!(line.owed_by_low);
    assert_eq!(line.magnitude, accepted.load(Ordering::SeqCst));
    assert!(line.magnitude <= CEILING);
    // 400 attempts of 3 against a ceiling of 1000: exactly 333 fit.
    assert_eq!(line.magnitude, 999);
}

#[test]
fn opposing_payers_net_to_the_difference() {
    let registry = Arc::new(CreditLineRegistry::new(
        LedgerConfig::default(),
        Arc::new(MemoryStore::new()),
        Arc::new(SystemClock),
        Arc::new(NullSink),
    )
    .unwrap());
    let (alice, bob) = (party("alice"), party("bob"));
    registry
        .create(&as_caller("alice"), &bob, 10_000, 10_000)
        .unwrap();

    let spawn_payer = |from: PartyId, to: PartyId, amount: Amount, times: usize| {
        let registry = Arc::clone(&registry);
        thread::spawn(move || {
            let caller = Principal::authenticated(from.clone());
            for _ in 0..times {
                registry.pay(&caller, &from, &to, amount).expect("within ceiling");
            }
        })
    };

    let a = spawn_payer(alice.clone(), bob.clone(), 5, 200);
    let b = spawn_payer(bob.clone(), alice.clone(), 2, 200);
    a.join().unwrap();
    b.join().unwrap();

    let line = registry.get(&alice, &bob).unwrap();
    assert_eq!((line.magnitude, line.owed_by_low), (600, true));
}

#[test]
fn independent_lines_do_not_interfere() {
    let registry = Arc::new(CreditLineRegistry::in_memory());
    let hub = party("hub");
    let spokes: Vec<PartyId> = (0..6).map(|i| party(&format!("spoke-{i}"))).collect();
    for spoke in &spokes {
        registry.create(&as_caller("hub"), spoke, 500, 500).unwrap();
    }

    let handles: Vec<_> = spokes
        .iter()
        .cloned()
        .map(|spoke| {
            let registry = Arc::clone(&registry);
            let hub = hub.clone();
            thread::spawn(move || {
                let caller = Principal::authenticated(spoke.clone());
                for _ in 0..100 {
                    registry.pay(&caller, &spoke, &hub, 1).unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    for spoke in &spokes {
        let line = registry.get(&hub, spoke).unwrap();
        assert_eq!(line.magnitude, 100);
        assert_eq!(line.debtor(), Some(spoke));
    }
    assert_eq!(registry.lines_for(&hub, None, Some(100)).unwrap().len(), 6);
}
