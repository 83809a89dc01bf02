//! Concurrent calls against shared ledgers.
//!
//! Calls on one ledger are serialized by its mutex; calls on different
//! ledgers share only the value rail. Neither may break conservation.

use std::sync::Arc;
use std::thread;

use chrono::Duration;
use escrow_core::{Address, Amount, ManualClock, Timestamp};
use escrow_ledger::{InMemoryRail, SharedRail};
use escrow_registry::EscrowRegistry;
use parking_lot::Mutex;

fn addr(s: &str) -> Address {
    Address::new(s).unwrap()
}

fn setup(
    accounts: &[&str],
    funding: u64,
) -> (EscrowRegistry, ManualClock, Arc<Mutex<InMemoryRail>>) {
    let clock = ManualClock::new(Timestamp::parse("2026-06-01T00:00:00Z").unwrap());
    let mut rail = InMemoryRail::new();
    for who in accounts {
        rail.fund(&addr(who), Amount::new(funding)).unwrap();
    }
    let rail = Arc::new(Mutex::new(rail));
    let shared: SharedRail = rail.clone();
    (EscrowRegistry::new(Arc::new(clock.clone()), shared), clock, rail)
}

#[test]
fn concurrent_deposits_on_one_ledger_all_land() {
    let (registry, _clock, rail) = setup(&["alice", "bob"], 10_000);
    let escrow = registry
        .create_escrow(&addr("alice"), &addr("bob"), &addr("carol"), Duration::hours(1), None)
        .unwrap();

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let escrow = escrow.clone();
            let who = if i % 2 == 0 { "alice" } else { "bob" };
            thread::spawn(move || {
                for _ in 0..50 {
                    escrow.deposit(&addr(who), Amount::new(3)).unwrap();
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    let snap = escrow.snapshot();
    assert_eq!(snap.accounts.depositor, Amount::new(600));
    assert_eq!(snap.accounts.beneficiary, Amount::new(600));
    assert_eq!(snap.accounts.total_held, Amount::new(1_200));
    assert_eq!(rail.lock().custody(), Amount::new(1_200));
    assert!(escrow.with(|l| l.conservation_holds()));
    assert_eq!(escrow.with(|l| l.events().len()), 400);
}

#[test]
fn racing_withdrawals_pay_out_once() {
    let (registry, clock, rail) = setup(&["alice"], 500);
    let escrow = registry
        .create_escrow(&addr("alice"), &addr("bob"), &addr("carol"), Duration::hours(1), None)
        .unwrap();
    escrow.deposit(&addr("alice"), Amount::new(500)).unwrap();
    clock.advance(Duration::hours(1)).unwrap();

    let handles: Vec<_> = (0..6)
        .map(|_| {
            let escrow = escrow.clone();
            thread::spawn(move || escrow.withdraw_after_deadline(&addr("alice")).unwrap().len())
        })
        .collect();
    let payouts: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();

    assert_eq!(payouts, 1);
    assert_eq!(rail.lock().balance_of(&addr("alice")), Amount::new(500));
    assert_eq!(rail.lock().custody(), Amount::ZERO);
}

#[test]
fn racing_settlement_and_grace_refund_exactly_one_wins() {
    let (registry, _clock, rail) = setup(&["alice", "bob"], 1_000);
    let escrow = registry
        .create_escrow(
            &addr("alice"),
            &addr("bob"),
            &addr("carol"),
            Duration::hours(10),
            Some(Duration::hours(5)),
        )
        .unwrap();
    escrow.deposit(&addr("alice"), Amount::new(400)).unwrap();
    escrow.deposit(&addr("bob"), Amount::new(100)).unwrap();
    escrow.lock_deposits(&addr("carol")).unwrap();

    let settle = {
        let escrow = escrow.clone();
        thread::spawn(move || escrow.settle(&addr("carol"), Amount::new(400), Amount::new(100)))
    };
    let refund = {
        let escrow = escrow.clone();
        thread::spawn(move || escrow.grace_period_withdraw(&addr("bob")))
    };
    let settled = settle.join().unwrap();
    let refunded = refund.join().unwrap();

    // Whichever runs second finds nothing left: settlement then fails its
    // split check, or the refund finds both balances zero.
    assert!(settled.is_ok() || refunded.as_ref().map(|e| !e.is_empty()).unwrap_or(false));
    assert_eq!(escrow.snapshot().accounts.total_held, Amount::ZERO);
    assert_eq!(rail.lock().balance_of(&addr("alice")), Amount::new(1_000));
    assert_eq!(rail.lock().balance_of(&addr("bob")), Amount::new(1_000));
    assert_eq!(rail.lock().custody(), Amount::ZERO);
}

#[test]
fn many_ledgers_share_one_rail() {
    let names = ["a0", "a1", "a2", "a3", "a4", "a5"];
    let (registry, clock, rail) = setup(&names, 1_000);
    let registry = Arc::new(registry);

    let handles: Vec<_> = names
        .iter()
        .map(|name| {
            let registry = Arc::clone(&registry);
            let name = name.to_string();
            thread::spawn(move || {
                let escrow = registry
                    .create_escrow(
                        &addr(&name),
                        &addr("bob"),
                        &addr("carol"),
                        Duration::hours(1),
                        None,
                    )
                    .unwrap();
                for _ in 0..10 {
                    escrow.deposit(&addr(&name), Amount::new(25)).unwrap();
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    assert_eq!(registry.len(), names.len());
    assert_eq!(rail.lock().custody(), Amount::new(250 * names.len() as u64));

    clock.advance(Duration::hours(1)).unwrap();
    for escrow in registry.all_escrows() {
        let depositor = escrow.snapshot().parties.depositor;
        escrow.withdraw_after_deadline(&depositor).unwrap();
        assert!(escrow.with(|l| l.conservation_holds()));
    }
    assert_eq!(rail.lock().custody(), Amount::ZERO);
    for name in names {
        assert_eq!(rail.lock().balance_of(&addr(name)), Amount::new(1_000));
    }
}
