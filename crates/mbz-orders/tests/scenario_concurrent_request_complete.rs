//! Scenario: two concurrent `request_complete` calls on one Pending order.
//!
//! # Invariant under test
//! With conditional-update semantics ("set status to Waiting where status
//! is Pending", observing the affected-row count), exactly one caller
//! wins regardless of interleaving: the order ends Waiting exactly once,
//! the loser observes a state conflict, and the buyer is notified exactly
//! once because notification is gated on the winning update.
//!
//! The ledger here is an in-memory double with the same contract the
//! Postgres layer exposes; the DB-backed version of this scenario lives
//! in mbz-db's ignored tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use chrono::Utc;
use mbz_orders::{notify_best_effort, Notification, Notifier, NotifyError};
use mbz_schemas::{Actor, OrderRecord, OrderStatus, Role};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Doubles
// ---------------------------------------------------------------------------

/// Conditional-transition ledger: `transition` succeeds iff the stored
/// status equals `from`, atomically. Mirrors `mbz_db::transition_status`.
struct MemLedger {
    statuses: Mutex<HashMap<Uuid, OrderStatus>>,
}

impl MemLedger {
    fn new() -> Self {
        Self {
            statuses: Mutex::new(HashMap::new()),
        }
    }

    fn insert(&self, id: Uuid, status: OrderStatus) {
        self.statuses.lock().unwrap().insert(id, status);
    }

    fn get(&self, id: Uuid) -> Option<OrderStatus> {
        self.statuses.lock().unwrap().get(&id).copied()
    }

    /// Atomic compare-and-set on the status field. Returns `true` when
    /// exactly one "row" was affected.
    fn transition(&self, id: Uuid, from: OrderStatus, to: OrderStatus) -> bool {
        let mut map = self.statuses.lock().unwrap();
        match map.get(&id) {
            Some(current) if *current == from => {
                map.insert(id, to);
                true
            }
            _ => false,
        }
    }
}

struct CountingNotifier {
    sent: AtomicUsize,
}

impl Notifier for CountingNotifier {
    fn send(&self, _n: &Notification) -> Result<(), NotifyError> {
        self.sent.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

fn pending_order() -> OrderRecord {
    OrderRecord {
        id: Uuid::new_v4(),
        buyer_id: Uuid::new_v4(),
        product_id: Uuid::new_v4(),
        seller_id: Uuid::new_v4(),
        quantity: 2,
        total_price: "20.00".parse().unwrap(),
        status: OrderStatus::Pending,
        created_at: Utc::now(),
        address: Some("22 Bole Road".to_string()),
        phone: Some("0911000000".to_string()),
    }
}

// ---------------------------------------------------------------------------
// The race
// ---------------------------------------------------------------------------

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_request_complete_ends_waiting_exactly_once() {
    let order = pending_order();
    let seller = Actor {
        user_id: order.seller_id,
        role: Role::Seller,
    };

    let ledger = Arc::new(MemLedger::new());
    ledger.insert(order.id, OrderStatus::Pending);
    let notifier = Arc::new(CountingNotifier {
        sent: AtomicUsize::new(0),
    });

    let barrier = Arc::new(tokio::sync::Barrier::new(2));
    let mut handles = Vec::new();

    for _ in 0..2 {
        let order = order.clone();
        let ledger = Arc::clone(&ledger);
        let notifier = Arc::clone(&notifier);
        let barrier = Arc::clone(&barrier);

        handles.push(tokio::spawn(async move {
            // Both tasks read the same Pending snapshot: the guard passes
            // for both. Only the conditional update decides the winner.
            let transition = mbz_orders::request_complete(&order, &seller)
                .expect("guard must pass on the Pending snapshot");

            barrier.wait().await;

            let won = ledger.transition(order.id, transition.from, transition.to);
            if won {
                notify_best_effort(
                    notifier.as_ref(),
                    Notification::buyer_confirmation_needed(&order, "widget"),
                );
            }
            won
        }));
    }

    let mut wins = 0;
    for h in handles {
        if h.await.unwrap() {
            wins += 1;
        }
    }

    assert_eq!(wins, 1, "exactly one racer may apply the transition");
    assert_eq!(ledger.get(order.id), Some(OrderStatus::Waiting));
    assert_eq!(
        notifier.sent.load(Ordering::SeqCst),
        1,
        "the losing racer must not notify"
    );
}

#[tokio::test]
async fn loser_observes_wrong_state_on_reread() {
    let mut order = pending_order();
    let seller = Actor {
        user_id: order.seller_id,
        role: Role::Seller,
    };

    let ledger = MemLedger::new();
    ledger.insert(order.id, OrderStatus::Pending);

    // Winner applies the transition.
    let t = mbz_orders::request_complete(&order, &seller).unwrap();
    assert!(ledger.transition(order.id, t.from, t.to));

    // Loser re-reads and runs the guard against the fresh state: the
    // refusal is an explicit state conflict, not a silent success.
    order.status = ledger.get(order.id).unwrap();
    let err = mbz_orders::request_complete(&order, &seller).unwrap_err();
    assert_eq!(
        err,
        mbz_orders::WorkflowError::WrongState {
            expected: OrderStatus::Pending,
            actual: OrderStatus::Waiting,
        }
    );
}
