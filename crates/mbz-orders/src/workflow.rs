//! Transition guards for the order status state machine.
//!
//! # State diagram
//!
//! ```text
//!              seller: request_complete      buyer: confirm_complete
//!   Pending ─────────────────────► Waiting ─────────────────────► Completed (term.)
//!      │
//!      │ buyer: request_cancel
//!      ▼
//!   Cancelled (term.)
//! ```
//!
//! Every guard checks authorization before state, and the two failures
//! are distinct variants: a wrong actor is never reported as "wrong
//! state" or "not found". The guards are deliberately not idempotent:
//! re-running `request_complete` on an already-Waiting order is a
//! [`WorkflowError::WrongState`], not a silent success.

use mbz_schemas::{Actor, OrderRecord, OrderStatus, Role};

// ---------------------------------------------------------------------------
// WorkflowError
// ---------------------------------------------------------------------------

/// Why a workflow transition was refused. Status is unchanged in every
/// variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkflowError {
    /// The referenced order does not exist.
    NotFound,
    /// The acting party is not the order's counterpart for this
    /// transition (wrong user, or right user in the wrong role).
    NotAuthorized,
    /// The order is not in the source state this transition requires.
    /// Raced callers land here: the loser of a concurrent conditional
    /// update observes the state the winner already wrote.
    WrongState {
        expected: OrderStatus,
        actual: OrderStatus,
    },
}

impl std::fmt::Display for WorkflowError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WorkflowError::NotFound => write!(f, "order not found"),
            WorkflowError::NotAuthorized => {
                write!(f, "you are not authorized to act on this order")
            }
            WorkflowError::WrongState { expected, actual } => {
                write!(f, "order is not {expected} (currently {actual})")
            }
        }
    }
}

impl std::error::Error for WorkflowError {}

// ---------------------------------------------------------------------------
// StatusTransition
// ---------------------------------------------------------------------------

/// A guard-approved status change, ready to be applied as a conditional
/// update (`set status = to where id = ... and status = from`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusTransition {
    pub from: OrderStatus,
    pub to: OrderStatus,
}

// ---------------------------------------------------------------------------
// Guards
// ---------------------------------------------------------------------------

/// Seller marks the order as fulfilled: `Pending → Waiting`.
///
/// The actor must be the seller owning the order's product and the order
/// must currently be Pending. On success the buyer is to be notified
/// (best-effort, by the caller, after the update lands).
pub fn request_complete(
    order: &OrderRecord,
    actor: &Actor,
) -> Result<StatusTransition, WorkflowError> {
    require_party(actor, Role::Seller, order.seller_id)?;
    require_status(order, OrderStatus::Pending)?;
    Ok(StatusTransition {
        from: OrderStatus::Pending,
        to: OrderStatus::Waiting,
    })
}

/// Buyer confirms completion: `Waiting → Completed`.
///
/// The actor must be the order's buyer and the order must currently be
/// Waiting. On success the seller is to be notified.
pub fn confirm_complete(
    order: &OrderRecord,
    actor: &Actor,
) -> Result<StatusTransition, WorkflowError> {
    require_party(actor, Role::Buyer, order.buyer_id)?;
    require_status(order, OrderStatus::Waiting)?;
    Ok(StatusTransition {
        from: OrderStatus::Waiting,
        to: OrderStatus::Completed,
    })
}

/// Buyer cancels before the seller has acted: `Pending → Cancelled`.
///
/// Cancellation is only reachable from Pending; once the seller has
/// marked the order fulfilled the buyer's move is confirm, not cancel.
pub fn request_cancel(
    order: &OrderRecord,
    actor: &Actor,
) -> Result<StatusTransition, WorkflowError> {
    require_party(actor, Role::Buyer, order.buyer_id)?;
    require_status(order, OrderStatus::Pending)?;
    Ok(StatusTransition {
        from: OrderStatus::Pending,
        to: OrderStatus::Cancelled,
    })
}

fn require_party(actor: &Actor, role: Role, counterpart: uuid::Uuid) -> Result<(), WorkflowError> {
    if actor.role != role || actor.user_id != counterpart {
        return Err(WorkflowError::NotAuthorized);
    }
    Ok(())
}

fn require_status(order: &OrderRecord, expected: OrderStatus) -> Result<(), WorkflowError> {
    if order.status != expected {
        return Err(WorkflowError::WrongState {
            expected,
            actual: order.status,
        });
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    fn order(status: OrderStatus) -> OrderRecord {
        OrderRecord {
            id: Uuid::new_v4(),
            buyer_id: Uuid::new_v4(),
            product_id: Uuid::new_v4(),
            seller_id: Uuid::new_v4(),
            quantity: 1,
            total_price: "10.00".parse().unwrap(),
            status,
            created_at: Utc::now(),
            address: Some("22 Bole Road".to_string()),
            phone: Some("0911000000".to_string()),
        }
    }

    fn seller_of(o: &OrderRecord) -> Actor {
        Actor {
            user_id: o.seller_id,
            role: Role::Seller,
        }
    }

    fn buyer_of(o: &OrderRecord) -> Actor {
        Actor {
            user_id: o.buyer_id,
            role: Role::Buyer,
        }
    }

    #[test]
    fn request_complete_succeeds_for_owning_seller_on_pending() {
        let o = order(OrderStatus::Pending);
        let t = request_complete(&o, &seller_of(&o)).unwrap();
        assert_eq!(t.from, OrderStatus::Pending);
        assert_eq!(t.to, OrderStatus::Waiting);
    }

    #[test]
    fn request_complete_rejects_wrong_seller() {
        let o = order(OrderStatus::Pending);
        let stranger = Actor {
            user_id: Uuid::new_v4(),
            role: Role::Seller,
        };
        assert_eq!(
            request_complete(&o, &stranger).unwrap_err(),
            WorkflowError::NotAuthorized
        );
    }

    #[test]
    fn request_complete_rejects_buyer_even_with_matching_id() {
        let o = order(OrderStatus::Pending);
        // Right user id, wrong role: still denied.
        let actor = Actor {
            user_id: o.seller_id,
            role: Role::Buyer,
        };
        assert_eq!(
            request_complete(&o, &actor).unwrap_err(),
            WorkflowError::NotAuthorized
        );
    }

    #[test]
    fn request_complete_twice_is_a_state_conflict_not_a_success() {
        let mut o = order(OrderStatus::Pending);
        let t = request_complete(&o, &seller_of(&o)).unwrap();
        o.status = t.to;

        let err = request_complete(&o, &seller_of(&o)).unwrap_err();
        assert_eq!(
            err,
            WorkflowError::WrongState {
                expected: OrderStatus::Pending,
                actual: OrderStatus::Waiting,
            }
        );
    }

    #[test]
    fn confirm_complete_succeeds_for_buyer_on_waiting() {
        let o = order(OrderStatus::Waiting);
        let t = confirm_complete(&o, &buyer_of(&o)).unwrap();
        assert_eq!(t.to, OrderStatus::Completed);
    }

    #[test]
    fn confirm_complete_rejects_non_waiting_states() {
        for status in [
            OrderStatus::Pending,
            OrderStatus::Completed,
            OrderStatus::Cancelled,
        ] {
            let o = order(status);
            let err = confirm_complete(&o, &buyer_of(&o)).unwrap_err();
            assert!(
                matches!(err, WorkflowError::WrongState { .. }),
                "{status:?} must be a state conflict"
            );
        }
    }

    #[test]
    fn confirm_complete_rejects_wrong_buyer() {
        let o = order(OrderStatus::Waiting);
        let stranger = Actor {
            user_id: Uuid::new_v4(),
            role: Role::Buyer,
        };
        assert_eq!(
            confirm_complete(&o, &stranger).unwrap_err(),
            WorkflowError::NotAuthorized
        );
    }

    #[test]
    fn authorization_is_checked_before_state() {
        // Wrong actor on a wrong-state order must surface as NotAuthorized,
        // never as WrongState.
        let o = order(OrderStatus::Completed);
        let stranger = Actor {
            user_id: Uuid::new_v4(),
            role: Role::Seller,
        };
        assert_eq!(
            request_complete(&o, &stranger).unwrap_err(),
            WorkflowError::NotAuthorized
        );
    }

    #[test]
    fn cancel_only_from_pending_and_only_by_buyer() {
        let o = order(OrderStatus::Pending);
        let t = request_cancel(&o, &buyer_of(&o)).unwrap();
        assert_eq!(t.to, OrderStatus::Cancelled);

        let waiting = order(OrderStatus::Waiting);
        assert!(matches!(
            request_cancel(&waiting, &buyer_of(&waiting)).unwrap_err(),
            WorkflowError::WrongState { .. }
        ));

        assert_eq!(
            request_cancel(&o, &seller_of(&o)).unwrap_err(),
            WorkflowError::NotAuthorized
        );
    }
}
