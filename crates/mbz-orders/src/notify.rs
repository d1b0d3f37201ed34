//! Best-effort notifications for workflow transitions.
//!
//! Delivery transport (email, push, ...) lives outside this core; the
//! [`Notifier`] trait is the seam. The one rule that matters: a failed
//! send never fails or rolls back the state transition that triggered
//! it. [`notify_best_effort`] encodes that rule: it swallows the error
//! and leaves a warning in the log.

use mbz_schemas::OrderRecord;
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Notification
// ---------------------------------------------------------------------------

/// A message addressed to one user. The transport resolves the recipient
/// id to an address; this core never sees emails or phone tokens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub recipient: Uuid,
    pub subject: String,
    pub body: String,
}

impl Notification {
    /// Buyer-facing: the seller marked the order fulfilled; confirmation
    /// is needed to complete it.
    pub fn buyer_confirmation_needed(order: &OrderRecord, product_title: &str) -> Self {
        Notification {
            recipient: order.buyer_id,
            subject: "Order completion confirmation needed".to_string(),
            body: format!(
                "The seller has marked your order for {title} as completed.\n\
                 Quantity: {qty}\n\
                 Total price: {total}\n\
                 Please confirm the order completion.",
                title = product_title,
                qty = order.quantity,
                total = order.total_price,
            ),
        }
    }

    /// Seller-facing: the buyer confirmed completion.
    pub fn seller_order_completed(order: &OrderRecord, product_title: &str) -> Self {
        Notification {
            recipient: order.seller_id,
            subject: "Order completed".to_string(),
            body: format!(
                "The buyer has confirmed completion of the order for {product_title}."
            ),
        }
    }
}

// ---------------------------------------------------------------------------
// Notifier
// ---------------------------------------------------------------------------

/// Delivery failure. Carries a transport message only; the caller is not
/// expected to branch on it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotifyError(pub String);

impl std::fmt::Display for NotifyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "notification delivery failed: {}", self.0)
    }
}

impl std::error::Error for NotifyError {}

/// Transport seam. Production wires a mailer; tests use counting stubs.
pub trait Notifier: Send + Sync {
    fn send(&self, notification: &Notification) -> Result<(), NotifyError>;
}

/// Discards everything. Useful when no transport is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopNotifier;

impl Notifier for NoopNotifier {
    fn send(&self, _notification: &Notification) -> Result<(), NotifyError> {
        Ok(())
    }
}

/// Fire-and-forget send: failures are logged and swallowed, never
/// propagated. Call this only after the transition's conditional update
/// has reported success, so a lost race cannot notify.
pub fn notify_best_effort(notifier: &dyn Notifier, notification: Notification) {
    if let Err(err) = notifier.send(&notification) {
        warn!(
            recipient = %notification.recipient,
            subject = %notification.subject,
            %err,
            "notification dropped"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FailingNotifier {
        attempts: AtomicUsize,
    }

    impl Notifier for FailingNotifier {
        fn send(&self, _n: &Notification) -> Result<(), NotifyError> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            Err(NotifyError("smtp unreachable".to_string()))
        }
    }

    #[test]
    fn best_effort_swallows_delivery_failure() {
        let notifier = FailingNotifier {
            attempts: AtomicUsize::new(0),
        };
        let n = Notification {
            recipient: Uuid::new_v4(),
            subject: "s".to_string(),
            body: "b".to_string(),
        };
        // Must not panic or propagate.
        notify_best_effort(&notifier, n);
        assert_eq!(notifier.attempts.load(Ordering::SeqCst), 1);
    }
}
