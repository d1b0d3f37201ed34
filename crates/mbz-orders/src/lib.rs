//! Guarded transitions over an order's status.
//!
//! The guards here are pure: they look at an [`OrderRecord`] and an
//! [`Actor`] and either return the [`StatusTransition`] to perform or a
//! [`WorkflowError`]. Making the transition exactly-once is the storage
//! layer's job (`mbz-db` issues a single conditional UPDATE and checks
//! the affected-row count); the notification side effect is the caller's
//! job and must only fire after the conditional update reports success.
//! That ordering is what keeps concurrent racers from double-notifying.

mod notify;
mod workflow;

pub use notify::{notify_best_effort, NoopNotifier, Notification, Notifier, NotifyError};
pub use workflow::{
    confirm_complete, request_cancel, request_complete, StatusTransition, WorkflowError,
};
