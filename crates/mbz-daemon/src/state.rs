//! Shared runtime state for mbz-daemon.
//!
//! The daemon is the hosting layer the cart core was designed for: it
//! owns the session-keyed `CartState` values and persists them across
//! requests (in-memory here; carts are session-scoped and disposable,
//! orders are what the database keeps). Handlers receive
//! `State<Arc<AppState>>` from Axum; this module owns nothing async
//! itself.

use std::collections::HashMap;
use std::sync::Arc;

use mbz_cart::CartState;
use mbz_orders::{Notification, Notifier, NotifyError};
use sqlx::PgPool;
use tokio::sync::RwLock;
use tracing::info;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// BuildInfo
// ---------------------------------------------------------------------------

/// Static build metadata included in the health response.
#[derive(Clone, Debug)]
pub struct BuildInfo {
    pub service: &'static str,
    pub version: &'static str,
}

// ---------------------------------------------------------------------------
// AppState
// ---------------------------------------------------------------------------

/// Cloneable (Arc) handle shared across all Axum handlers.
pub struct AppState {
    /// Order ledger + product catalog.
    pub pool: PgPool,
    /// Session carts, keyed by buyer id. Buyer sessions map one-to-one
    /// onto buyer identity here; a cookie-session layer would key by
    /// session id instead and nothing below this map would change.
    pub carts: RwLock<HashMap<Uuid, CartState>>,
    /// Workflow notification transport.
    pub notifier: Arc<dyn Notifier>,
    /// Static build metadata.
    pub build: BuildInfo,
}

impl AppState {
    pub fn new(pool: PgPool, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            pool,
            carts: RwLock::new(HashMap::new()),
            notifier,
            build: BuildInfo {
                service: "mbz-daemon",
                version: env!("CARGO_PKG_VERSION"),
            },
        }
    }
}

// ---------------------------------------------------------------------------
// LogNotifier
// ---------------------------------------------------------------------------

/// Default transport: writes the notification to the log. The real
/// mailer sits outside this core; swapping it in is one `Arc<dyn
/// Notifier>` at startup.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn send(&self, notification: &Notification) -> Result<(), NotifyError> {
        info!(
            recipient = %notification.recipient,
            subject = %notification.subject,
            "notification"
        );
        Ok(())
    }
}
