//! Request/response bodies for the mbz-daemon JSON API.

use mbz_checkout::FieldIssue;
use mbz_schemas::OrderStatus;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub ok: bool,
    pub service: &'static str,
    pub version: &'static str,
}

/// Uniform error body. `issues` is present only for checkout validation
/// failures, so the form can re-render with field-level messages.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issues: Option<Vec<FieldIssue>>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            issues: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Cart
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartAddRequest {
    pub product_id: Uuid,
    /// Defaults to 1.
    pub quantity: Option<u32>,
    /// Replace the stored quantity instead of incrementing.
    pub override_quantity: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartRemoveRequest {
    pub product_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartItemView {
    pub product_id: Uuid,
    pub title: String,
    pub quantity: u32,
    pub unit_price: Decimal,
    pub line_total: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartDetailResponse {
    /// Entries resolved against the live catalog; vanished products are
    /// dropped here but still counted in the store-level totals below.
    pub items: Vec<CartItemView>,
    pub total_quantity: u32,
    pub total_price: Decimal,
}

// ---------------------------------------------------------------------------
// Checkout
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutQuery {
    /// Single-product filter for "buy this one item" flows.
    pub product_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutResponse {
    pub order_ids: Vec<Uuid>,
    pub total: Decimal,
}

// ---------------------------------------------------------------------------
// Workflow
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowResponse {
    pub ok: bool,
    pub status: OrderStatus,
}

// ---------------------------------------------------------------------------
// Counters
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SellerCounters {
    /// Pending orders awaiting the seller's action.
    pub pending: i64,
    /// Waiting + completed orders, the dashboard's "sales" number.
    pub sales: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuyerCounters {
    /// Orders waiting for this buyer's confirmation.
    pub waiting: i64,
    /// Items currently in the session cart.
    pub cart_quantity: u32,
}
