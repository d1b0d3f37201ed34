//! Shared domain types for the minibazaar core.
//!
//! Everything here is a plain serde-able value: no I/O, no framework
//! types. Crates downstream (cart, checkout, orders, db, daemon) agree
//! on these shapes; the single-char status codes are the storage
//! contract for the `orders` table.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// OrderStatus
// ---------------------------------------------------------------------------

/// Lifecycle status of a persisted order.
///
/// Transitions are monotonic along `Pending → Waiting → Completed`;
/// `Cancelled` is reachable only from `Pending`. The guards live in
/// `mbz-orders`; this type only knows the states and their codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Freshly placed; the seller has not acted yet.
    Pending,
    /// Seller marked the order complete; waiting for buyer confirmation.
    Waiting,
    /// Buyer confirmed completion. **Terminal.**
    Completed,
    /// Buyer cancelled before the seller acted. **Terminal.**
    Cancelled,
}

impl OrderStatus {
    /// Single-char code persisted in the `status` column.
    pub fn as_code(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "P",
            OrderStatus::Waiting => "W",
            OrderStatus::Completed => "C",
            OrderStatus::Cancelled => "X",
        }
    }

    /// Parse a stored status code. Returns `None` for anything the check
    /// constraint on the column would have rejected anyway.
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "P" => Some(OrderStatus::Pending),
            "W" => Some(OrderStatus::Waiting),
            "C" => Some(OrderStatus::Completed),
            "X" => Some(OrderStatus::Cancelled),
            _ => None,
        }
    }

    /// Returns `true` if no further transitions are possible.
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Completed | OrderStatus::Cancelled)
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Waiting => "waiting for buyer confirmation",
            OrderStatus::Completed => "completed",
            OrderStatus::Cancelled => "cancelled",
        };
        write!(f, "{s}")
    }
}

// ---------------------------------------------------------------------------
// Role / Actor
// ---------------------------------------------------------------------------

/// The two party roles in a transaction. Resolved once per request by the
/// hosting layer and passed down explicitly; handlers never re-derive it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Buyer,
    Seller,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Buyer => "buyer",
            Role::Seller => "seller",
        }
    }
}

/// An authenticated party acting on an order or cart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub user_id: Uuid,
    pub role: Role,
}

// ---------------------------------------------------------------------------
// ProductSnapshot
// ---------------------------------------------------------------------------

/// Read-model of a product as the cart/checkout core sees it. The full
/// product record (images, categories, stock flags, ...) belongs to the
/// catalog layer; this is the slice the core joins against.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductSnapshot {
    pub id: Uuid,
    pub seller_id: Uuid,
    pub title: String,
    /// Current list price. The cart snapshots this at add-time; checkout
    /// totals always use the server-held snapshot, never client input.
    pub price: Decimal,
    pub is_active: bool,
}

// ---------------------------------------------------------------------------
// Orders
// ---------------------------------------------------------------------------

/// Insert shape for one purchased line item. Produced by the checkout
/// assembler, consumed by `mbz_db::insert_orders`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewOrder {
    pub buyer_id: Uuid,
    pub product_id: Uuid,
    pub quantity: u32,
    pub total_price: Decimal,
    pub address: String,
    pub phone: String,
}

/// A persisted order row, joined with its product's seller.
///
/// `seller_id` is not a column on `orders`; it is resolved through the
/// product join so workflow guards can check ownership without a second
/// query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRecord {
    pub id: Uuid,
    pub buyer_id: Uuid,
    pub product_id: Uuid,
    pub seller_id: Uuid,
    pub quantity: u32,
    pub total_price: Decimal,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
    pub address: Option<String>,
    pub phone: Option<String>,
}
