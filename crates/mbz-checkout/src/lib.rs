//! Reconciles a cart with a submitted order form.
//!
//! # Design
//!
//! [`process`] is a pure function: it takes the current [`CartState`], a
//! catalog view, and a [`CheckoutSubmission`], and returns either the
//! orders to create plus the **updated** cart value, or a
//! [`CheckoutError`]. No storage is touched here; the caller persists the
//! returned orders and cart only after the whole submission has been
//! accepted, so a rejected submission never leaves partial state behind.
//!
//! Price handling: the submission carries product ids, selection flags
//! and quantities, never a price. Line totals are always
//! `cart unit_price snapshot × submitted quantity`, so form manipulation
//! cannot tamper with what the buyer is charged.

use std::collections::HashMap;

use mbz_cart::CartState;
use mbz_schemas::{NewOrder, ProductSnapshot};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Submission types
// ---------------------------------------------------------------------------

/// Per-line selection state, submitted as a structured array. One element
/// per cart line the client saw; lines absent from the array are treated
/// as unselected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineSelection {
    pub product_id: Uuid,
    pub selected: bool,
    /// Quantity override for this line. Must be ≥ 1 when selected; a zero
    /// here is a form error, not a "remove this line" request.
    pub quantity: u32,
}

/// The checkout form as submitted by the buyer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutSubmission {
    pub address: String,
    pub phone: String,
    pub lines: Vec<LineSelection>,
}

// ---------------------------------------------------------------------------
// CheckoutError
// ---------------------------------------------------------------------------

/// A field-level validation problem, suitable for re-rendering the form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldIssue {
    /// Field path, e.g. `"address"` or `"lines[2].quantity"`.
    pub field: String,
    pub message: String,
}

/// Why a checkout submission was rejected. No orders are created and the
/// cart is untouched in every variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckoutError {
    /// Cart resolves to no purchasable items (empty, or every entry's
    /// product has disappeared from the catalog).
    EmptyCart,
    /// The single-product filter references a product that is not in the
    /// cart.
    ItemNotInCart { product_id: Uuid },
    /// Malformed submission: missing address/phone, or a selected line
    /// with quantity 0.
    Invalid(Vec<FieldIssue>),
    /// The form was valid but no line was selected.
    NothingSelected,
}

impl std::fmt::Display for CheckoutError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CheckoutError::EmptyCart => {
                write!(f, "cart is empty or contains invalid items")
            }
            CheckoutError::ItemNotInCart { product_id } => {
                write!(f, "product {product_id} is not in the cart")
            }
            CheckoutError::Invalid(issues) => {
                write!(f, "invalid submission: ")?;
                for (i, issue) in issues.iter().enumerate() {
                    if i > 0 {
                        write!(f, "; ")?;
                    }
                    write!(f, "{}: {}", issue.field, issue.message)?;
                }
                Ok(())
            }
            CheckoutError::NothingSelected => {
                write!(f, "select at least one product to order")
            }
        }
    }
}

impl std::error::Error for CheckoutError {}

// ---------------------------------------------------------------------------
// CheckoutOutcome
// ---------------------------------------------------------------------------

/// Successful assembly: orders to persist, the cart after consuming the
/// ordered quantities, and the grand total over selected lines.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckoutOutcome {
    pub orders: Vec<NewOrder>,
    /// Cart with consumed entries decremented or removed. Unselected
    /// entries are untouched; the cart is never globally cleared.
    pub cart: CartState,
    pub total: Decimal,
}

// ---------------------------------------------------------------------------
// process
// ---------------------------------------------------------------------------

/// Assemble a checkout submission into orders.
///
/// `filter` narrows the candidate lines to a single product for
/// "buy this one item" flows; `None` considers the whole cart.
///
/// # Errors
/// See [`CheckoutError`]. The checks run in this order: filter miss,
/// empty cart, field validation, nothing selected, so an empty cart is
/// reported as such even when the address fields are also blank.
pub fn process(
    cart: &CartState,
    catalog: &HashMap<Uuid, ProductSnapshot>,
    filter: Option<Uuid>,
    buyer_id: Uuid,
    submission: &CheckoutSubmission,
) -> Result<CheckoutOutcome, CheckoutError> {
    // Candidate lines: cart entries that still resolve to a product,
    // narrowed by the optional single-product filter.
    let candidates: Vec<_> = cart
        .items(catalog)
        .filter(|item| filter.map_or(true, |pid| item.product.id == pid))
        .map(|item| (item.product.clone(), item.quantity, item.unit_price))
        .collect();

    if let Some(product_id) = filter {
        if candidates.is_empty() && !cart.contains(product_id) {
            return Err(CheckoutError::ItemNotInCart { product_id });
        }
    }
    if candidates.is_empty() {
        return Err(CheckoutError::EmptyCart);
    }

    let selections: HashMap<Uuid, &LineSelection> = submission
        .lines
        .iter()
        .map(|line| (line.product_id, line))
        .collect();

    validate(submission, &candidates, &selections)?;

    let mut orders = Vec::new();
    let mut updated = cart.clone();
    let mut total = Decimal::ZERO;

    for (product, _cart_qty, unit_price) in &candidates {
        let Some(line) = selections.get(&product.id) else {
            continue;
        };
        if !line.selected {
            continue;
        }

        let line_total = *unit_price * Decimal::from(line.quantity);
        orders.push(NewOrder {
            buyer_id,
            product_id: product.id,
            quantity: line.quantity,
            total_price: line_total,
            address: submission.address.trim().to_string(),
            phone: submission.phone.trim().to_string(),
        });
        total += line_total;
        updated.consume(product.id, line.quantity);
    }

    if orders.is_empty() {
        return Err(CheckoutError::NothingSelected);
    }

    Ok(CheckoutOutcome {
        orders,
        cart: updated,
        total,
    })
}

/// Field-level checks: non-empty shipping fields, and quantity ≥ 1 on
/// every selected line that matches a candidate.
fn validate(
    submission: &CheckoutSubmission,
    candidates: &[(ProductSnapshot, u32, Decimal)],
    selections: &HashMap<Uuid, &LineSelection>,
) -> Result<(), CheckoutError> {
    let mut issues = Vec::new();

    if submission.address.trim().is_empty() {
        issues.push(FieldIssue {
            field: "address".to_string(),
            message: "address is required".to_string(),
        });
    }
    if submission.phone.trim().is_empty() {
        issues.push(FieldIssue {
            field: "phone".to_string(),
            message: "phone number is required".to_string(),
        });
    }

    for (product, _, _) in candidates {
        if let Some(line) = selections.get(&product.id) {
            if line.selected && line.quantity == 0 {
                issues.push(FieldIssue {
                    field: format!("lines[{}].quantity", product.id),
                    message: "quantity must be at least 1".to_string(),
                });
            }
        }
    }

    if issues.is_empty() {
        Ok(())
    } else {
        Err(CheckoutError::Invalid(issues))
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
