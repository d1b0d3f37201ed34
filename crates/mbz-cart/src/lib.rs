//! An explicit, session-scoped cart value object.
//!
//! # Design
//!
//! `CartState` owns nothing ambient: every operation mutates the value it
//! is called on, and the hosting layer is responsible for persisting the
//! whole struct keyed by session/buyer id (it is serde-able for exactly
//! that reason). Entries snapshot the product's price at add-time; the
//! live product record is only consulted when the cart is resolved into
//! line items via [`CartState::items`].
//!
//! Missing products are a resolution-time concern, not a store-level
//! error: an entry whose product no longer exists in the catalog view is
//! silently dropped from iteration but stays in the map until removed or
//! consumed by checkout.

use std::collections::{BTreeMap, HashMap};

use mbz_schemas::ProductSnapshot;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// CartEntry
// ---------------------------------------------------------------------------

/// One product's slot in the cart: quantity plus the unit price snapshot
/// taken when the product was first added.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartEntry {
    pub quantity: u32,
    pub unit_price: Decimal,
}

// ---------------------------------------------------------------------------
// CartState
// ---------------------------------------------------------------------------

/// Session-scoped mapping from product id to quantity/price snapshot.
///
/// `BTreeMap` keeps iteration order stable across serialize/deserialize
/// round trips, so rendered cart pages do not reshuffle between requests.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CartState {
    entries: BTreeMap<Uuid, CartEntry>,
}

impl CartState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a product to the cart.
    ///
    /// First add initializes the entry with `quantity` and the product's
    /// current price. Subsequent adds increment the quantity, or replace
    /// it when `override_quantity` is set. The price snapshot is never
    /// refreshed by a later add.
    pub fn add(&mut self, product: &ProductSnapshot, quantity: u32, override_quantity: bool) {
        let entry = self.entries.entry(product.id).or_insert(CartEntry {
            quantity: 0,
            unit_price: product.price,
        });
        if override_quantity {
            entry.quantity = quantity;
        } else {
            entry.quantity = entry.quantity.saturating_add(quantity);
        }
        if entry.quantity == 0 {
            self.entries.remove(&product.id);
        }
    }

    /// Remove a product's entry. No-op when the product is not in the cart.
    pub fn remove(&mut self, product_id: Uuid) {
        self.entries.remove(&product_id);
    }

    /// Discard the whole mapping.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, product_id: Uuid) -> bool {
        self.entries.contains_key(&product_id)
    }

    pub fn entry(&self, product_id: Uuid) -> Option<&CartEntry> {
        self.entries.get(&product_id)
    }

    /// Product ids currently in the cart, in stable order. The hosting
    /// layer uses this to fetch the catalog view before resolving items.
    pub fn product_ids(&self) -> Vec<Uuid> {
        self.entries.keys().copied().collect()
    }

    /// Sum of all entry quantities.
    pub fn total_quantity(&self) -> u32 {
        self.entries.values().map(|e| e.quantity).sum()
    }

    /// Sum of `unit_price × quantity` over all entries, resolved or not.
    pub fn total_price(&self) -> Decimal {
        self.entries
            .values()
            .map(|e| e.unit_price * Decimal::from(e.quantity))
            .sum()
    }

    /// Resolve entries against a catalog view into renderable line items.
    ///
    /// Lazy and restartable: the iterator borrows both the cart and the
    /// catalog, so it can be re-run after a failed submission without
    /// re-fetching anything. Entries with no matching product are dropped.
    pub fn items<'a>(
        &'a self,
        catalog: &'a HashMap<Uuid, ProductSnapshot>,
    ) -> impl Iterator<Item = CartItem<'a>> + 'a {
        self.entries.iter().filter_map(move |(product_id, entry)| {
            let product = catalog.get(product_id)?;
            Some(CartItem {
                product,
                quantity: entry.quantity,
                unit_price: entry.unit_price,
                line_total: entry.unit_price * Decimal::from(entry.quantity),
            })
        })
    }

    /// Decrement an entry by the quantity consumed at checkout; the entry
    /// is removed entirely when fully consumed. No-op for unknown products.
    pub fn consume(&mut self, product_id: Uuid, quantity: u32) {
        if let Some(entry) = self.entries.get_mut(&product_id) {
            let remaining = entry.quantity.saturating_sub(quantity);
            if remaining == 0 {
                self.entries.remove(&product_id);
            } else {
                entry.quantity = remaining;
            }
        }
    }
}

// ---------------------------------------------------------------------------
// CartItem
// ---------------------------------------------------------------------------

/// A cart entry joined with its live product record.
#[derive(Debug, Clone, PartialEq)]
pub struct CartItem<'a> {
    pub product: &'a ProductSnapshot,
    pub quantity: u32,
    /// Price snapshot from add-time (may differ from `product.price`).
    pub unit_price: Decimal,
    pub line_total: Decimal,
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    fn product(price: &str) -> ProductSnapshot {
        ProductSnapshot {
            id: Uuid::new_v4(),
            seller_id: Uuid::new_v4(),
            title: "widget".to_string(),
            price: price.parse().unwrap(),
            is_active: true,
        }
    }

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    #[test]
    fn first_add_snapshots_price_and_quantity() {
        let p = product("10.00");
        let mut cart = CartState::new();
        cart.add(&p, 2, false);

        let e = cart.entry(p.id).unwrap();
        assert_eq!(e.quantity, 2);
        assert_eq!(e.unit_price, dec("10.00"));
    }

    #[test]
    fn repeated_add_increments_override_replaces() {
        let p = product("4.50");
        let mut cart = CartState::new();
        cart.add(&p, 1, false);
        cart.add(&p, 2, false);
        assert_eq!(cart.entry(p.id).unwrap().quantity, 3);

        cart.add(&p, 5, true);
        assert_eq!(cart.entry(p.id).unwrap().quantity, 5);
    }

    #[test]
    fn later_add_keeps_original_price_snapshot() {
        let mut p = product("10.00");
        let mut cart = CartState::new();
        cart.add(&p, 1, false);

        // Catalog price changes after the first add.
        p.price = dec("12.00");
        cart.add(&p, 1, false);

        assert_eq!(cart.entry(p.id).unwrap().unit_price, dec("10.00"));
        assert_eq!(cart.total_price(), dec("20.00"));
    }

    #[test]
    fn totals_track_add_and_remove() {
        let a = product("10.00");
        let b = product("2.25");
        let mut cart = CartState::new();
        cart.add(&a, 2, false);
        cart.add(&b, 4, false);

        assert_eq!(cart.total_quantity(), 6);
        assert_eq!(cart.total_price(), dec("29.00"));

        cart.remove(a.id);
        assert_eq!(cart.total_quantity(), 4);
        assert_eq!(cart.total_price(), dec("9.00"));

        // Removing an absent product is a no-op.
        cart.remove(a.id);
        assert_eq!(cart.total_quantity(), 4);
    }

    #[test]
    fn override_to_zero_removes_entry() {
        let p = product("1.00");
        let mut cart = CartState::new();
        cart.add(&p, 3, false);
        cart.add(&p, 0, true);
        assert!(!cart.contains(p.id));
        assert_eq!(cart.total_quantity(), 0);
    }

    #[test]
    fn items_drop_entries_with_missing_products() {
        let a = product("3.00");
        let b = product("5.00");
        let mut cart = CartState::new();
        cart.add(&a, 1, false);
        cart.add(&b, 2, false);

        // Catalog only knows product b; a was deleted out-of-band.
        let mut catalog = HashMap::new();
        catalog.insert(b.id, b.clone());

        let items: Vec<_> = cart.items(&catalog).collect();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].product.id, b.id);
        assert_eq!(items[0].line_total, dec("10.00"));

        // The unresolvable entry is dropped from iteration, not the store.
        assert!(cart.contains(a.id));
    }

    #[test]
    fn items_iterator_is_restartable() {
        let p = product("2.00");
        let mut cart = CartState::new();
        cart.add(&p, 1, false);

        let mut catalog = HashMap::new();
        catalog.insert(p.id, p.clone());

        assert_eq!(cart.items(&catalog).count(), 1);
        assert_eq!(cart.items(&catalog).count(), 1);
    }

    #[test]
    fn consume_decrements_and_removes_when_exhausted() {
        let p = product("1.00");
        let mut cart = CartState::new();
        cart.add(&p, 5, false);

        cart.consume(p.id, 2);
        assert_eq!(cart.entry(p.id).unwrap().quantity, 3);

        cart.consume(p.id, 3);
        assert!(!cart.contains(p.id));
    }

    #[test]
    fn clear_discards_everything() {
        let mut cart = CartState::new();
        cart.add(&product("1.00"), 1, false);
        cart.add(&product("2.00"), 2, false);
        cart.clear();
        assert!(cart.is_empty());
        assert_eq!(cart.total_price(), Decimal::ZERO);
    }

    #[test]
    fn serde_round_trip_preserves_entries() {
        let p = product("7.75");
        let mut cart = CartState::new();
        cart.add(&p, 2, false);

        let json = serde_json::to_string(&cart).unwrap();
        let back: CartState = serde_json::from_str(&json).unwrap();
        assert_eq!(back, cart);
    }
}
