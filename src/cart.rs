//! Checkout totals for a list of scanned products.

use serde::{Deserialize, Serialize};

use crate::catalog::{self, Product};

pub const TAX_RATE: f64 = 0.08;

#[derive(Debug, Clone, Deserialize)]
pub struct CartLine {
    pub id: u32,
    pub quantity: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct CartItem {
    pub product: &'static Product,
    pub quantity: u32,
    pub line_total: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct CartTotals {
    pub items: Vec<CartItem>,
    pub subtotal: f64,
    pub tax: f64,
    pub total: f64,
}

/// Prices `lines` against the catalog.
///
/// Lines for the same product are merged in first-seen order. Unknown ids and
/// zero quantities are dropped.
pub fn compute_totals(lines: &[CartLine]) -> CartTotals {
    let mut merged: Vec<(&'static Product, u32)> = Vec::new();

    for line in lines.iter().filter(|line| line.quantity > 0) {
        let Some(product) = catalog::find_by_product_id(line.id) else {
            continue;
        };
        match merged.iter_mut().find(|(p, _)| p.id == product.id) {
            Some((_, quantity)) => *quantity = quantity.saturating_add(line.quantity),
            None => merged.push((product, line.quantity)),
        }
    }

    let items: Vec<CartItem> = merged
        .into_iter()
        .map(|(product, quantity)| CartItem {
            product,
            quantity,
            line_total: round_cents(product.price * quantity as f64),
        })
        .collect();

    let subtotal = round_cents(items.iter().map(|item| item.line_total).sum());
    let tax = round_cents(subtotal * TAX_RATE);

    CartTotals {
        items,
        subtotal,
        tax,
        total: round_cents(subtotal + tax),
    }
}

fn round_cents(amount: f64) -> f64 {
    (amount * 100.0).round() / 100.0
}
