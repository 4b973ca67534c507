//! Standard adjustment priorities
//!
//! Lower priorities apply first. Contributors offset from these when they emit several
//! adjustments in one phase.

use std::cmp::Ordering;

/// Item subtotals.
pub const SUBTOTAL: f64 = 1.0;

/// Sale price reductions.
pub const SALE_PRICE: f64 = 1.10;

/// Shipping charges.
pub const SHIPPING: f64 = 2.0;

/// Cart-level coupon discounts.
pub const DISCOUNT: f64 = 2.10;

/// Offset from [`DISCOUNT`] for the product-level coupon phase.
pub const PRODUCT_DISCOUNT_OFFSET: f64 = 0.01;

/// Tax.
pub const TAX: f64 = 2.5;

/// Grand total marker.
pub const GRAND_TOTAL: f64 = 3.0;

/// Gift card redemptions.
pub const GIFT_CARD: f64 = 3.10;

/// Total order over priorities.
pub fn compare(left: f64, right: f64) -> Ordering {
    left.total_cmp(&right)
}

/// Whether two priorities name the same phase.
pub fn same(left: f64, right: f64) -> bool {
    compare(left, right).is_eq()
}
