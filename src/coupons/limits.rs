//! Usage limits
//!
//! A coupon's limits document decides how many units it may discount in a given cart. Unknown
//! keys are ignored; malformed values are treated as absent.

use rust_decimal::{
    Decimal,
    prelude::{FromPrimitive, ToPrimitive},
};
use rustc_hash::FxHashMap;
use serde_json::{Map, Value};
use smallvec::SmallVec;

/// Usable quantity for a coupon whose limits allow unlimited use.
pub const UNLIMITED_USAGE: u32 = 9999;

const PRODUCT_IN_CART: &str = "product_in_cart";
const PRODUCTS_IN_CART: &str = "products_in_cart";
const PRODUCTS_IN_QTY: &str = "products_in_qty";
const MAX_USAGE_QTY: &str = "max_usage_qty";

/// Evaluate a limits document against the cart's quantities per product.
///
/// Returns 0 when a presence or quantity requirement fails. Otherwise returns the smallest of
/// the `products_in_qty` multiples and a positive `max_usage_qty`, [`UNLIMITED_USAGE`] when
/// `max_usage_qty` is `-1` and nothing else bounded the result, and 1 when no limit applies.
pub fn evaluate_limits(limits: &Map<String, Value>, quantities: &FxHashMap<String, u32>) -> u32 {
    let present = |product: &String| quantities.get(product).is_some_and(|qty| *qty > 0);

    let mut usable: Option<u32> = None;
    let mut max_usage: Option<i64> = None;

    for (key, value) in limits {
        match key.to_ascii_lowercase().as_str() {
            PRODUCT_IN_CART => {
                let products = product_list(value);

                if !products.is_empty() && !products.iter().any(present) {
                    return 0;
                }
            }
            PRODUCTS_IN_CART => {
                if !product_list(value).iter().all(present) {
                    return 0;
                }
            }
            PRODUCTS_IN_QTY => {
                let Some(required) = value.as_object() else {
                    continue;
                };

                for (product, qty) in required {
                    let required: u32 = integer(qty)
                        .unwrap_or(1)
                        .max(1)
                        .try_into()
                        .unwrap_or(u32::MAX);
                    let available = quantities.get(product).copied().unwrap_or(0);
                    let multiples = available / required;

                    if multiples == 0 {
                        return 0;
                    }

                    usable = Some(usable.map_or(multiples, |current| current.min(multiples)));
                }
            }
            MAX_USAGE_QTY => max_usage = integer(value),
            _ => {}
        }
    }

    match max_usage {
        Some(limit) if limit > 0 => {
            let limit = u32::try_from(limit).unwrap_or(u32::MAX);
            usable = Some(usable.map_or(limit, |current| current.min(limit)));
        }
        Some(-1) if usable.is_none() => usable = Some(UNLIMITED_USAGE),
        _ => {}
    }

    usable.unwrap_or(1)
}

fn product_list(value: &Value) -> SmallVec<[String; 4]> {
    match value {
        Value::Array(values) => values.iter().filter_map(scalar_string).collect(),
        Value::String(list) => list
            .split(',')
            .map(str::trim)
            .filter(|product| !product.is_empty())
            .map(str::to_string)
            .collect(),
        Value::Number(number) => SmallVec::from_elem(number.to_string(), 1),
        _ => SmallVec::new(),
    }
}

fn scalar_string(value: &Value) -> Option<String> {
    match value {
        Value::String(product) => Some(product.trim().to_string()),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}

fn integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(number) => number.as_i64().or_else(|| {
            number
                .as_f64()
                .and_then(Decimal::from_f64)
                .and_then(|decimal| decimal.trunc().to_i64())
        }),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}
