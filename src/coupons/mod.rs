//! Coupons
//!
//! Redeemed coupon codes are resolved against preloaded [`CouponRecord`]s and allocated in two
//! phases: cart-level coupons first, then product-level coupons a fixed offset later.

use jiff::Timestamp;
use rust_decimal::Decimal;
use rusty_money::{Money, iso::Currency};
use serde_json::{Map, Value};
use smallvec::{SmallVec, smallvec};
use tracing::warn;

use crate::{
    adjustments::priority,
    contributors::{CalculationContext, Contribution, Contributor},
};

pub mod allocator;
pub mod limits;
pub mod store;

pub use allocator::{
    Allocation, AllocationPhase, AllocationRequest, Discount, allocate_coupon_discounts,
    find_biggest_discount,
};
pub use limits::{UNLIMITED_USAGE, evaluate_limits};
pub use store::{CouponStore, CouponStoreError, InMemoryCouponStore, MockCouponStore};

/// What a coupon discounts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CouponTarget {
    /// The whole cart.
    Cart,

    /// Units of the listed products.
    Products(SmallVec<[String; 4]>),
}

impl CouponTarget {
    /// Parse a stored target: anything mentioning `cart`, or an empty value, targets the cart;
    /// otherwise a comma separated product list.
    pub fn parse(target: &str) -> Self {
        let target = target.trim();

        if target.is_empty() || target.to_ascii_lowercase().contains("cart") {
            return CouponTarget::Cart;
        }

        let products: SmallVec<[String; 4]> = target
            .split(',')
            .map(str::trim)
            .filter(|product| !product.is_empty())
            .map(str::to_string)
            .collect();

        if products.is_empty() {
            CouponTarget::Cart
        } else {
            CouponTarget::Products(products)
        }
    }

    /// Whether the coupon targets the whole cart.
    pub fn is_cart(&self) -> bool {
        matches!(self, CouponTarget::Cart)
    }

    /// Targeted products, empty for cart-level coupons.
    pub fn products(&self) -> &[String] {
        match self {
            CouponTarget::Cart => &[],
            CouponTarget::Products(products) => products.as_slice(),
        }
    }
}

/// A stored coupon definition.
#[derive(Debug, Clone, PartialEq)]
pub struct CouponRecord<'a> {
    /// Redemption code.
    pub code: String,

    /// Display name.
    pub name: String,

    /// Flat reduction.
    pub amount: Money<'a, Currency>,

    /// Percentage reduction in points.
    pub percent: Decimal,

    /// What the coupon discounts.
    pub target: CouponTarget,

    /// Start of validity, open when unset.
    pub since: Option<Timestamp>,

    /// End of validity, open when unset.
    pub until: Option<Timestamp>,

    /// Usage limits document.
    pub limits: Map<String, Value>,
}

impl<'a> CouponRecord<'a> {
    /// Create a cart-level coupon with no reduction, no window and no limits.
    pub fn new(code: impl Into<String>, name: impl Into<String>, currency: &'a Currency) -> Self {
        Self {
            code: code.into(),
            name: name.into(),
            amount: Money::from_minor(0, currency),
            percent: Decimal::ZERO,
            target: CouponTarget::Cart,
            since: None,
            until: None,
            limits: Map::new(),
        }
    }

    /// Set the flat reduction.
    #[must_use]
    pub fn with_amount(mut self, amount: Money<'a, Currency>) -> Self {
        self.amount = amount;
        self
    }

    /// Set the percentage reduction in points.
    #[must_use]
    pub fn with_percent(mut self, percent: Decimal) -> Self {
        self.percent = percent;
        self
    }

    /// Set the target.
    #[must_use]
    pub fn with_target(mut self, target: CouponTarget) -> Self {
        self.target = target;
        self
    }

    /// Set the validity window.
    #[must_use]
    pub fn with_window(mut self, since: Option<Timestamp>, until: Option<Timestamp>) -> Self {
        self.since = since;
        self.until = until;
        self
    }

    /// Set the usage limits.
    #[must_use]
    pub fn with_limits(mut self, limits: Map<String, Value>) -> Self {
        self.limits = limits;
        self
    }

    /// Whether `since <= now <= until`, treating unset bounds as open.
    pub fn is_valid_at(&self, now: Timestamp) -> bool {
        self.since.is_none_or(|since| since <= now) && self.until.is_none_or(|until| now <= until)
    }
}

/// Allocates redeemed coupons in a cart-level and a product-level phase.
#[derive(Debug, Clone, Copy)]
pub struct CouponContributor {
    cart_priority: f64,
    product_priority: f64,
}

impl Default for CouponContributor {
    fn default() -> Self {
        Self::new(
            priority::DISCOUNT,
            priority::DISCOUNT + priority::PRODUCT_DISCOUNT_OFFSET,
        )
    }
}

impl CouponContributor {
    /// Create a coupon contributor with its two phase priorities.
    pub fn new(cart_priority: f64, product_priority: f64) -> Self {
        Self {
            cart_priority,
            product_priority,
        }
    }
}

impl Contributor for CouponContributor {
    fn code(&self) -> &str {
        "coupons"
    }

    fn priorities(&self) -> SmallVec<[f64; 3]> {
        smallvec![self.cart_priority, self.product_priority]
    }

    fn calculate<'a>(&self, ctx: &CalculationContext<'_, 'a>, priority: f64) -> Contribution<'a> {
        if ctx.redeemed_codes().is_empty() {
            return Contribution::empty();
        }

        let phase = if priority::same(priority, self.product_priority) {
            AllocationPhase::Product
        } else {
            AllocationPhase::Cart {
                cart_total: ctx.grand_total(),
            }
        };

        let request = AllocationRequest {
            redeemed_codes: ctx.redeemed_codes(),
            cart: ctx.cart(),
            coupons: ctx.coupons(),
            now: ctx.now(),
            phase,
            priority,
        };

        match allocate_coupon_discounts(&request) {
            Ok(allocation) => Contribution {
                adjustments: allocation.adjustments,
                withdrawn: allocation.withdrawn,
            },
            Err(error) => {
                warn!(%error, "coupon allocation failed");
                Contribution::empty()
            }
        }
    }
}
