//! Shipping

use rusty_money::{Money, iso::Currency};
use smallvec::{SmallVec, smallvec};

use crate::{
    adjustments::{Amount, Label, LabelSet, PriceAdjustment, priority},
    contributors::{CalculationContext, Contribution, Contributor},
};

/// Selected shipping method.
#[derive(Debug, Clone, PartialEq)]
pub struct ShippingRate<'a> {
    /// Rate code, used as the adjustment code.
    pub code: String,

    /// Display name.
    pub name: String,

    /// Flat charge.
    pub price: Money<'a, Currency>,
}

impl<'a> ShippingRate<'a> {
    /// Create a shipping rate.
    pub fn new(code: impl Into<String>, name: impl Into<String>, price: Money<'a, Currency>) -> Self {
        Self {
            code: code.into(),
            name: name.into(),
            price,
        }
    }
}

/// Emits the selected shipping rate as a flat charge.
#[derive(Debug, Clone, Copy)]
pub struct ShippingContributor {
    priority: f64,
}

impl Default for ShippingContributor {
    fn default() -> Self {
        Self::new(priority::SHIPPING)
    }
}

impl ShippingContributor {
    /// Create a shipping contributor running at `priority`.
    pub fn new(priority: f64) -> Self {
        Self { priority }
    }
}

impl Contributor for ShippingContributor {
    fn code(&self) -> &str {
        "shipping"
    }

    fn priorities(&self) -> SmallVec<[f64; 3]> {
        smallvec![self.priority]
    }

    fn calculate<'a>(&self, ctx: &CalculationContext<'_, 'a>, priority: f64) -> Contribution<'a> {
        let Some(rate) = ctx.shipping_rate() else {
            return Contribution::empty();
        };

        vec![PriceAdjustment::new(
            rate.code.clone(),
            rate.name.clone(),
            priority,
            Amount::Flat(rate.price),
            LabelSet::single(Label::Shipping),
        )]
        .into()
    }
}
