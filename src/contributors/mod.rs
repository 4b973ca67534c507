//! Contributors
//!
//! A contributor declares the priorities at which it wants to run and, when the sequencer
//! reaches each of them, emits price adjustments computed from the running totals.

use std::fmt;

use slotmap::{SlotMap, new_key_type};
use smallvec::SmallVec;

use crate::{adjustments::PriceAdjustment, config::PricingConfig, coupons::CouponContributor};

pub mod context;
pub mod gift_card;
pub mod sale_price;
pub mod shipping;
pub mod tax;

pub use context::CalculationContext;
pub use gift_card::{GiftCard, GiftCardContributor};
pub use sale_price::{SalePrice, SalePriceContributor};
pub use shipping::{ShippingContributor, ShippingRate};
pub use tax::{Address, TaxContributor, TaxRule};

/// Source of price adjustments.
pub trait Contributor: fmt::Debug + Send + Sync {
    /// Identifier used in logs.
    fn code(&self) -> &str;

    /// Priorities at which [`Contributor::calculate`] is invoked.
    fn priorities(&self) -> SmallVec<[f64; 3]>;

    /// Emit adjustments for the phase at `priority`, given the totals applied so far.
    fn calculate<'a>(&self, ctx: &CalculationContext<'_, 'a>, priority: f64) -> Contribution<'a>;
}

/// Output of one contributor phase.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Contribution<'a> {
    /// Adjustments to apply.
    pub adjustments: Vec<PriceAdjustment<'a>>,

    /// Redeemed codes found to be no longer valid.
    pub withdrawn: SmallVec<[String; 2]>,
}

impl Contribution<'_> {
    /// A contribution with nothing in it.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Whether the contribution carries neither adjustments nor withdrawn codes.
    pub fn is_empty(&self) -> bool {
        self.adjustments.is_empty() && self.withdrawn.is_empty()
    }
}

impl<'a> From<Vec<PriceAdjustment<'a>>> for Contribution<'a> {
    fn from(adjustments: Vec<PriceAdjustment<'a>>) -> Self {
        Self {
            adjustments,
            withdrawn: SmallVec::new(),
        }
    }
}

new_key_type! {
    /// Contributor Key
    pub struct ContributorKey;
}

/// Registered contributors, kept in registration order.
#[derive(Debug, Default)]
pub struct ContributorRegistry {
    contributors: SlotMap<ContributorKey, Box<dyn Contributor>>,
    order: Vec<ContributorKey>,
}

impl ContributorRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the built-in contributors, configured from `config`.
    pub fn standard(config: &PricingConfig, tax_rules: Vec<TaxRule>, sale_prices: Vec<SalePrice<'static>>) -> Self {
        let mut registry = Self::new();

        registry.register(ShippingContributor::new(config.shipping_priority));
        registry.register(SalePriceContributor::new(sale_prices, config.sale_price_priority));
        registry.register(CouponContributor::new(
            config.discount_priority,
            config.product_discount_priority(),
        ));
        registry.register(TaxContributor::new(tax_rules, config.tax_priority));
        registry.register(GiftCardContributor::new(config.gift_card_priority));

        registry
    }

    /// Register a contributor. Registration order breaks priority ties.
    pub fn register<C: Contributor + 'static>(&mut self, contributor: C) -> ContributorKey {
        let key = self.contributors.insert(Box::new(contributor));
        self.order.push(key);
        key
    }

    /// Remove a contributor.
    pub fn unregister(&mut self, key: ContributorKey) -> Option<Box<dyn Contributor>> {
        self.order.retain(|existing| *existing != key);
        self.contributors.remove(key)
    }

    /// Look up a contributor.
    pub fn get(&self, key: ContributorKey) -> Option<&dyn Contributor> {
        self.contributors.get(key).map(|contributor| &**contributor)
    }

    /// Iterate in registration order.
    pub fn iter(&self) -> impl Iterator<Item = (ContributorKey, &dyn Contributor)> {
        self.order
            .iter()
            .filter_map(|key| self.get(*key).map(|contributor| (*key, contributor)))
    }

    /// Number of registered contributors.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use smallvec::smallvec;

    use super::*;

    #[derive(Debug)]
    struct Fixed(&'static str);

    impl Contributor for Fixed {
        fn code(&self) -> &str {
            self.0
        }

        fn priorities(&self) -> SmallVec<[f64; 3]> {
            smallvec![1.5]
        }

        fn calculate<'a>(&self, _ctx: &CalculationContext<'_, 'a>, _priority: f64) -> Contribution<'a> {
            Contribution::empty()
        }
    }

    #[test]
    fn iterates_in_registration_order() {
        let mut registry = ContributorRegistry::new();

        registry.register(Fixed("b"));
        registry.register(Fixed("a"));

        let codes: Vec<&str> = registry.iter().map(|(_, c)| c.code()).collect();

        assert_eq!(codes, vec!["b", "a"]);
    }

    #[test]
    fn unregister_removes_contributor() {
        let mut registry = ContributorRegistry::new();

        let first = registry.register(Fixed("first"));
        registry.register(Fixed("second"));

        assert!(registry.unregister(first).is_some());
        assert!(registry.get(first).is_none());
        assert_eq!(registry.len(), 1);
        assert!(registry.unregister(first).is_none());
    }

    #[test]
    fn standard_registry_holds_builtin_contributors() {
        let registry = ContributorRegistry::standard(&PricingConfig::default(), Vec::new(), Vec::new());

        let codes: Vec<&str> = registry.iter().map(|(_, c)| c.code()).collect();

        assert_eq!(codes, vec!["shipping", "sale-price", "coupons", "tax", "gift-cards"]);
    }
}
