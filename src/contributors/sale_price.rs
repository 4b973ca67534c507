//! Sale prices

use jiff::Timestamp;
use rusty_money::{Money, iso::Currency};
use smallvec::{SmallVec, smallvec};
use tracing::warn;

use crate::{
    adjustments::{Amount, Label, LabelSet, PerItem, PriceAdjustment, priority},
    contributors::{CalculationContext, Contribution, Contributor},
    pricing::line_total_minor,
};

const CODE: &str = "sale-price";

/// Temporary price for a product.
#[derive(Debug, Clone, PartialEq)]
pub struct SalePrice<'a> {
    /// Product the price applies to.
    pub product_id: String,

    /// Sale unit price.
    pub price: Money<'a, Currency>,

    /// Start of the sale, open when unset.
    pub since: Option<Timestamp>,

    /// End of the sale, open when unset.
    pub until: Option<Timestamp>,
}

impl<'a> SalePrice<'a> {
    /// Create an open-ended sale price.
    pub fn new(product_id: impl Into<String>, price: Money<'a, Currency>) -> Self {
        Self {
            product_id: product_id.into(),
            price,
            since: None,
            until: None,
        }
    }

    /// Restrict the sale to a window.
    #[must_use]
    pub fn with_window(mut self, since: Option<Timestamp>, until: Option<Timestamp>) -> Self {
        self.since = since;
        self.until = until;
        self
    }

    /// Whether the sale runs at `now`.
    pub fn is_active_at(&self, now: Timestamp) -> bool {
        self.since.is_none_or(|since| since <= now) && self.until.is_none_or(|until| now <= until)
    }
}

/// Reduces item totals to their active sale price.
#[derive(Debug, Clone)]
pub struct SalePriceContributor {
    sale_prices: Vec<SalePrice<'static>>,
    priority: f64,
}

impl SalePriceContributor {
    /// Create a sale price contributor running at `priority`.
    pub fn new(sale_prices: Vec<SalePrice<'static>>, priority: f64) -> Self {
        Self {
            sale_prices,
            priority,
        }
    }

    /// Sale price contributor at the standard priority.
    pub fn with_sale_prices(sale_prices: Vec<SalePrice<'static>>) -> Self {
        Self::new(sale_prices, priority::SALE_PRICE)
    }
}

impl Contributor for SalePriceContributor {
    fn code(&self) -> &str {
        CODE
    }

    fn priorities(&self) -> SmallVec<[f64; 3]> {
        smallvec![self.priority]
    }

    fn calculate<'a>(&self, ctx: &CalculationContext<'_, 'a>, priority: f64) -> Contribution<'a> {
        if ctx.grand_total() <= 0 {
            return Contribution::empty();
        }

        let now = ctx.now();
        let mut per_item = PerItem::new();

        for item in ctx.cart().iter() {
            let Some(sale) = self
                .sale_prices
                .iter()
                .find(|sale| sale.product_id == item.product_id() && sale.is_active_at(now))
            else {
                continue;
            };

            if sale.price.currency() != ctx.currency() {
                warn!(product = %sale.product_id, "skipping sale price in a foreign currency");
                continue;
            }

            let unit_reduction = item
                .unit_price()
                .to_minor_units()
                .saturating_sub(sale.price.to_minor_units());

            if unit_reduction <= 0 {
                continue;
            }

            let reduction =
                match line_total_minor(&Money::from_minor(unit_reduction, ctx.currency()), item.qty()) {
                    Ok(reduction) => reduction,
                    Err(error) => {
                        warn!(%error, index = item.index(), "skipping sale price");
                        continue;
                    }
                };

            if reduction > ctx.grand_total_of(item.bucket()) {
                continue;
            }

            per_item.insert(item.bucket(), Amount::flat_minor(-reduction, ctx.currency()));
        }

        if per_item.is_empty() {
            return Contribution::empty();
        }

        vec![PriceAdjustment::per_item(
            CODE,
            "Sale price",
            priority,
            LabelSet::single(Label::SalePriceAdjustment),
            per_item,
        )]
        .into()
    }
}

#[cfg(test)]
mod tests {
    use jiff::{SignedDuration, Timestamp};
    use rusty_money::iso::USD;
    use testresult::TestResult;

    use crate::{
        adjustments::BucketKey,
        applier::Applier,
        cart::{Cart, CartItem},
        checkout::CheckoutSnapshot,
    };

    use super::*;

    #[test]
    fn reduces_items_with_active_sale() -> TestResult {
        let now = Timestamp::UNIX_EPOCH;
        let cart = Cart::with_items(
            [
                CartItem::new(1, "tee", 2, Money::from_minor(1_000, USD)),
                CartItem::new(2, "mug", 1, Money::from_minor(2_000, USD)),
                CartItem::new(3, "hat", 1, Money::from_minor(1_500, USD)),
            ],
            USD,
        )?;
        let snapshot = CheckoutSnapshot::new(cart, now);

        let mut applier = Applier::new(USD);
        applier.apply(crate::sequencer::subtotal_adjustment(&snapshot.cart)?)?;

        let expired = SalePrice::new("mug", Money::from_minor(1_000, USD))
            .with_window(None, Some(now - SignedDuration::from_hours(1)));
        let dearer = SalePrice::new("hat", Money::from_minor(1_800, USD));

        let contributor = SalePriceContributor::with_sale_prices(vec![
            SalePrice::new("tee", Money::from_minor(800, USD)),
            expired,
            dearer,
        ]);

        let ctx = CalculationContext::new(&snapshot, applier.ledger());
        let contribution = contributor.calculate(&ctx, priority::SALE_PRICE);

        let adjustment = contribution.adjustments.first().ok_or("Expected sale price adjustment")?;

        assert_eq!(adjustment.per_item_amounts().len(), 1);
        assert_eq!(
            adjustment.per_item_amounts().get(BucketKey::Item(1)),
            Some(&Amount::flat_minor(-400, USD))
        );
        assert!(adjustment.has_label(Label::SalePriceAdjustment));

        Ok(())
    }

    #[test]
    fn empty_cart_total_emits_nothing() -> TestResult {
        let cart = Cart::with_items([CartItem::new(1, "tee", 1, Money::from_minor(1_000, USD))], USD)?;
        let snapshot = CheckoutSnapshot::new(cart, Timestamp::UNIX_EPOCH);
        let applier = Applier::new(USD);

        let contributor =
            SalePriceContributor::with_sale_prices(vec![SalePrice::new("tee", Money::from_minor(800, USD))]);
        let ctx = CalculationContext::new(&snapshot, applier.ledger());

        assert!(contributor.calculate(&ctx, priority::SALE_PRICE).is_empty());

        Ok(())
    }

    #[test]
    fn window_bounds_are_inclusive() {
        let now = Timestamp::UNIX_EPOCH;
        let sale = SalePrice::new("tee", Money::from_minor(800, USD)).with_window(Some(now), Some(now));

        assert!(sale.is_active_at(now));
        assert!(!sale.is_active_at(now + SignedDuration::from_secs(1)));
    }
}
