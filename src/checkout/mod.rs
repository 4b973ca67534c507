//! Checkout
//!
//! Mutable checkout state with a cached pricing result. Every mutation drops the cache; the
//! next call to [`Checkout::pricing`] loads coupon records, runs the engine and prunes codes
//! the pass withdrew.

use jiff::Timestamp;
use tracing::{info, warn};

use crate::{
    cart::{Cart, CartError, CartItem},
    contributors::{Address, GiftCard, ShippingRate},
    coupons::CouponStore,
    engine::PricingEngine,
    result::PricingResult,
};

pub mod snapshot;

pub use snapshot::CheckoutSnapshot;

/// A checkout session.
#[derive(Debug, Clone)]
pub struct Checkout<'a> {
    snapshot: CheckoutSnapshot<'a>,
    cached: Option<PricingResult<'a>>,
}

impl<'a> Checkout<'a> {
    /// Create a checkout for a cart.
    pub fn new(cart: Cart<'a>) -> Self {
        Self {
            snapshot: CheckoutSnapshot::new(cart, Timestamp::UNIX_EPOCH),
            cached: None,
        }
    }

    /// Current inputs.
    pub fn snapshot(&self) -> &CheckoutSnapshot<'a> {
        &self.snapshot
    }

    /// Cart contents.
    pub fn cart(&self) -> &Cart<'a> {
        &self.snapshot.cart
    }

    /// Redeemed codes, in redemption order.
    pub fn redeemed_codes(&self) -> &[String] {
        &self.snapshot.redeemed_codes
    }

    /// Replace the cart.
    pub fn set_cart(&mut self, cart: Cart<'a>) {
        self.snapshot.cart = cart;
        self.invalidate();
    }

    /// Add an item.
    ///
    /// # Errors
    ///
    /// Returns a [`CartError`] if the item cannot be added to the cart.
    pub fn add_item(&mut self, item: CartItem<'a>) -> Result<(), CartError> {
        self.snapshot.cart.push(item)?;
        self.invalidate();

        Ok(())
    }

    /// Remove an item by index.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::ItemNotFound`] if no item has the index.
    pub fn remove_item(&mut self, index: usize) -> Result<CartItem<'a>, CartError> {
        let item = self.snapshot.cart.remove(index)?;
        self.invalidate();

        Ok(item)
    }

    /// Select a shipping rate.
    pub fn set_shipping_rate(&mut self, rate: Option<ShippingRate<'a>>) {
        self.snapshot.shipping_rate = rate;
        self.invalidate();
    }

    /// Set the shipping address.
    pub fn set_shipping_address(&mut self, address: Option<Address>) {
        self.snapshot.shipping_address = address;
        self.invalidate();
    }

    /// Redeem a coupon code. Returns `false` for blank or already redeemed codes.
    pub fn redeem_coupon(&mut self, code: impl Into<String>) -> bool {
        let code = code.into().trim().to_string();

        if code.is_empty() || self.snapshot.redeemed_codes.contains(&code) {
            return false;
        }

        self.snapshot.redeemed_codes.push(code);
        self.invalidate();

        true
    }

    /// Remove a redeemed code. Returns `false` if it was not redeemed.
    pub fn remove_coupon(&mut self, code: &str) -> bool {
        let before = self.snapshot.redeemed_codes.len();

        self.snapshot.redeemed_codes.retain(|redeemed| redeemed != code);

        let removed = self.snapshot.redeemed_codes.len() != before;

        if removed {
            self.invalidate();
        }

        removed
    }

    /// Apply a gift card. A card with the same code replaces the earlier one.
    pub fn apply_gift_card(&mut self, card: GiftCard<'a>) {
        self.snapshot.gift_cards.retain(|applied| applied.code != card.code);
        self.snapshot.gift_cards.push(card);
        self.invalidate();
    }

    /// Remove a gift card by code. Returns `false` if it was not applied.
    pub fn remove_gift_card(&mut self, code: &str) -> bool {
        let before = self.snapshot.gift_cards.len();

        self.snapshot.gift_cards.retain(|applied| applied.code != code);

        let removed = self.snapshot.gift_cards.len() != before;

        if removed {
            self.invalidate();
        }

        removed
    }

    /// Drop the cached result.
    pub fn invalidate(&mut self) {
        self.cached = None;
    }

    /// Cached result, if the checkout has not changed since it was priced.
    pub fn cached(&self) -> Option<&PricingResult<'a>> {
        self.cached.as_ref()
    }

    /// Price the checkout, reusing the cached result when nothing changed.
    ///
    /// Coupon records are loaded once per pass. A failing store is logged and the pass runs
    /// without coupons. Codes the pass withdrew are removed from the redeemed list.
    pub fn pricing(&mut self, engine: &PricingEngine, store: &dyn CouponStore, now: Timestamp) -> &PricingResult<'a> {
        let result = match self.cached.take() {
            Some(result) => result,
            None => self.recalculate(engine, store, now),
        };

        self.cached.insert(result)
    }

    #[tracing::instrument(
        name = "checkout.pricing.recalculate",
        skip(self, engine, store),
        fields(items = self.snapshot.cart.len(), redeemed = self.snapshot.redeemed_codes.len())
    )]
    fn recalculate(&mut self, engine: &PricingEngine, store: &dyn CouponStore, now: Timestamp) -> PricingResult<'a> {
        self.snapshot.now = now;

        self.snapshot.coupons = if self.snapshot.redeemed_codes.is_empty() {
            Vec::new()
        } else {
            match store.load_by_codes(&self.snapshot.redeemed_codes) {
                Ok(records) => records,
                Err(error) => {
                    warn!(%error, "pricing without coupons");
                    Vec::new()
                }
            }
        };

        let result = engine.compute(&self.snapshot);

        for code in result.withdrawn_codes() {
            self.snapshot.redeemed_codes.retain(|redeemed| redeemed != code);

            info!(code = %code, "withdrew coupon outside its validity window");
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use jiff::SignedDuration;
    use rust_decimal::Decimal;
    use rusty_money::{Money, iso::USD};
    use testresult::TestResult;

    use crate::{
        config::PricingConfig,
        coupons::{CouponRecord, CouponStoreError, MockCouponStore},
    };

    use super::*;

    fn checkout<'a>() -> Result<Checkout<'a>, CartError> {
        let cart = Cart::with_items([CartItem::new(1, "tee", 1, Money::from_minor(10_000, USD))], USD)?;

        Ok(Checkout::new(cart))
    }

    fn engine() -> PricingEngine {
        PricingEngine::standard(PricingConfig::default(), Vec::new(), Vec::new())
    }

    #[test]
    fn pricing_is_cached_until_mutation() -> TestResult {
        let mut store = MockCouponStore::new();

        store.expect_load_by_codes().times(2).returning(|_| {
            Ok(vec![
                CouponRecord::new("TEN", "Ten off", USD).with_percent(Decimal::from(10)),
            ])
        });

        let engine = engine();
        let mut checkout = checkout()?;

        assert!(checkout.redeem_coupon("TEN"));
        assert!(!checkout.redeem_coupon("TEN"));

        let first = checkout.pricing(&engine, &store, Timestamp::UNIX_EPOCH).grand_total();
        let second = checkout.pricing(&engine, &store, Timestamp::UNIX_EPOCH).grand_total();

        assert_eq!(first, Money::from_minor(9_000, USD));
        assert_eq!(first, second);
        assert!(checkout.cached().is_some());

        checkout.set_shipping_rate(Some(ShippingRate::new("ground", "Ground", Money::from_minor(1_000, USD))));

        assert!(checkout.cached().is_none());
        assert_eq!(
            checkout.pricing(&engine, &store, Timestamp::UNIX_EPOCH).grand_total(),
            Money::from_minor(9_900, USD)
        );

        Ok(())
    }

    #[test]
    fn store_failure_prices_without_coupons() -> TestResult {
        let mut store = MockCouponStore::new();

        store
            .expect_load_by_codes()
            .returning(|_| Err(CouponStoreError::Unavailable("connection refused".to_string())));

        let mut checkout = checkout()?;
        checkout.redeem_coupon("TEN");

        let result = checkout.pricing(&engine(), &store, Timestamp::UNIX_EPOCH);

        assert_eq!(result.grand_total(), Money::from_minor(10_000, USD));
        assert_eq!(result.discount(), Money::from_minor(0, USD));

        Ok(())
    }

    #[test]
    fn expired_codes_are_pruned() -> TestResult {
        let now = Timestamp::UNIX_EPOCH + SignedDuration::from_hours(48);
        let mut store = MockCouponStore::new();

        store.expect_load_by_codes().returning(move |_| {
            Ok(vec![
                CouponRecord::new("OLD", "Old", USD)
                    .with_amount(Money::from_minor(500, USD))
                    .with_window(None, Some(Timestamp::UNIX_EPOCH)),
            ])
        });

        let mut checkout = checkout()?;
        checkout.redeem_coupon("OLD");

        let withdrawn = checkout
            .pricing(&engine(), &store, now)
            .withdrawn_codes()
            .to_vec();

        assert_eq!(withdrawn, vec!["OLD".to_string()]);
        assert!(checkout.redeemed_codes().is_empty());

        Ok(())
    }

    #[test]
    fn no_codes_skips_the_store() -> TestResult {
        let mut store = MockCouponStore::new();
        store.expect_load_by_codes().never();

        let mut checkout = checkout()?;

        assert_eq!(
            checkout.pricing(&engine(), &store, Timestamp::UNIX_EPOCH).subtotal(),
            Money::from_minor(10_000, USD)
        );

        Ok(())
    }

    #[test]
    fn mutators_invalidate_the_cache() -> TestResult {
        let store = MockCouponStore::new();
        let engine = engine();
        let mut checkout = checkout()?;

        checkout.pricing(&engine, &store, Timestamp::UNIX_EPOCH);
        checkout.add_item(CartItem::new(2, "mug", 1, Money::from_minor(500, USD)))?;
        assert!(checkout.cached().is_none());

        checkout.pricing(&engine, &store, Timestamp::UNIX_EPOCH);
        checkout.remove_item(2)?;
        assert!(checkout.cached().is_none());

        checkout.pricing(&engine, &store, Timestamp::UNIX_EPOCH);
        checkout.set_shipping_address(Some(Address::new("NY", "10001")));
        assert!(checkout.cached().is_none());

        checkout.pricing(&engine, &store, Timestamp::UNIX_EPOCH);
        checkout.apply_gift_card(GiftCard::new("gc", "Gift", Money::from_minor(100, USD)));
        assert!(checkout.cached().is_none());

        checkout.pricing(&engine, &store, Timestamp::UNIX_EPOCH);
        assert!(checkout.remove_gift_card("gc"));
        assert!(checkout.cached().is_none());

        checkout.pricing(&engine, &store, Timestamp::UNIX_EPOCH);
        assert!(!checkout.remove_coupon("NOPE"));
        assert!(!checkout.remove_gift_card("gc"));
        assert!(checkout.cached().is_some());

        Ok(())
    }
}
