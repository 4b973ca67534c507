//! Checkout caching, pruning and store failures.

use jiff::Timestamp;
use rusty_money::{Money, iso::USD};
use testresult::TestResult;

use tally::{
    adjustments::Label,
    cart::CartItem,
    config::PricingConfig,
    contributors::GiftCard,
    coupons::{CouponStoreError, MockCouponStore},
    fixtures::Fixture,
};

#[test]
fn storefront_checkout_prunes_withdrawn_codes() -> TestResult {
    let fixture = Fixture::from_set("storefront")?;
    let engine = fixture.engine(PricingConfig::default());
    let store = fixture.coupon_store();
    let mut checkout = fixture.checkout();

    assert_eq!(checkout.redeemed_codes().len(), 3);

    let grand_total = checkout.pricing(&engine, &store, fixture.now()).grand_total();

    assert_eq!(grand_total, Money::from_minor(9_156, USD));
    assert_eq!(checkout.redeemed_codes(), ["SPRING".to_string(), "TEEDEAL".to_string()]);

    // Repricing after a mutation no longer sees the withdrawn code.
    checkout.invalidate();

    let repriced = checkout.pricing(&engine, &store, fixture.now());

    assert_eq!(repriced.grand_total(), Money::from_minor(9_156, USD));
    assert!(repriced.withdrawn_codes().is_empty());

    Ok(())
}

#[test]
fn checkout_matches_engine_on_snapshot() -> TestResult {
    let fixture = Fixture::from_set("storefront")?;
    let engine = fixture.engine(PricingConfig::default());
    let mut checkout = fixture.checkout();

    let expected = engine.compute(&fixture.snapshot());
    let actual = checkout.pricing(&engine, &fixture.coupon_store(), fixture.now());

    assert_eq!(actual.adjustments(), expected.adjustments());
    assert_eq!(actual.ledger(), expected.ledger());

    Ok(())
}

#[test]
fn store_outage_still_prices_the_cart() -> TestResult {
    let fixture = Fixture::from_set("storefront")?;
    let engine = fixture.engine(PricingConfig::default());
    let mut store = MockCouponStore::new();

    store
        .expect_load_by_codes()
        .times(1)
        .returning(|_| Err(CouponStoreError::Unavailable("timeout".to_string())));

    let mut checkout = fixture.checkout();
    let result = checkout.pricing(&engine, &store, fixture.now());

    assert_eq!(result.total_for(Label::Discount), Money::from_minor(0, USD));
    assert!(result.withdrawn_codes().is_empty());
    // Codes stay redeemed for the next pass.
    assert_eq!(checkout.redeemed_codes().len(), 3);

    Ok(())
}

#[test]
fn mutations_reprice_on_next_call() -> TestResult {
    let fixture = Fixture::from_set("storefront")?;
    let engine = fixture.engine(PricingConfig::default());
    let store = fixture.coupon_store();
    let mut checkout = fixture.checkout();

    let before = checkout.pricing(&engine, &store, fixture.now()).grand_total();

    checkout.remove_gift_card("gc-2000");
    let without_card = checkout.pricing(&engine, &store, fixture.now()).grand_total();

    assert_eq!(
        without_card.to_minor_units() - before.to_minor_units(),
        2_000
    );

    checkout.apply_gift_card(GiftCard::new("gc-big", "Big card", Money::from_minor(1_000_000, USD)));
    assert_eq!(
        checkout.pricing(&engine, &store, fixture.now()).grand_total(),
        Money::from_minor(0, USD)
    );

    checkout.add_item(CartItem::new(4, "socks", 1, Money::from_minor(500, USD)))?;
    assert!(checkout.cached().is_none());

    Ok(())
}

#[test]
fn later_pricing_instant_withdraws_expired_cart_coupon() -> TestResult {
    let fixture = Fixture::from_set("storefront")?;
    let engine = fixture.engine(PricingConfig::default());
    let store = fixture.coupon_store();
    let mut checkout = fixture.checkout();

    let summer: Timestamp = "2026-07-01T00:00:00Z".parse()?;
    let result = checkout.pricing(&engine, &store, summer);

    assert_eq!(result.withdrawn_codes(), ["SPRING".to_string(), "OLD".to_string()]);
    assert_eq!(checkout.redeemed_codes(), ["TEEDEAL".to_string()]);

    Ok(())
}
