//! Coupons priced end to end through the engine.
//!
//! The storefront fixture redeems three codes: a 10% cart coupon, $5 off one tee and an
//! expired winter coupon that is withdrawn during the pass.

use jiff::Timestamp;
use rust_decimal::Decimal;
use rusty_money::{Money, iso::USD};
use serde_json::{Map, json};
use testresult::TestResult;

use tally::{
    adjustments::{BucketKey, Label},
    cart::{Cart, CartItem},
    checkout::CheckoutSnapshot,
    config::PricingConfig,
    coupons::{CouponRecord, CouponTarget},
    engine::PricingEngine,
    fixtures::Fixture,
};

fn limits(value: serde_json::Value) -> Map<String, serde_json::Value> {
    value.as_object().cloned().unwrap_or_default()
}

fn engine() -> PricingEngine {
    PricingEngine::standard(PricingConfig::default(), Vec::new(), Vec::new())
}

#[test]
fn storefront_prices_every_contributor() -> TestResult {
    let fixture = Fixture::from_set("storefront")?;
    let result = fixture
        .engine(PricingConfig::default())
        .compute(&fixture.snapshot());

    // Hoodie on sale ($10 off), 10% off $120 after shipping, $5 off one tee, 8% NY tax on each
    // item's running total and a $20 gift card. Sale price and card both count as discount.
    assert_eq!(result.subtotal(), Money::from_minor(12_200, USD));
    assert_eq!(result.sale_price_adjustment(), Money::from_minor(-1_000, USD));
    assert_eq!(result.shipping(), Money::from_minor(800, USD));
    assert_eq!(result.discount(), Money::from_minor(-4_700, USD));
    assert_eq!(result.tax(), Money::from_minor(856, USD));
    assert_eq!(result.gift_card(), Money::from_minor(-2_000, USD));
    assert_eq!(result.grand_total(), Money::from_minor(9_156, USD));
    assert_eq!(
        result.subtotal().to_minor_units()
            + result.shipping().to_minor_units()
            + result.discount().to_minor_units()
            + result.tax().to_minor_units(),
        9_156
    );
    assert_eq!(result.withdrawn_codes(), ["OLD".to_string()]);

    let ledger = result.ledger();

    assert_eq!(ledger.get(BucketKey::Item(1), Label::Discount), -500);
    assert_eq!(ledger.get(BucketKey::Item(3), Label::SalePriceAdjustment), -1_000);

    Ok(())
}

#[test]
fn max_usage_is_shared_across_lines() -> TestResult {
    let cart = Cart::with_items(
        [
            CartItem::new(1, "tee", 3, Money::from_minor(2_000, USD)),
            CartItem::new(2, "cap", 2, Money::from_minor(1_500, USD)),
        ],
        USD,
    )?;

    let snapshot = CheckoutSnapshot::new(cart, Timestamp::UNIX_EPOCH)
        .with_redeemed_codes(["APPAREL"])
        .with_coupons(vec![
            CouponRecord::new("APPAREL", "Apparel", USD)
                .with_amount(Money::from_minor(500, USD))
                .with_target(CouponTarget::parse("tee,cap"))
                .with_limits(limits(json!({ "max_usage_qty": 4 }))),
        ]);

    let result = engine().compute(&snapshot);

    // Three tees then one cap before the quota runs out.
    assert_eq!(result.ledger().get(BucketKey::Item(1), Label::Discount), -1_500);
    assert_eq!(result.ledger().get(BucketKey::Item(2), Label::Discount), -500);
    assert_eq!(result.discount(), Money::from_minor(-2_000, USD));

    Ok(())
}

#[test]
fn biggest_product_coupon_wins_per_unit() -> TestResult {
    let cart = Cart::with_items([CartItem::new(1, "tee", 2, Money::from_minor(2_000, USD))], USD)?;

    let snapshot = CheckoutSnapshot::new(cart, Timestamp::UNIX_EPOCH)
        .with_redeemed_codes(["FLAT3", "PCT25"])
        .with_coupons(vec![
            CouponRecord::new("FLAT3", "Three off", USD)
                .with_amount(Money::from_minor(300, USD))
                .with_target(CouponTarget::parse("tee"))
                .with_limits(limits(json!({ "max_usage_qty": -1 }))),
            CouponRecord::new("PCT25", "Quarter off", USD)
                .with_percent(Decimal::from(25))
                .with_target(CouponTarget::parse("tee"))
                .with_limits(limits(json!({ "max_usage_qty": 1 }))),
        ]);

    let result = engine().compute(&snapshot);

    let codes: Vec<&str> = result
        .adjustments_with(Label::Discount)
        .map(|adjustment| adjustment.code())
        .collect();

    // First unit takes 25% ($5), the second falls back to $3.
    assert_eq!(codes, vec!["PCT25", "FLAT3"]);
    assert_eq!(result.discount(), Money::from_minor(-800, USD));

    Ok(())
}

#[test]
fn unmet_limits_skip_the_coupon() -> TestResult {
    let cart = Cart::with_items([CartItem::new(1, "tee", 1, Money::from_minor(2_000, USD))], USD)?;

    let snapshot = CheckoutSnapshot::new(cart, Timestamp::UNIX_EPOCH)
        .with_redeemed_codes(["BUNDLE"])
        .with_coupons(vec![
            CouponRecord::new("BUNDLE", "Bundle", USD)
                .with_percent(Decimal::from(10))
                .with_limits(limits(json!({ "products_in_cart": ["tee", "cap"] }))),
        ]);

    let result = engine().compute(&snapshot);

    assert_eq!(result.discount(), Money::from_minor(0, USD));
    assert!(result.withdrawn_codes().is_empty());

    Ok(())
}

#[test]
fn non_discountable_items_are_never_targeted() -> TestResult {
    let cart = Cart::with_items(
        [CartItem::new(1, "gift-wrap", 1, Money::from_minor(500, USD)).with_discountable(false)],
        USD,
    )?;

    let snapshot = CheckoutSnapshot::new(cart, Timestamp::UNIX_EPOCH)
        .with_redeemed_codes(["WRAP"])
        .with_coupons(vec![
            CouponRecord::new("WRAP", "Wrap", USD)
                .with_amount(Money::from_minor(100, USD))
                .with_target(CouponTarget::parse("gift-wrap")),
        ]);

    let result = engine().compute(&snapshot);

    assert_eq!(result.grand_total(), Money::from_minor(500, USD));

    Ok(())
}
