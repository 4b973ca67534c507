//! Fixtures
//!
//! Checkout fixture sets live in `fixtures/checkouts/<name>.yml`. A set describes a cart and
//! everything around it: shipping, address, sale prices, tax rules, gift cards, coupons and
//! redeemed codes, plus optional raw adjustments for replaying straight through an
//! [`Applier`](crate::applier::Applier).

use std::{
    fs,
    path::{Path, PathBuf},
};

use jiff::Timestamp;
use rusty_money::iso::Currency;
use thiserror::Error;

use crate::{
    adjustments::PriceAdjustment,
    cart::{Cart, CartError},
    checkout::{Checkout, CheckoutSnapshot},
    config::PricingConfig,
    contributors::{Address, GiftCard, SalePrice, ShippingRate, TaxRule},
    coupons::{CouponRecord, InMemoryCouponStore},
    engine::PricingEngine,
    fixtures::{checkouts::CheckoutFixture, prices::parse_currency},
};

pub mod checkouts;
pub mod prices;

const DEFAULT_BASE_PATH: &str = "./fixtures";

/// Fixture Parsing Errors
#[derive(Debug, Error)]
pub enum FixtureError {
    /// IO error reading fixture files
    #[error("Failed to read fixture file: {0}")]
    Io(#[from] std::io::Error),

    /// YAML parsing error
    #[error("Failed to parse YAML: {0}")]
    Yaml(#[from] serde_norway::Error),

    /// Invalid price format
    #[error("Invalid price format: {0}")]
    InvalidPrice(String),

    /// Invalid percentage format
    #[error("Invalid percentage format: {0}")]
    InvalidPercentage(String),

    /// Unknown currency code
    #[error("Unknown currency code: {0}")]
    UnknownCurrency(String),

    /// Price in a currency other than the fixture's
    #[error("Currency mismatch: expected {0}, found {1}")]
    CurrencyMismatch(String, String),

    /// Cart construction error
    #[error("Failed to create cart: {0}")]
    Cart(#[from] CartError),
}

/// A loaded checkout fixture set.
#[derive(Debug, Clone)]
pub struct Fixture {
    currency: &'static Currency,
    now: Timestamp,
    cart: Cart<'static>,
    shipping_rate: Option<ShippingRate<'static>>,
    address: Option<Address>,
    sale_prices: Vec<SalePrice<'static>>,
    tax_rules: Vec<TaxRule>,
    gift_cards: Vec<GiftCard<'static>>,
    coupons: Vec<CouponRecord<'static>>,
    redeemed: Vec<String>,
    adjustments: Vec<PriceAdjustment<'static>>,
}

impl Fixture {
    /// Load a fixture set by name from `./fixtures/checkouts`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_set(name: &str) -> Result<Self, FixtureError> {
        Self::from_set_in(DEFAULT_BASE_PATH, name)
    }

    /// Load a fixture set by name from `<base_path>/checkouts`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_set_in(base_path: impl Into<PathBuf>, name: &str) -> Result<Self, FixtureError> {
        let file_path = base_path.into().join("checkouts").join(format!("{name}.yml"));

        Self::from_path(file_path)
    }

    /// Load a fixture file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, FixtureError> {
        let contents = fs::read_to_string(path)?;

        Self::from_yaml_str(&contents)
    }

    /// Parse a fixture document.
    ///
    /// # Errors
    ///
    /// Returns an error if the document is malformed, a price or percentage cannot be parsed,
    /// a price is in another currency, or the items do not form a valid cart.
    pub fn from_yaml_str(contents: &str) -> Result<Self, FixtureError> {
        let fixture: CheckoutFixture = serde_norway::from_str(contents)?;
        let currency = parse_currency(&fixture.currency)?;

        let items = fixture
            .items
            .iter()
            .map(|item| item.to_item(currency))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            currency,
            now: fixture.now.unwrap_or(Timestamp::UNIX_EPOCH),
            cart: Cart::with_items(items, currency)?,
            shipping_rate: fixture
                .shipping
                .as_ref()
                .map(|shipping| shipping.to_rate(currency))
                .transpose()?,
            address: fixture.address.as_ref().map(Address::from),
            sale_prices: fixture
                .sale_prices
                .iter()
                .map(|sale| sale.to_sale_price(currency))
                .collect::<Result<_, _>>()?,
            tax_rules: fixture
                .tax_rules
                .iter()
                .map(TaxRule::try_from)
                .collect::<Result<_, _>>()?,
            gift_cards: fixture
                .gift_cards
                .iter()
                .map(|card| card.to_card(currency))
                .collect::<Result<_, _>>()?,
            coupons: fixture
                .coupons
                .iter()
                .map(|coupon| coupon.to_record(currency))
                .collect::<Result<_, _>>()?,
            redeemed: fixture.redeemed,
            adjustments: fixture
                .adjustments
                .iter()
                .map(|adjustment| adjustment.to_adjustment(currency))
                .collect::<Result<_, _>>()?,
        })
    }

    /// Fixture currency.
    pub fn currency(&self) -> &'static Currency {
        self.currency
    }

    /// Pricing instant.
    pub fn now(&self) -> Timestamp {
        self.now
    }

    /// Cart built from the fixture items.
    pub fn cart(&self) -> &Cart<'static> {
        &self.cart
    }

    /// Tax rules.
    pub fn tax_rules(&self) -> &[TaxRule] {
        &self.tax_rules
    }

    /// Sale prices.
    pub fn sale_prices(&self) -> &[SalePrice<'static>] {
        &self.sale_prices
    }

    /// Coupon records.
    pub fn coupons(&self) -> &[CouponRecord<'static>] {
        &self.coupons
    }

    /// Redeemed coupon codes.
    pub fn redeemed(&self) -> &[String] {
        &self.redeemed
    }

    /// Raw adjustments, in file order.
    pub fn adjustments(&self) -> &[PriceAdjustment<'static>] {
        &self.adjustments
    }

    /// Coupon store holding every fixture coupon.
    pub fn coupon_store(&self) -> InMemoryCouponStore {
        InMemoryCouponStore::new(self.coupons.clone())
    }

    /// Engine with the built-in contributors, the fixture tax rules and sale prices.
    pub fn engine(&self, config: PricingConfig) -> PricingEngine {
        PricingEngine::standard(config, self.tax_rules.clone(), self.sale_prices.clone())
    }

    /// Snapshot with the redeemed codes' coupon records preloaded.
    pub fn snapshot(&self) -> CheckoutSnapshot<'static> {
        let mut snapshot = CheckoutSnapshot::new(self.cart.clone(), self.now)
            .with_redeemed_codes(self.redeemed.iter().cloned())
            .with_coupons(
                self.coupons
                    .iter()
                    .filter(|coupon| self.redeemed.contains(&coupon.code))
                    .cloned()
                    .collect(),
            )
            .with_gift_cards(self.gift_cards.clone());

        snapshot.shipping_rate.clone_from(&self.shipping_rate);
        snapshot.shipping_address.clone_from(&self.address);

        snapshot
    }

    /// Stateful checkout over the fixture inputs.
    pub fn checkout(&self) -> Checkout<'static> {
        let mut checkout = Checkout::new(self.cart.clone());

        checkout.set_shipping_rate(self.shipping_rate.clone());
        checkout.set_shipping_address(self.address.clone());

        for code in &self.redeemed {
            checkout.redeem_coupon(code.as_str());
        }

        for card in &self.gift_cards {
            checkout.apply_gift_card(card.clone());
        }

        checkout
    }
}
