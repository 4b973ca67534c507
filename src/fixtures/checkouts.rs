//! Checkout Fixtures

use std::collections::BTreeMap;

use jiff::Timestamp;
use rusty_money::iso::Currency;
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::{
    adjustments::{BucketKey, Label, LabelSet, PerItem, PriceAdjustment},
    cart::CartItem,
    contributors::{Address, GiftCard, SalePrice, ShippingRate, TaxRule},
    coupons::{CouponRecord, CouponTarget},
    fixtures::{
        FixtureError,
        prices::{parse_amount, parse_money, parse_points},
    },
};

/// A checkout fixture file.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CheckoutFixture {
    /// ISO currency code for every price in the file.
    pub currency: String,

    /// Pricing instant, defaults to the Unix epoch.
    #[serde(default)]
    pub now: Option<Timestamp>,

    /// Cart items.
    pub items: Vec<ItemFixture>,

    /// Selected shipping rate.
    #[serde(default)]
    pub shipping: Option<ShippingFixture>,

    /// Shipping address.
    #[serde(default)]
    pub address: Option<AddressFixture>,

    /// Sale price catalog.
    #[serde(default)]
    pub sale_prices: Vec<SalePriceFixture>,

    /// Tax rate table.
    #[serde(default)]
    pub tax_rules: Vec<TaxRuleFixture>,

    /// Applied gift cards.
    #[serde(default)]
    pub gift_cards: Vec<GiftCardFixture>,

    /// Coupon records available to the store.
    #[serde(default)]
    pub coupons: Vec<CouponFixture>,

    /// Redeemed coupon codes.
    #[serde(default)]
    pub redeemed: Vec<String>,

    /// Raw adjustments for direct replay.
    #[serde(default)]
    pub adjustments: Vec<AdjustmentFixture>,
}

/// Cart item fixture
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ItemFixture {
    /// Item index, starting at 1.
    pub index: usize,

    /// Product identifier.
    pub product: String,

    /// Quantity.
    #[serde(default = "default_qty")]
    pub qty: u32,

    /// Unit price (e.g., "100.00 USD").
    pub price: String,

    /// Whether coupons may target the item.
    #[serde(default = "default_discountable")]
    pub discountable: bool,

    /// Whether the line sells a gift card.
    #[serde(default)]
    pub gift_card: bool,
}

fn default_qty() -> u32 {
    1
}

fn default_discountable() -> bool {
    true
}

impl ItemFixture {
    pub(crate) fn to_item(&self, currency: &'static Currency) -> Result<CartItem<'static>, FixtureError> {
        let unit_price = parse_money(&self.price, currency)?;

        Ok(CartItem::new(self.index, self.product.as_str(), self.qty, unit_price)
            .with_discountable(self.discountable)
            .with_gift_card(self.gift_card))
    }
}

/// Shipping rate fixture
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ShippingFixture {
    /// Rate code.
    pub code: String,

    /// Display name.
    pub name: String,

    /// Price.
    pub price: String,
}

impl ShippingFixture {
    pub(crate) fn to_rate(&self, currency: &'static Currency) -> Result<ShippingRate<'static>, FixtureError> {
        Ok(ShippingRate::new(
            self.code.as_str(),
            self.name.as_str(),
            parse_money(&self.price, currency)?,
        ))
    }
}

/// Shipping address fixture
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AddressFixture {
    /// State code.
    pub state: String,

    /// Zip code.
    pub zip: String,
}

impl From<&AddressFixture> for Address {
    fn from(fixture: &AddressFixture) -> Self {
        Address::new(fixture.state.as_str(), fixture.zip.as_str())
    }
}

/// Sale price fixture
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SalePriceFixture {
    /// Product identifier.
    pub product: String,

    /// Sale unit price.
    pub price: String,

    /// Sale start.
    #[serde(default)]
    pub since: Option<Timestamp>,

    /// Sale end.
    #[serde(default)]
    pub until: Option<Timestamp>,
}

impl SalePriceFixture {
    pub(crate) fn to_sale_price(&self, currency: &'static Currency) -> Result<SalePrice<'static>, FixtureError> {
        Ok(
            SalePrice::new(self.product.as_str(), parse_money(&self.price, currency)?)
                .with_window(self.since, self.until),
        )
    }
}

/// Tax rule fixture
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TaxRuleFixture {
    /// Rule code.
    pub code: String,

    /// Display name.
    pub name: String,

    /// State, or `*`.
    pub state: String,

    /// Zip, or `*`.
    pub zip: String,

    /// Rate (e.g., "6%").
    pub rate: String,
}

impl TryFrom<&TaxRuleFixture> for TaxRule {
    type Error = FixtureError;

    fn try_from(fixture: &TaxRuleFixture) -> Result<Self, Self::Error> {
        Ok(TaxRule::new(
            fixture.code.as_str(),
            fixture.name.as_str(),
            fixture.state.as_str(),
            fixture.zip.as_str(),
            parse_points(&fixture.rate)?,
        ))
    }
}

/// Gift card fixture
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GiftCardFixture {
    /// Card code.
    pub code: String,

    /// Display name.
    pub name: String,

    /// Remaining balance.
    pub balance: String,
}

impl GiftCardFixture {
    pub(crate) fn to_card(&self, currency: &'static Currency) -> Result<GiftCard<'static>, FixtureError> {
        Ok(GiftCard::new(
            self.code.as_str(),
            self.name.as_str(),
            parse_money(&self.balance, currency)?,
        ))
    }
}

/// Coupon fixture
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CouponFixture {
    /// Coupon code.
    pub code: String,

    /// Display name.
    pub name: String,

    /// Flat amount off, per unit or per cart.
    #[serde(default)]
    pub amount: Option<String>,

    /// Percent off (e.g., "10%").
    #[serde(default)]
    pub percent: Option<String>,

    /// Empty or `cart` for the whole cart, otherwise comma-separated product ids.
    #[serde(default)]
    pub target: String,

    /// Validity start.
    #[serde(default)]
    pub since: Option<Timestamp>,

    /// Validity end.
    #[serde(default)]
    pub until: Option<Timestamp>,

    /// Usage limits.
    #[serde(default)]
    pub limits: Map<String, Value>,
}

impl CouponFixture {
    pub(crate) fn to_record(&self, currency: &'static Currency) -> Result<CouponRecord<'static>, FixtureError> {
        let mut record = CouponRecord::new(self.code.as_str(), self.name.as_str(), currency)
            .with_target(CouponTarget::parse(&self.target))
            .with_window(self.since, self.until)
            .with_limits(self.limits.clone());

        if let Some(amount) = &self.amount {
            record = record.with_amount(parse_money(amount, currency)?);
        }

        if let Some(percent) = &self.percent {
            record = record.with_percent(parse_points(percent)?);
        }

        Ok(record)
    }
}

/// Raw adjustment fixture, replayed through the applier.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AdjustmentFixture {
    /// Adjustment code.
    pub code: String,

    /// Display name, defaults to the code.
    #[serde(default)]
    pub name: Option<String>,

    /// Priority.
    pub priority: f64,

    /// Labels.
    pub labels: Vec<Label>,

    /// Whole-cart amount.
    #[serde(default)]
    pub amount: Option<String>,

    /// Per-item amounts keyed by bucket index, `0` naming the whole cart.
    #[serde(default)]
    pub per_item: BTreeMap<usize, String>,
}

impl AdjustmentFixture {
    pub(crate) fn to_adjustment(&self, currency: &'static Currency) -> Result<PriceAdjustment<'static>, FixtureError> {
        let name = self.name.as_deref().unwrap_or(&self.code);
        let labels: LabelSet = self.labels.iter().copied().collect();

        if let Some(amount) = &self.amount {
            return Ok(PriceAdjustment::new(
                self.code.as_str(),
                name,
                self.priority,
                parse_amount(amount, currency)?,
                labels,
            ));
        }

        let per_item = self
            .per_item
            .iter()
            .map(|(index, amount)| Ok((BucketKey::from_index(*index), parse_amount(amount, currency)?)))
            .collect::<Result<PerItem<'static>, FixtureError>>()?;

        Ok(PriceAdjustment::per_item(self.code.as_str(), name, self.priority, labels, per_item))
    }
}
