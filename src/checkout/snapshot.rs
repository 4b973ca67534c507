//! Checkout snapshot

use jiff::Timestamp;

use crate::{
    cart::Cart,
    contributors::{gift_card::GiftCard, shipping::ShippingRate, tax::Address},
    coupons::CouponRecord,
};

/// Everything one pricing pass reads. The engine never performs I/O, so coupon records are
/// loaded into the snapshot beforehand.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckoutSnapshot<'a> {
    /// Cart contents.
    pub cart: Cart<'a>,

    /// Selected shipping rate.
    pub shipping_rate: Option<ShippingRate<'a>>,

    /// Shipping address used for tax lookups.
    pub shipping_address: Option<Address>,

    /// Redeemed coupon codes, in redemption order.
    pub redeemed_codes: Vec<String>,

    /// Coupon records for the redeemed codes.
    pub coupons: Vec<CouponRecord<'a>>,

    /// Gift cards applied to the checkout.
    pub gift_cards: Vec<GiftCard<'a>>,

    /// Instant used for validity windows.
    pub now: Timestamp,
}

impl<'a> CheckoutSnapshot<'a> {
    /// Create a snapshot with only a cart.
    pub fn new(cart: Cart<'a>, now: Timestamp) -> Self {
        Self {
            cart,
            shipping_rate: None,
            shipping_address: None,
            redeemed_codes: Vec::new(),
            coupons: Vec::new(),
            gift_cards: Vec::new(),
            now,
        }
    }

    /// Set the shipping rate.
    #[must_use]
    pub fn with_shipping_rate(mut self, rate: ShippingRate<'a>) -> Self {
        self.shipping_rate = Some(rate);
        self
    }

    /// Set the shipping address.
    #[must_use]
    pub fn with_shipping_address(mut self, address: Address) -> Self {
        self.shipping_address = Some(address);
        self
    }

    /// Set the redeemed codes.
    #[must_use]
    pub fn with_redeemed_codes<I, S>(mut self, codes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.redeemed_codes = codes.into_iter().map(Into::into).collect();
        self
    }

    /// Set the coupon records.
    #[must_use]
    pub fn with_coupons(mut self, coupons: Vec<CouponRecord<'a>>) -> Self {
        self.coupons = coupons;
        self
    }

    /// Set the gift cards.
    #[must_use]
    pub fn with_gift_cards(mut self, gift_cards: Vec<GiftCard<'a>>) -> Self {
        self.gift_cards = gift_cards;
        self
    }
}
