//! Calculation context

use jiff::Timestamp;
use rusty_money::iso::Currency;

use crate::{
    adjustments::{BucketKey, Label},
    cart::Cart,
    checkout::CheckoutSnapshot,
    contributors::{gift_card::GiftCard, shipping::ShippingRate, tax::Address},
    coupons::CouponRecord,
    ledger::Ledger,
};

/// Read-only view handed to contributors: the checkout inputs plus the running totals of
/// everything applied before the current phase.
#[derive(Debug, Clone, Copy)]
pub struct CalculationContext<'s, 'a> {
    snapshot: &'s CheckoutSnapshot<'a>,
    ledger: &'s Ledger,
}

impl<'s, 'a> CalculationContext<'s, 'a> {
    /// Create a context over a snapshot and ledger.
    pub fn new(snapshot: &'s CheckoutSnapshot<'a>, ledger: &'s Ledger) -> Self {
        Self { snapshot, ledger }
    }

    /// The whole snapshot.
    pub fn snapshot(&self) -> &'s CheckoutSnapshot<'a> {
        self.snapshot
    }

    /// Cart contents.
    pub fn cart(&self) -> &'s Cart<'a> {
        &self.snapshot.cart
    }

    /// Cart currency.
    pub fn currency(&self) -> &'static Currency {
        self.snapshot.cart.currency()
    }

    /// Instant used for validity windows.
    pub fn now(&self) -> Timestamp {
        self.snapshot.now
    }

    /// Redeemed coupon codes.
    pub fn redeemed_codes(&self) -> &'s [String] {
        &self.snapshot.redeemed_codes
    }

    /// Preloaded coupon records.
    pub fn coupons(&self) -> &'s [CouponRecord<'a>] {
        &self.snapshot.coupons
    }

    /// Gift cards.
    pub fn gift_cards(&self) -> &'s [GiftCard<'a>] {
        &self.snapshot.gift_cards
    }

    /// Selected shipping rate.
    pub fn shipping_rate(&self) -> Option<&'s ShippingRate<'a>> {
        self.snapshot.shipping_rate.as_ref()
    }

    /// Shipping address.
    pub fn shipping_address(&self) -> Option<&'s Address> {
        self.snapshot.shipping_address.as_ref()
    }

    /// Running total for `label` in `bucket`.
    pub fn total(&self, bucket: BucketKey, label: Label) -> i64 {
        self.ledger.get(bucket, label)
    }

    /// Running grand total of a bucket.
    pub fn grand_total_of(&self, bucket: BucketKey) -> i64 {
        self.ledger.grand_total_of(bucket)
    }

    /// Running cart grand total.
    pub fn grand_total(&self) -> i64 {
        self.ledger.grand_total()
    }
}
