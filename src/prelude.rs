//! Tally prelude.
//!
//! Convenience exports for common library consumers.

pub use crate::{
    adjustments::{Amount, BucketKey, Label, LabelSet, PerItem, PriceAdjustment, priority},
    applier::{ApplyError, Applier},
    cart::{Cart, CartError, CartItem},
    checkout::{Checkout, CheckoutSnapshot},
    config::{ConfigError, PricingConfig, SalePriceReporting},
    contributors::{
        Address, CalculationContext, Contribution, Contributor, ContributorKey,
        ContributorRegistry, GiftCard, GiftCardContributor, SalePrice, SalePriceContributor,
        ShippingContributor, ShippingRate, TaxContributor, TaxRule,
    },
    coupons::{
        CouponContributor, CouponRecord, CouponStore, CouponStoreError, CouponTarget,
        InMemoryCouponStore, evaluate_limits,
    },
    engine::PricingEngine,
    ledger::Ledger,
    pricing::PricingError,
    result::{PricingResult, ResultError},
};
