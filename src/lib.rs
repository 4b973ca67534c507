//! Tally
//!
//! Tally is the checkout price-adjustment engine: it turns a cart, a set of shipping, tax and
//! discount contributors and a list of redeemed coupon codes into a reproducible, auditable
//! breakdown of subtotal, shipping, discount, tax and grand total.

pub mod adjustments;
pub mod applier;
pub mod cart;
pub mod checkout;
pub mod config;
pub mod contributors;
pub mod coupons;
pub mod engine;
pub mod fixtures;
pub mod ledger;
pub mod prelude;
pub mod pricing;
pub mod result;
pub mod sequencer;
pub mod utils;
