//! Applier
//!
//! Posts price adjustments into a [`Ledger`], resolving percentages against running grand
//! totals and clamping reductions so no grand total goes below zero.

use rusty_money::{Money, iso::Currency};
use smallvec::SmallVec;
use thiserror::Error;
use tracing::debug;

use crate::{
    adjustments::{Amount, BucketKey, Label, PerItem, PriceAdjustment},
    ledger::Ledger,
    pricing::{PricingError, add_minor, percent_of_minor},
};

/// Errors that can occur when applying a price adjustment.
#[derive(Debug, Error, PartialEq)]
pub enum ApplyError {
    /// The adjustment has an empty code.
    #[error("price adjustment has no code")]
    MissingCode,

    /// The adjustment does not carry exactly one aggregating label.
    #[error("price adjustment {code} carries {count} aggregating labels, expected exactly one")]
    LabelCount {
        /// Adjustment code.
        code: String,

        /// Number of aggregating labels found.
        count: usize,
    },

    /// A flat amount is priced in a currency other than the cart's.
    #[error("price adjustment {code} has currency {actual}, but cart has currency {expected}")]
    CurrencyMismatch {
        /// Adjustment code.
        code: String,

        /// Cart currency.
        expected: &'static str,

        /// Adjustment currency.
        actual: &'static str,
    },

    /// Wrapped minor unit arithmetic error.
    #[error(transparent)]
    Pricing(#[from] PricingError),
}

/// Applies adjustments to a ledger and records their realized amounts.
#[derive(Debug)]
pub struct Applier<'a> {
    currency: &'static Currency,
    ledger: Ledger,
    applied: Vec<PriceAdjustment<'a>>,
}

impl<'a> Applier<'a> {
    /// Create an applier over an empty ledger.
    pub fn new(currency: &'static Currency) -> Self {
        Self {
            currency,
            ledger: Ledger::new(),
            applied: Vec::new(),
        }
    }

    /// Apply one adjustment and return it with its realized amounts.
    ///
    /// Percentages resolve against the target bucket's grand total at this moment. A
    /// whole-cart amount is clamped so the cart grand total stays non-negative; a per-item
    /// amount is clamped against both the cart and its own bucket. The realized amount is the
    /// sum of the applied deltas, and the ledger is left untouched when an error is returned.
    ///
    /// # Errors
    ///
    /// Returns an [`ApplyError`] if the code is empty, the labels are ambiguous, a flat amount
    /// is in the wrong currency, or arithmetic overflows.
    pub fn apply(&mut self, adjustment: PriceAdjustment<'a>) -> Result<PriceAdjustment<'a>, ApplyError> {
        if adjustment.code().trim().is_empty() {
            return Err(ApplyError::MissingCode);
        }

        let label = single_aggregating_label(&adjustment)?;

        self.check_currency(&adjustment)?;

        let mut cart_gt = self.ledger.grand_total();
        let mut postings: SmallVec<[(BucketKey, i64); 4]> = SmallVec::new();

        if adjustment.is_whole_cart() {
            let delta = match adjustment.amount() {
                Some(amount) => resolve(amount, cart_gt)?,
                None => 0,
            };

            postings.push((BucketKey::Cart, clamp(delta, cart_gt)?));
        } else {
            for (bucket, amount) in adjustment.per_item_amounts().iter() {
                let bucket_gt = match bucket {
                    BucketKey::Cart => cart_gt,
                    BucketKey::Item(_) => self.ledger.grand_total_of(bucket),
                };

                let mut delta = clamp(resolve(amount, bucket_gt)?, cart_gt)?;

                if bucket != BucketKey::Cart {
                    delta = clamp(delta, bucket_gt)?;
                }

                cart_gt = add_minor(cart_gt, delta)?;
                postings.push((bucket, delta));
            }
        }

        let mut total = 0_i64;
        let mut realized_per_item = PerItem::new();

        for (bucket, delta) in &postings {
            self.post(*bucket, label, *delta)?;
            total = add_minor(total, *delta)?;

            if !adjustment.is_whole_cart() {
                realized_per_item.insert(*bucket, Amount::flat_minor(*delta, self.currency));
            }
        }

        debug!(
            code = adjustment.code(),
            priority = adjustment.priority(),
            label = %label,
            realized = total,
            "applied price adjustment"
        );

        let realized = adjustment.into_realized(Money::from_minor(total, self.currency), realized_per_item);

        self.applied.push(realized.clone());

        Ok(realized)
    }

    /// Running ledger.
    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    /// Adjustments applied so far, with realized amounts, in application order.
    pub fn applied(&self) -> &[PriceAdjustment<'a>] {
        &self.applied
    }

    /// Cart currency.
    pub fn currency(&self) -> &'static Currency {
        self.currency
    }

    /// Consume the applier, returning the ledger and the realized adjustments.
    pub fn finish(self) -> (Ledger, Vec<PriceAdjustment<'a>>) {
        (self.ledger, self.applied)
    }

    fn post(&mut self, bucket: BucketKey, label: Label, delta: i64) -> Result<(), PricingError> {
        if bucket != BucketKey::Cart {
            self.ledger.post(bucket, Label::GrandTotal, delta)?;
            self.ledger.post(bucket, label, delta)?;
        }

        self.ledger.post(BucketKey::Cart, Label::GrandTotal, delta)?;
        self.ledger.post(BucketKey::Cart, label, delta)
    }

    fn check_currency(&self, adjustment: &PriceAdjustment<'a>) -> Result<(), ApplyError> {
        let amounts = adjustment
            .amount()
            .into_iter()
            .chain(adjustment.per_item_amounts().iter().map(|(_, amount)| amount));

        for amount in amounts {
            if let Some(money) = amount.as_money()
                && money.currency() != self.currency
            {
                return Err(ApplyError::CurrencyMismatch {
                    code: adjustment.code().to_string(),
                    expected: self.currency.iso_alpha_code,
                    actual: money.currency().iso_alpha_code,
                });
            }
        }

        Ok(())
    }
}

fn single_aggregating_label(adjustment: &PriceAdjustment<'_>) -> Result<Label, ApplyError> {
    let mut labels = adjustment.labels().aggregating();

    match (labels.next(), labels.next()) {
        (Some(label), None) => Ok(label),
        _ => Err(ApplyError::LabelCount {
            code: adjustment.code().to_string(),
            count: adjustment.labels().aggregating().count(),
        }),
    }
}

fn resolve(amount: &Amount<'_>, base: i64) -> Result<i64, PricingError> {
    match amount {
        Amount::Flat(money) => Ok(money.to_minor_units()),
        Amount::Percent(percent) => percent_of_minor(percent, base),
    }
}

fn clamp(delta: i64, base: i64) -> Result<i64, PricingError> {
    if add_minor(base, delta)? < 0 {
        Ok(base.saturating_neg())
    } else {
        Ok(delta)
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;
    use rusty_money::iso::{GBP, USD};
    use testresult::TestResult;

    use crate::adjustments::{LabelSet, priority};

    use super::*;

    fn subtotal<'a>(entries: &[(usize, i64)]) -> PriceAdjustment<'a> {
        PriceAdjustment::per_item(
            "subtotal",
            "Subtotal",
            priority::SUBTOTAL,
            LabelSet::single(Label::Subtotal),
            entries
                .iter()
                .map(|(index, minor)| (BucketKey::from_index(*index), Amount::flat_minor(*minor, USD)))
                .collect(),
        )
    }

    #[test]
    fn per_item_amounts_mirror_into_cart_bucket() -> TestResult {
        let mut applier = Applier::new(USD);

        let realized = applier.apply(subtotal(&[(1, 10_000), (2, 30_000)]))?;
        let ledger = applier.ledger();

        assert_eq!(realized.realized_minor(), Some(40_000));
        assert_eq!(ledger.get(BucketKey::Cart, Label::Subtotal), 40_000);
        assert_eq!(ledger.grand_total(), 40_000);
        assert_eq!(ledger.grand_total_of(BucketKey::Item(2)), 30_000);
        assert!(ledger.is_balanced(BucketKey::Cart));
        assert!(ledger.is_balanced(BucketKey::Item(1)));

        Ok(())
    }

    #[test]
    fn whole_cart_percent_resolves_against_running_total() -> TestResult {
        let mut applier = Applier::new(USD);

        applier.apply(subtotal(&[(1, 34_700)]))?;

        let realized = applier.apply(PriceAdjustment::new(
            "tax",
            "Tax",
            priority::TAX,
            Amount::percent_points(Decimal::from(6)),
            LabelSet::single(Label::Tax),
        ))?;

        assert_eq!(realized.amount(), Some(&Amount::flat_minor(2_082, USD)));
        assert_eq!(applier.ledger().grand_total(), 36_782);

        Ok(())
    }

    #[test]
    fn whole_cart_reduction_clamps_to_zero() -> TestResult {
        let mut applier = Applier::new(USD);

        applier.apply(subtotal(&[(1, 1_000)]))?;

        let realized = applier.apply(PriceAdjustment::new(
            "gift",
            "Gift card",
            priority::GIFT_CARD,
            Amount::flat_minor(-99_999, USD),
            LabelSet::single(Label::GiftCard),
        ))?;

        assert_eq!(realized.realized_minor(), Some(-1_000));
        assert_eq!(applier.ledger().grand_total(), 0);

        Ok(())
    }

    #[test]
    fn per_item_reduction_clamps_to_item_total() -> TestResult {
        let mut applier = Applier::new(USD);

        applier.apply(subtotal(&[(1, 500), (2, 2_000)]))?;

        let discount = PriceAdjustment::per_item(
            "bogo",
            "Buy one get one",
            priority::DISCOUNT,
            LabelSet::single(Label::Discount),
            [(BucketKey::Item(1), Amount::flat_minor(-900, USD))]
                .into_iter()
                .collect(),
        );

        let realized = applier.apply(discount)?;

        assert_eq!(realized.realized_minor(), Some(-500));
        assert_eq!(
            realized.per_item_amounts().get(BucketKey::Item(1)),
            Some(&Amount::flat_minor(-500, USD))
        );
        assert_eq!(applier.ledger().grand_total_of(BucketKey::Item(1)), 0);
        assert_eq!(applier.ledger().grand_total(), 2_000);

        Ok(())
    }

    #[test]
    fn per_item_percent_resolves_against_item_total() -> TestResult {
        let mut applier = Applier::new(USD);

        applier.apply(subtotal(&[(1, 1_000), (2, 2_000)]))?;

        let tax = PriceAdjustment::per_item(
            "tax-ny",
            "Tax",
            priority::TAX,
            LabelSet::single(Label::Tax),
            [
                (BucketKey::Item(1), Amount::percent_points(Decimal::from(10))),
                (BucketKey::Item(2), Amount::percent_points(Decimal::from(10))),
            ]
            .into_iter()
            .collect(),
        );

        let realized = applier.apply(tax)?;

        assert_eq!(realized.realized_minor(), Some(300));
        assert_eq!(applier.ledger().get(BucketKey::Item(2), Label::Tax), 200);

        Ok(())
    }

    #[test]
    fn rejects_missing_code_without_touching_ledger() {
        let mut applier = Applier::new(USD);

        let result = applier.apply(PriceAdjustment::new(
            " ",
            "Nameless",
            priority::SHIPPING,
            Amount::flat_minor(100, USD),
            LabelSet::single(Label::Shipping),
        ));

        assert_eq!(result, Err(ApplyError::MissingCode));
        assert_eq!(applier.ledger().grand_total(), 0);
        assert!(applier.applied().is_empty());
    }

    #[test]
    fn rejects_ambiguous_labels() {
        let mut applier = Applier::new(USD);

        let result = applier.apply(PriceAdjustment::new(
            "both",
            "Both",
            priority::SHIPPING,
            Amount::flat_minor(100, USD),
            LabelSet::from_labels(&[Label::Shipping, Label::Tax]),
        ));

        assert_eq!(
            result,
            Err(ApplyError::LabelCount {
                code: "both".to_string(),
                count: 2,
            })
        );
    }

    #[test]
    fn rejects_foreign_currency() {
        let mut applier = Applier::new(USD);

        let result = applier.apply(PriceAdjustment::new(
            "ship",
            "Shipping",
            priority::SHIPPING,
            Amount::flat_minor(100, GBP),
            LabelSet::single(Label::Shipping),
        ));

        assert_eq!(
            result,
            Err(ApplyError::CurrencyMismatch {
                code: "ship".to_string(),
                expected: USD.iso_alpha_code,
                actual: GBP.iso_alpha_code,
            })
        );
    }
}
