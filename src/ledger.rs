//! Ledger
//!
//! Running totals per bucket and label. Bucket [`BucketKey::Cart`] is the canonical point for
//! every aggregate: per-item postings are mirrored into it, so the cart grand total always
//! equals the sum of every applied amount.

use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::{
    adjustments::{BucketKey, Label},
    pricing::{PricingError, add_minor},
};

/// Minor-unit totals keyed by bucket, then label.
#[derive(Debug, Clone, PartialEq)]
pub struct Ledger {
    buckets: FxHashMap<BucketKey, FxHashMap<Label, i64>>,
}

impl Default for Ledger {
    fn default() -> Self {
        Self::new()
    }
}

impl Ledger {
    /// Create a ledger holding only the zeroed cart bucket.
    pub fn new() -> Self {
        let mut buckets = FxHashMap::default();
        buckets.insert(BucketKey::Cart, FxHashMap::default());

        Self { buckets }
    }

    /// Total for `label` in `bucket`, 0 when nothing was posted.
    pub fn get(&self, bucket: BucketKey, label: Label) -> i64 {
        self.buckets
            .get(&bucket)
            .and_then(|totals| totals.get(&label))
            .copied()
            .unwrap_or(0)
    }

    /// Grand total of a bucket.
    pub fn grand_total_of(&self, bucket: BucketKey) -> i64 {
        self.get(bucket, Label::GrandTotal)
    }

    /// Cart grand total.
    pub fn grand_total(&self) -> i64 {
        self.grand_total_of(BucketKey::Cart)
    }

    /// Bucket keys in ascending order, cart first.
    pub fn bucket_keys(&self) -> SmallVec<[BucketKey; 8]> {
        let mut keys: SmallVec<[BucketKey; 8]> = self.buckets.keys().copied().collect();
        keys.sort_unstable();
        keys
    }

    /// Whether the non-grand-total labels of `bucket` sum to its grand total.
    pub fn is_balanced(&self, bucket: BucketKey) -> bool {
        let Some(totals) = self.buckets.get(&bucket) else {
            return true;
        };

        let labelled = totals
            .iter()
            .filter(|(label, _)| label.is_aggregating())
            .try_fold(0_i64, |acc, (_, value)| acc.checked_add(*value));

        labelled == Some(self.grand_total_of(bucket))
    }

    pub(crate) fn post(&mut self, bucket: BucketKey, label: Label, delta: i64) -> Result<(), PricingError> {
        let totals = self.buckets.entry(bucket).or_default();
        let entry = totals.entry(label).or_insert(0);

        *entry = add_minor(*entry, delta)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use testresult::TestResult;

    use super::*;

    #[test]
    fn new_ledger_starts_at_zero() {
        let ledger = Ledger::new();

        assert_eq!(ledger.grand_total(), 0);
        assert_eq!(ledger.get(BucketKey::Item(1), Label::Subtotal), 0);
        assert_eq!(ledger.bucket_keys().as_slice(), &[BucketKey::Cart]);
    }

    #[test]
    fn posts_accumulate_per_label() -> TestResult {
        let mut ledger = Ledger::new();

        ledger.post(BucketKey::Item(2), Label::Subtotal, 300)?;
        ledger.post(BucketKey::Item(2), Label::GrandTotal, 300)?;
        ledger.post(BucketKey::Item(2), Label::Discount, -50)?;
        ledger.post(BucketKey::Item(2), Label::GrandTotal, -50)?;

        assert_eq!(ledger.get(BucketKey::Item(2), Label::Discount), -50);
        assert_eq!(ledger.grand_total_of(BucketKey::Item(2)), 250);
        assert!(ledger.is_balanced(BucketKey::Item(2)));
        assert_eq!(
            ledger.bucket_keys().as_slice(),
            &[BucketKey::Cart, BucketKey::Item(2)]
        );

        Ok(())
    }

    #[test]
    fn unbalanced_bucket_is_detected() -> TestResult {
        let mut ledger = Ledger::new();

        ledger.post(BucketKey::Cart, Label::Tax, 10)?;

        assert!(!ledger.is_balanced(BucketKey::Cart));

        Ok(())
    }

    #[test]
    fn post_overflow_returns_error() -> TestResult {
        let mut ledger = Ledger::new();

        ledger.post(BucketKey::Cart, Label::Subtotal, i64::MAX)?;

        assert_eq!(
            ledger.post(BucketKey::Cart, Label::Subtotal, 1),
            Err(PricingError::Overflow)
        );

        Ok(())
    }
}
