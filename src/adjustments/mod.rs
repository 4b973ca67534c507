//! Price Adjustments
//!
//! A price adjustment is a signed amount, flat or percentage, targeted at the whole cart or
//! at individual cart items, labeled with the aggregate it rolls into and ordered by priority.

use std::{fmt, str::FromStr};

use decimal_percentage::Percentage;
use rust_decimal::Decimal;
use rusty_money::{Money, iso::Currency};
use smallvec::SmallVec;
use thiserror::Error;

use crate::pricing::{PricingError, add_minor, percentage_from_points, percentage_points};

pub mod labels;
pub mod priority;

pub use labels::{Label, LabelParseError, LabelSet};

/// Identifies a ledger bucket: the whole cart, or one cart item by index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum BucketKey {
    /// The whole-cart bucket, index 0.
    Cart,

    /// A cart item bucket. Item indexes start at 1.
    Item(usize),
}

impl BucketKey {
    /// Map a numeric index onto a bucket key, with `0` naming the whole cart.
    pub const fn from_index(index: usize) -> Self {
        if index == 0 {
            BucketKey::Cart
        } else {
            BucketKey::Item(index)
        }
    }

    /// The numeric index of this bucket.
    pub const fn index(self) -> usize {
        match self {
            BucketKey::Cart => 0,
            BucketKey::Item(index) => index,
        }
    }
}

impl fmt::Display for BucketKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.index())
    }
}

/// Errors that can occur when parsing a [`BucketKey`].
#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid bucket index: {0}")]
pub struct BucketKeyError(pub String);

impl FromStr for BucketKey {
    type Err = BucketKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<usize>()
            .map(BucketKey::from_index)
            .map_err(|_parse_error| BucketKeyError(s.to_string()))
    }
}

/// A flat money amount or a percentage of the target bucket's running grand total.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Amount<'a> {
    /// Flat amount in the cart currency.
    Flat(Money<'a, Currency>),

    /// Fraction of the target's grand total at the time of application.
    Percent(Percentage),
}

impl<'a> Amount<'a> {
    /// Flat amount from minor units.
    pub fn flat_minor(minor: i64, currency: &'a Currency) -> Self {
        Amount::Flat(Money::from_minor(minor, currency))
    }

    /// Percentage amount from percentage points (`-10` for a 10% reduction).
    pub fn percent_points(points: Decimal) -> Self {
        Amount::Percent(percentage_from_points(points))
    }

    /// The flat money value, if this is a flat amount.
    pub fn as_money(&self) -> Option<&Money<'a, Currency>> {
        match self {
            Amount::Flat(money) => Some(money),
            Amount::Percent(_) => None,
        }
    }

    /// Whether this is a percentage amount.
    pub fn is_percent(&self) -> bool {
        matches!(self, Amount::Percent(_))
    }
}

impl fmt::Display for Amount<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Amount::Flat(money) => write!(f, "{money}"),
            Amount::Percent(percent) => write!(f, "{}%", percentage_points(percent)),
        }
    }
}

/// Per-item amounts keyed by bucket, in insertion order with unique keys.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PerItem<'a> {
    entries: SmallVec<[(BucketKey, Amount<'a>); 4]>,
}

impl<'a> PerItem<'a> {
    /// Create an empty per-item map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an amount, replacing any existing entry for the same bucket in place.
    pub fn insert(&mut self, key: BucketKey, amount: Amount<'a>) {
        match self.entries.iter_mut().find(|(existing, _)| *existing == key) {
            Some(entry) => entry.1 = amount,
            None => self.entries.push((key, amount)),
        }
    }

    /// Add a flat amount to the entry for `key`, creating it when missing.
    ///
    /// A percentage entry for the same key is replaced by the flat amount.
    ///
    /// # Errors
    ///
    /// Returns a [`PricingError`] if the sum overflows or the currencies differ.
    pub fn accumulate(&mut self, key: BucketKey, money: Money<'a, Currency>) -> Result<(), PricingError> {
        let merged = match self.get(key).and_then(Amount::as_money) {
            Some(existing) => {
                if existing.currency() != money.currency() {
                    return Err(PricingError::Money(rusty_money::MoneyError::CurrencyMismatch {
                        expected: existing.currency().iso_alpha_code,
                        actual: money.currency().iso_alpha_code,
                    }));
                }

                Money::from_minor(
                    add_minor(existing.to_minor_units(), money.to_minor_units())?,
                    money.currency(),
                )
            }
            None => money,
        };

        self.insert(key, Amount::Flat(merged));

        Ok(())
    }

    /// Look up the amount for a bucket.
    pub fn get(&self, key: BucketKey) -> Option<&Amount<'a>> {
        self.entries
            .iter()
            .find_map(|(existing, amount)| (*existing == key).then_some(amount))
    }

    /// Iterate over the entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (BucketKey, &Amount<'a>)> + '_ {
        self.entries.iter().map(|(key, amount)| (*key, amount))
    }

    /// Iterate over the bucket keys in insertion order.
    pub fn keys(&self) -> impl Iterator<Item = BucketKey> + '_ {
        self.entries.iter().map(|(key, _)| *key)
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether there are no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<'a> FromIterator<(BucketKey, Amount<'a>)> for PerItem<'a> {
    fn from_iter<I: IntoIterator<Item = (BucketKey, Amount<'a>)>>(iter: I) -> Self {
        let mut per_item = PerItem::new();

        for (key, amount) in iter {
            per_item.insert(key, amount);
        }

        per_item
    }
}

/// A single signed contribution to the checkout totals.
///
/// When `per_item` is non-empty the adjustment is applied per bucket and `amount` is ignored
/// until the applier replaces it with the realized total.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceAdjustment<'a> {
    code: String,
    name: String,
    priority: f64,
    amount: Option<Amount<'a>>,
    labels: LabelSet,
    per_item: PerItem<'a>,
}

impl<'a> PriceAdjustment<'a> {
    /// Create a whole-cart adjustment.
    pub fn new(
        code: impl Into<String>,
        name: impl Into<String>,
        priority: f64,
        amount: Amount<'a>,
        labels: LabelSet,
    ) -> Self {
        Self {
            code: code.into(),
            name: name.into(),
            priority,
            amount: Some(amount),
            labels,
            per_item: PerItem::new(),
        }
    }

    /// Create a per-item adjustment.
    pub fn per_item(
        code: impl Into<String>,
        name: impl Into<String>,
        priority: f64,
        labels: LabelSet,
        per_item: PerItem<'a>,
    ) -> Self {
        Self {
            code: code.into(),
            name: name.into(),
            priority,
            amount: None,
            labels,
            per_item,
        }
    }

    /// Replace the priority.
    #[must_use]
    pub fn with_priority(mut self, priority: f64) -> Self {
        self.priority = priority;
        self
    }

    /// Stable identifier of the adjustment.
    pub fn code(&self) -> &str {
        &self.code
    }

    /// Display name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Ordering key; lower applies first.
    pub fn priority(&self) -> f64 {
        self.priority
    }

    /// Whole-cart amount, or the realized total once applied.
    pub fn amount(&self) -> Option<&Amount<'a>> {
        self.amount.as_ref()
    }

    /// Labels carried by the adjustment.
    pub fn labels(&self) -> &LabelSet {
        &self.labels
    }

    /// Per-item amounts.
    pub fn per_item_amounts(&self) -> &PerItem<'a> {
        &self.per_item
    }

    /// Whether the adjustment targets the whole cart.
    pub fn is_whole_cart(&self) -> bool {
        self.per_item.is_empty()
    }

    /// Whether the adjustment carries `label`.
    pub fn has_label(&self, label: Label) -> bool {
        self.labels.contains(label)
    }

    /// Whether any amount in the adjustment is a percentage.
    pub fn is_percent(&self) -> bool {
        self.amount.is_some_and(|amount| amount.is_percent())
            || self.per_item.iter().any(|(_, amount)| amount.is_percent())
    }

    /// Realized flat total in minor units, if the adjustment carries a flat amount.
    pub fn realized_minor(&self) -> Option<i64> {
        self.amount
            .as_ref()
            .and_then(Amount::as_money)
            .map(Money::to_minor_units)
    }

    pub(crate) fn into_realized(self, total: Money<'a, Currency>, per_item: PerItem<'a>) -> Self {
        Self {
            amount: Some(Amount::Flat(total)),
            per_item,
            ..self
        }
    }
}
