//! Adjustment Labels

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use thiserror::Error;

/// Semantic tag deciding which aggregate an applied amount rolls into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Label {
    /// Item subtotal.
    #[serde(rename = "ST")]
    Subtotal,

    /// Sale price adjustment.
    #[serde(rename = "SPA")]
    SalePriceAdjustment,

    /// Shipping.
    #[serde(rename = "SP")]
    Shipping,

    /// Discount.
    #[serde(rename = "D")]
    Discount,

    /// Tax.
    #[serde(rename = "T")]
    Tax,

    /// Gift card.
    #[serde(rename = "GC")]
    GiftCard,

    /// Grand total. Maintained by the ledger, never carried by an adjustment.
    #[serde(rename = "GT")]
    GrandTotal,
}

impl Label {
    /// Every label, in ledger display order.
    pub const ALL: [Label; 7] = [
        Label::Subtotal,
        Label::SalePriceAdjustment,
        Label::Shipping,
        Label::Discount,
        Label::Tax,
        Label::GiftCard,
        Label::GrandTotal,
    ];

    /// Short code used in fixtures and receipts.
    pub const fn code(self) -> &'static str {
        match self {
            Label::Subtotal => "ST",
            Label::SalePriceAdjustment => "SPA",
            Label::Shipping => "SP",
            Label::Discount => "D",
            Label::Tax => "T",
            Label::GiftCard => "GC",
            Label::GrandTotal => "GT",
        }
    }

    /// Whether an applied amount carrying this label is posted under it.
    pub const fn is_aggregating(self) -> bool {
        !matches!(self, Label::GrandTotal)
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Errors that can occur when parsing a [`Label`].
#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown adjustment label: {0}")]
pub struct LabelParseError(pub String);

impl FromStr for Label {
    type Err = LabelParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Label::ALL
            .into_iter()
            .find(|label| label.code().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| LabelParseError(s.to_string()))
    }
}

/// Sorted, de-duplicated set of labels carried by an adjustment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct LabelSet {
    labels: SmallVec<[Label; 2]>,
}

impl LabelSet {
    /// Create an empty label set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a label set holding a single label.
    pub fn single(label: Label) -> Self {
        let mut labels = SmallVec::new();
        labels.push(label);

        Self { labels }
    }

    /// Create a label set from a slice of labels.
    pub fn from_labels(labels: &[Label]) -> Self {
        labels.iter().copied().collect()
    }

    /// Add a label, keeping the set sorted.
    pub fn add(&mut self, label: Label) {
        if let Err(position) = self.labels.binary_search(&label) {
            self.labels.insert(position, label);
        }
    }

    /// Remove a label if present.
    pub fn remove(&mut self, label: Label) {
        if let Ok(position) = self.labels.binary_search(&label) {
            self.labels.remove(position);
        }
    }

    /// Whether the set contains `label`.
    pub fn contains(&self, label: Label) -> bool {
        self.labels.binary_search(&label).is_ok()
    }

    /// Iterate over the labels in order.
    pub fn iter(&self) -> impl Iterator<Item = Label> + '_ {
        self.labels.iter().copied()
    }

    /// Labels whose amounts are posted by the ledger.
    pub fn aggregating(&self) -> impl Iterator<Item = Label> + '_ {
        self.iter().filter(|label| label.is_aggregating())
    }

    /// Number of labels in the set.
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    /// Whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

impl FromIterator<Label> for LabelSet {
    fn from_iter<I: IntoIterator<Item = Label>>(iter: I) -> Self {
        let mut labels: SmallVec<[Label; 2]> = iter.into_iter().collect();

        labels.sort_unstable();
        labels.dedup();

        Self { labels }
    }
}

impl fmt::Display for LabelSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;

        for label in self.iter() {
            if !first {
                f.write_str(",")?;
            }

            f.write_str(label.code())?;
            first = false;
        }

        Ok(())
    }
}
