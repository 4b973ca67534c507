//! Pricing Result

use std::{fmt::Write, io};

use rusty_money::{Money, iso::Currency};
use smallvec::SmallVec;
use tabled::{
    builder::Builder,
    settings::{
        Alignment, Color, Style, Theme,
        object::{Columns, Rows},
    },
};
use thiserror::Error;

use crate::{
    adjustments::{BucketKey, Label, PriceAdjustment},
    config::SalePriceReporting,
    ledger::Ledger,
};

/// Errors that can occur when rendering a pricing result.
#[derive(Debug, Error)]
pub enum ResultError {
    /// IO error
    #[error("IO error")]
    IO,
}

/// Outcome of one pricing pass.
#[derive(Debug, Clone, PartialEq)]
pub struct PricingResult<'a> {
    /// Running totals after every adjustment.
    ledger: Ledger,

    /// Applied adjustments with realized amounts, in application order.
    adjustments: Vec<PriceAdjustment<'a>>,

    /// Redeemed codes withdrawn during the pass.
    withdrawn: SmallVec<[String; 2]>,

    /// Where sale price reductions are reported.
    sale_price_reporting: SalePriceReporting,

    /// Cart currency.
    currency: &'static Currency,
}

impl<'a> PricingResult<'a> {
    /// Create a result from a finished pass.
    #[must_use]
    pub fn new(
        ledger: Ledger,
        adjustments: Vec<PriceAdjustment<'a>>,
        withdrawn: SmallVec<[String; 2]>,
        sale_price_reporting: SalePriceReporting,
        currency: &'static Currency,
    ) -> Self {
        Self {
            ledger,
            adjustments,
            withdrawn,
            sale_price_reporting,
            currency,
        }
    }

    /// Cart-level total for `label`.
    pub fn total_for(&self, label: Label) -> Money<'a, Currency> {
        self.money(self.ledger.get(BucketKey::Cart, label))
    }

    /// Total for `label` in one item bucket.
    pub fn item_total(&self, index: usize, label: Label) -> Money<'a, Currency> {
        self.money(self.ledger.get(BucketKey::from_index(index), label))
    }

    /// Subtotal. Includes sale price reductions unless they are reported as discount.
    pub fn subtotal(&self) -> Money<'a, Currency> {
        match self.sale_price_reporting {
            SalePriceReporting::Subtotal => {
                self.sum(&[Label::Subtotal, Label::SalePriceAdjustment])
            }
            SalePriceReporting::Discount => self.total_for(Label::Subtotal),
        }
    }

    /// Sale price reductions.
    pub fn sale_price_adjustment(&self) -> Money<'a, Currency> {
        self.total_for(Label::SalePriceAdjustment)
    }

    /// Shipping.
    pub fn shipping(&self) -> Money<'a, Currency> {
        self.total_for(Label::Shipping)
    }

    /// Discount, gift card redemptions included. Also includes sale price reductions when they
    /// are reported as discount.
    pub fn discount(&self) -> Money<'a, Currency> {
        match self.sale_price_reporting {
            SalePriceReporting::Subtotal => self.sum(&[Label::Discount, Label::GiftCard]),
            SalePriceReporting::Discount => self.sum(&[
                Label::Discount,
                Label::SalePriceAdjustment,
                Label::GiftCard,
            ]),
        }
    }

    /// Tax.
    pub fn tax(&self) -> Money<'a, Currency> {
        self.total_for(Label::Tax)
    }

    /// Gift card redemptions. Already part of [`PricingResult::discount`].
    pub fn gift_card(&self) -> Money<'a, Currency> {
        self.total_for(Label::GiftCard)
    }

    /// Grand total.
    pub fn grand_total(&self) -> Money<'a, Currency> {
        self.total_for(Label::GrandTotal)
    }

    /// Applied adjustments in application order.
    pub fn adjustments(&self) -> &[PriceAdjustment<'a>] {
        &self.adjustments
    }

    /// Applied adjustments carrying `label`.
    pub fn adjustments_with(&self, label: Label) -> impl Iterator<Item = &PriceAdjustment<'a>> {
        self.adjustments
            .iter()
            .filter(move |adjustment| adjustment.has_label(label))
    }

    /// Applied reductions: discounts, gift cards and sale prices.
    pub fn reductions(&self) -> impl Iterator<Item = &PriceAdjustment<'a>> {
        self.adjustments.iter().filter(|adjustment| {
            adjustment.has_label(Label::Discount)
                || adjustment.has_label(Label::GiftCard)
                || adjustment.has_label(Label::SalePriceAdjustment)
        })
    }

    /// Redeemed codes withdrawn during the pass.
    pub fn withdrawn_codes(&self) -> &[String] {
        &self.withdrawn
    }

    /// Final ledger.
    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    /// Cart currency.
    pub fn currency(&self) -> &'static Currency {
        self.currency
    }

    /// Renders the adjustments and totals as a table.
    ///
    /// # Errors
    ///
    /// Returns an error if the output cannot be written.
    pub fn write_to(&self, mut out: impl io::Write) -> Result<(), ResultError> {
        let mut builder = Builder::default();

        builder.push_record(["", "Code", "Name", "Label", "Priority", "Target", "Amount"]);

        for (row, adjustment) in self.adjustments.iter().enumerate() {
            let amount = adjustment
                .amount()
                .map_or_else(String::new, ToString::to_string);

            builder.push_record([
                format!("#{:<3}", row + 1),
                adjustment.code().to_string(),
                adjustment.name().to_string(),
                adjustment.labels().to_string(),
                format!("{:.6}", adjustment.priority()),
                target_display(adjustment),
                amount,
            ]);
        }

        let mut table = builder.build();
        let mut theme = Theme::from(Style::modern_rounded());

        theme.remove_horizontal_lines();

        table.with(theme);
        table.modify(Rows::first(), Color::BOLD);
        table.modify(Columns::new(4..5), Alignment::right());
        table.modify(Columns::new(6..7), Alignment::right());

        let table_str = colorize_borders(&table.to_string());

        writeln!(out, "\n{table_str}").map_err(|_err| ResultError::IO)?;

        self.write_summary(&mut out)
    }

    fn write_summary(&self, out: &mut impl io::Write) -> Result<(), ResultError> {
        let lines = [
            (" Subtotal:", self.subtotal()),
            (" Shipping:", self.shipping()),
            (" Discount:", self.discount()),
            (" Tax:", self.tax()),
        ];

        let total_label = " \x1b[1mTotal:\x1b[0m";
        let total_val = format!("{}  ", self.grand_total());

        let values: Vec<(&str, String)> = lines
            .into_iter()
            .map(|(label, money)| (label, format!("{money}  ")))
            .collect();

        let label_width = values
            .iter()
            .map(|(label, _)| visible_width(label))
            .fold(visible_width(total_label), usize::max);

        let value_width = values
            .iter()
            .map(|(_, value)| value.len())
            .fold(total_val.len(), usize::max);

        for (label, value) in &values {
            write_summary_line(out, label, value, label_width, value_width)?;
        }

        write_summary_line(
            out,
            total_label,
            &format!("\x1b[1m{total_val}\x1b[0m"),
            label_width,
            value_width,
        )?;

        writeln!(out).map_err(|_err| ResultError::IO)
    }

    fn money(&self, minor: i64) -> Money<'a, Currency> {
        Money::from_minor(minor, self.currency)
    }

    fn sum(&self, labels: &[Label]) -> Money<'a, Currency> {
        let minor = labels
            .iter()
            .map(|label| self.ledger.get(BucketKey::Cart, *label))
            .fold(0_i64, i64::saturating_add);

        self.money(minor)
    }
}

fn target_display(adjustment: &PriceAdjustment<'_>) -> String {
    if adjustment.is_whole_cart() {
        return "cart".to_string();
    }

    let mut target = String::from("items");

    for (position, bucket) in adjustment.per_item_amounts().keys().enumerate() {
        let separator = if position == 0 { " " } else { ", " };
        _ = write!(target, "{separator}{bucket}");
    }

    target
}

/// Wraps runs of UTF-8 box-drawing characters in ANSI dark-grey escape codes.
fn colorize_borders(table: &str) -> String {
    let mut out = String::with_capacity(table.len() + 256);
    let mut in_run = false;

    for ch in table.chars() {
        let box_char = ('\u{2500}'..='\u{257F}').contains(&ch);

        if box_char && !in_run {
            out.push_str("\x1b[90m");
            in_run = true;
        } else if !box_char && in_run {
            out.push_str("\x1b[0m");
            in_run = false;
        }

        out.push(ch);
    }

    if in_run {
        out.push_str("\x1b[0m");
    }

    out
}

/// Returns the visible (non-ANSI) width of a string.
fn visible_width(s: &str) -> usize {
    let mut width = 0usize;
    let mut in_escape = false;

    for ch in s.chars() {
        if in_escape {
            if ch.is_ascii_alphabetic() {
                in_escape = false;
            }
        } else if ch == '\x1b' {
            in_escape = true;
        } else {
            width += 1;
        }
    }

    width
}

fn write_summary_line(
    out: &mut impl io::Write,
    label: &str,
    value: &str,
    label_col_width: usize,
    value_col_width: usize,
) -> Result<(), ResultError> {
    let label_pad = label_col_width.saturating_sub(visible_width(label));
    let value_pad = value_col_width.saturating_sub(visible_width(value));

    writeln!(
        out,
        "{:>label_pad$}{label}  {value_pad}{value}",
        "",
        value_pad = " ".repeat(value_pad)
    )
    .map_err(|_err| ResultError::IO)
}

#[cfg(test)]
mod tests {
    use rusty_money::iso::USD;
    use testresult::TestResult;

    use crate::{
        adjustments::{Amount, LabelSet, priority},
        applier::Applier,
    };

    use super::*;

    fn result(reporting: SalePriceReporting) -> Result<PricingResult<'static>, crate::applier::ApplyError> {
        let mut applier = Applier::new(USD);

        applier.apply(PriceAdjustment::per_item(
            "subtotal",
            "Subtotal",
            priority::SUBTOTAL,
            LabelSet::single(Label::Subtotal),
            [(BucketKey::Item(1), Amount::flat_minor(1_000, USD))]
                .into_iter()
                .collect(),
        ))?;
        applier.apply(PriceAdjustment::per_item(
            "sale-price",
            "Sale price",
            priority::SALE_PRICE,
            LabelSet::single(Label::SalePriceAdjustment),
            [(BucketKey::Item(1), Amount::flat_minor(-100, USD))]
                .into_iter()
                .collect(),
        ))?;
        applier.apply(PriceAdjustment::new(
            "ground",
            "Ground",
            priority::SHIPPING,
            Amount::flat_minor(500, USD),
            LabelSet::single(Label::Shipping),
        ))?;
        applier.apply(PriceAdjustment::new(
            "SAVE2",
            "Save 2",
            priority::DISCOUNT,
            Amount::flat_minor(-200, USD),
            LabelSet::single(Label::Discount),
        ))?;

        let (ledger, adjustments) = applier.finish();

        Ok(PricingResult::new(ledger, adjustments, SmallVec::new(), reporting, USD))
    }

    #[test]
    fn subtotal_reporting_rolls_sale_price_into_subtotal() -> TestResult {
        let result = result(SalePriceReporting::Subtotal)?;

        assert_eq!(result.subtotal(), Money::from_minor(900, USD));
        assert_eq!(result.discount(), Money::from_minor(-200, USD));
        assert_eq!(result.grand_total(), Money::from_minor(1_200, USD));

        Ok(())
    }

    #[test]
    fn discount_reporting_rolls_sale_price_into_discount() -> TestResult {
        let result = result(SalePriceReporting::Discount)?;

        assert_eq!(result.subtotal(), Money::from_minor(1_000, USD));
        assert_eq!(result.discount(), Money::from_minor(-300, USD));
        assert_eq!(result.sale_price_adjustment(), Money::from_minor(-100, USD));
        assert_eq!(result.grand_total(), Money::from_minor(1_200, USD));

        Ok(())
    }

    #[test]
    fn reductions_cover_discounts_and_sale_prices() -> TestResult {
        let result = result(SalePriceReporting::Subtotal)?;

        let codes: Vec<&str> = result.reductions().map(PriceAdjustment::code).collect();

        assert_eq!(codes, vec!["sale-price", "SAVE2"]);
        assert_eq!(result.adjustments_with(Label::Shipping).count(), 1);
        assert_eq!(result.item_total(1, Label::GrandTotal), Money::from_minor(900, USD));

        Ok(())
    }

    #[test]
    fn write_to_renders_adjustments_and_summary() -> TestResult {
        let result = result(SalePriceReporting::Subtotal)?;

        let mut out = Vec::new();
        result.write_to(&mut out)?;

        let output = String::from_utf8(out)?;

        assert!(output.contains("Ground"));
        assert!(output.contains("SAVE2"));
        assert!(output.contains("items 1"));
        assert!(output.contains("Subtotal:"));
        assert!(output.contains("Total:"));

        Ok(())
    }

    #[test]
    fn visible_width_ignores_escape_codes() {
        assert_eq!(visible_width("\x1b[1mTotal:\x1b[0m"), 6);
    }
}
