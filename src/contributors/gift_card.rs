//! Gift cards
//!
//! Applied cards are redeemed against the grand total. Lines that sell a gift card are zeroed
//! right after item subtotals, so nothing taxes or discounts them, and restored at the grand
//! total phase by exactly the amount zeroed.

use rust_decimal::Decimal;
use rusty_money::{Money, iso::Currency};
use smallvec::{SmallVec, smallvec};
use tracing::warn;

use crate::{
    adjustments::{Amount, Label, LabelSet, PerItem, PriceAdjustment, priority},
    contributors::{CalculationContext, Contribution, Contributor},
    pricing::negate,
};

/// Code of the adjustments that zero and restore gift card lines.
pub const GIFT_CARD_LINES_CODE: &str = "gift-card-lines";

const CARD_OFFSET: f64 = 0.0001;

/// Gift card applied to the checkout.
#[derive(Debug, Clone, PartialEq)]
pub struct GiftCard<'a> {
    /// Card code.
    pub code: String,

    /// Display name.
    pub name: String,

    /// Remaining balance.
    pub balance: Money<'a, Currency>,
}

impl<'a> GiftCard<'a> {
    /// Create a gift card.
    pub fn new(code: impl Into<String>, name: impl Into<String>, balance: Money<'a, Currency>) -> Self {
        Self {
            code: code.into(),
            name: name.into(),
            balance,
        }
    }
}

/// Redeems gift card balances against the grand total. The applier clamps each redemption
/// to what is left of the total.
#[derive(Debug, Clone, Copy)]
pub struct GiftCardContributor {
    priority: f64,
    zero_priority: f64,
    restore_priority: f64,
}

impl Default for GiftCardContributor {
    fn default() -> Self {
        Self::new(priority::GIFT_CARD)
    }
}

impl GiftCardContributor {
    /// Create a gift card contributor redeeming cards at `priority`.
    pub fn new(priority: f64) -> Self {
        Self {
            priority,
            zero_priority: priority::SUBTOTAL,
            restore_priority: priority::GRAND_TOTAL,
        }
    }

    fn zero_lines<'a>(ctx: &CalculationContext<'_, 'a>, priority: f64) -> Contribution<'a> {
        let per_item: PerItem<'a> = ctx
            .cart()
            .iter()
            .filter(|item| item.is_gift_card())
            .map(|item| (item.bucket(), Amount::percent_points(Decimal::from(-100))))
            .collect();

        if per_item.is_empty() {
            return Contribution::empty();
        }

        vec![PriceAdjustment::per_item(
            GIFT_CARD_LINES_CODE,
            "Gift card lines",
            priority,
            LabelSet::single(Label::GiftCard),
            per_item,
        )]
        .into()
    }

    fn restore_lines<'a>(ctx: &CalculationContext<'_, 'a>, priority: f64) -> Contribution<'a> {
        let per_item: PerItem<'a> = ctx
            .cart()
            .iter()
            .filter(|item| item.is_gift_card())
            .filter_map(|item| {
                let zeroed = ctx.total(item.bucket(), Label::GiftCard);

                (zeroed < 0).then(|| (item.bucket(), Amount::flat_minor(-zeroed, ctx.currency())))
            })
            .collect();

        if per_item.is_empty() {
            return Contribution::empty();
        }

        vec![PriceAdjustment::per_item(
            GIFT_CARD_LINES_CODE,
            "Gift card lines",
            priority,
            LabelSet::single(Label::GiftCard),
            per_item,
        )]
        .into()
    }

    fn redeem_cards<'a>(ctx: &CalculationContext<'_, 'a>, priority: f64) -> Contribution<'a> {
        let mut current = priority;
        let mut adjustments = Vec::new();

        for card in ctx.gift_cards() {
            if card.balance.to_minor_units() <= 0 {
                continue;
            }

            if card.balance.currency() != ctx.currency() {
                warn!(code = %card.code, "skipping gift card in a foreign currency");
                continue;
            }

            current += CARD_OFFSET;

            adjustments.push(PriceAdjustment::new(
                card.code.clone(),
                card.name.clone(),
                current,
                Amount::Flat(negate(&card.balance)),
                LabelSet::single(Label::GiftCard),
            ));
        }

        adjustments.into()
    }
}

impl Contributor for GiftCardContributor {
    fn code(&self) -> &str {
        "gift-cards"
    }

    fn priorities(&self) -> SmallVec<[f64; 3]> {
        smallvec![self.zero_priority, self.restore_priority, self.priority]
    }

    fn calculate<'a>(&self, ctx: &CalculationContext<'_, 'a>, priority: f64) -> Contribution<'a> {
        if priority::same(priority, self.priority) {
            Self::redeem_cards(ctx, priority)
        } else if priority::same(priority, self.zero_priority) {
            Self::zero_lines(ctx, priority)
        } else if priority::same(priority, self.restore_priority) {
            Self::restore_lines(ctx, priority)
        } else {
            Contribution::empty()
        }
    }
}
