//! Tax
//!
//! Rates are matched in three tiers, broadest first: every address (`*`/`*`), the shipping
//! state (`state`/`*`), then the exact state and zip. Every matching rate is charged as a
//! percentage of each item's running total, so shipping is never taxed.

use rust_decimal::Decimal;
use smallvec::{SmallVec, smallvec};

use crate::{
    adjustments::{Amount, Label, LabelSet, PerItem, PriceAdjustment, priority},
    contributors::{CalculationContext, Contribution, Contributor},
};

const WILDCARD: &str = "*";
const RULE_OFFSET: f64 = 0.00001;

/// Shipping destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Address {
    /// State or region code.
    pub state: String,

    /// Postal code.
    pub zip: String,
}

impl Address {
    /// Create an address.
    pub fn new(state: impl Into<String>, zip: impl Into<String>) -> Self {
        Self {
            state: state.into(),
            zip: zip.into(),
        }
    }
}

/// Tax rate for a state and zip, either of which may be `*`.
#[derive(Debug, Clone, PartialEq)]
pub struct TaxRule {
    /// Rule code, used as the adjustment code.
    pub code: String,

    /// Display name.
    pub name: String,

    /// State, or `*`.
    pub state: String,

    /// Zip, or `*`.
    pub zip: String,

    /// Rate in percentage points.
    pub rate: Decimal,
}

impl TaxRule {
    /// Create a tax rule.
    pub fn new(
        code: impl Into<String>,
        name: impl Into<String>,
        state: impl Into<String>,
        zip: impl Into<String>,
        rate: Decimal,
    ) -> Self {
        Self {
            code: code.into(),
            name: name.into(),
            state: state.into(),
            zip: zip.into(),
            rate,
        }
    }

    fn matches(&self, state: &str, zip: &str) -> bool {
        self.state.eq_ignore_ascii_case(state) && self.zip == zip
    }
}

/// Emits matching tax rates as per-item percentages.
#[derive(Debug, Clone)]
pub struct TaxContributor {
    rules: Vec<TaxRule>,
    priority: f64,
}

impl TaxContributor {
    /// Create a tax contributor over `rules`, running at `priority`.
    pub fn new(rules: Vec<TaxRule>, priority: f64) -> Self {
        Self { rules, priority }
    }

    /// Tax contributor at the standard priority.
    pub fn with_rules(rules: Vec<TaxRule>) -> Self {
        Self::new(rules, priority::TAX)
    }
}

impl Contributor for TaxContributor {
    fn code(&self) -> &str {
        "tax"
    }

    fn priorities(&self) -> SmallVec<[f64; 3]> {
        smallvec![self.priority]
    }

    fn calculate<'a>(&self, ctx: &CalculationContext<'_, 'a>, priority: f64) -> Contribution<'a> {
        let Some(address) = ctx.shipping_address() else {
            return Contribution::empty();
        };

        if ctx.cart().is_empty() {
            return Contribution::empty();
        }

        let tiers = [
            (WILDCARD, WILDCARD),
            (address.state.as_str(), WILDCARD),
            (address.state.as_str(), address.zip.as_str()),
        ];

        let mut current = priority;
        let mut adjustments = Vec::new();

        for (state, zip) in tiers {
            for rule in self.rules.iter().filter(|rule| rule.matches(state, zip)) {
                current += RULE_OFFSET;

                let per_item: PerItem<'a> = ctx
                    .cart()
                    .iter()
                    .map(|item| (item.bucket(), Amount::percent_points(rule.rate)))
                    .collect();

                adjustments.push(PriceAdjustment::per_item(
                    rule.code.clone(),
                    rule.name.clone(),
                    current,
                    LabelSet::single(Label::Tax),
                    per_item,
                ));
            }
        }

        adjustments.into()
    }
}

#[cfg(test)]
mod tests {
    use jiff::Timestamp;
    use rusty_money::{Money, iso::USD};
    use testresult::TestResult;

    use crate::{
        cart::{Cart, CartItem},
        checkout::CheckoutSnapshot,
        ledger::Ledger,
    };

    use super::*;

    fn rules() -> Vec<TaxRule> {
        vec![
            TaxRule::new("ny-city", "NYC tax", "NY", "10001", Decimal::new(45, 1)),
            TaxRule::new("federal", "Federal tax", "*", "*", Decimal::from(1)),
            TaxRule::new("ny", "NY state tax", "NY", "*", Decimal::from(4)),
            TaxRule::new("ca", "CA state tax", "CA", "*", Decimal::new(725, 2)),
        ]
    }

    fn snapshot<'a>(address: Option<Address>) -> Result<CheckoutSnapshot<'a>, crate::cart::CartError> {
        let cart = Cart::with_items(
            [
                CartItem::new(1, "tee", 1, Money::from_minor(1_000, USD)),
                CartItem::new(2, "mug", 1, Money::from_minor(2_000, USD)),
            ],
            USD,
        )?;

        let mut snapshot = CheckoutSnapshot::new(cart, Timestamp::UNIX_EPOCH);
        snapshot.shipping_address = address;

        Ok(snapshot)
    }

    #[test]
    fn matches_rules_broadest_tier_first() -> TestResult {
        let snapshot = snapshot(Some(Address::new("NY", "10001")))?;
        let ledger = Ledger::new();
        let ctx = CalculationContext::new(&snapshot, &ledger);

        let contribution = TaxContributor::with_rules(rules()).calculate(&ctx, priority::TAX);

        let codes: Vec<&str> = contribution.adjustments.iter().map(PriceAdjustment::code).collect();

        assert_eq!(codes, vec!["federal", "ny", "ny-city"]);

        let first = contribution.adjustments.first().ok_or("Expected tax adjustment")?;

        assert_eq!(first.per_item_amounts().len(), 2);
        assert!(first.is_percent());

        Ok(())
    }

    #[test]
    fn other_state_only_gets_wildcard_rule() -> TestResult {
        let snapshot = snapshot(Some(Address::new("TX", "73301")))?;
        let ledger = Ledger::new();
        let ctx = CalculationContext::new(&snapshot, &ledger);

        let contribution = TaxContributor::with_rules(rules()).calculate(&ctx, priority::TAX);

        assert_eq!(contribution.adjustments.len(), 1);

        Ok(())
    }

    #[test]
    fn no_address_emits_nothing() -> TestResult {
        let snapshot = snapshot(None)?;
        let ledger = Ledger::new();
        let ctx = CalculationContext::new(&snapshot, &ledger);

        assert!(TaxContributor::with_rules(rules()).calculate(&ctx, priority::TAX).is_empty());

        Ok(())
    }
}
