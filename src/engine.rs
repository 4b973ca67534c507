//! Pricing Engine
//!
//! Computes a [`PricingResult`] from a [`CheckoutSnapshot`]. Computation is pure: the same
//! snapshot and contributors always produce the same ledger and adjustments.

use tracing::info;

use crate::{
    applier::Applier,
    checkout::CheckoutSnapshot,
    config::PricingConfig,
    contributors::{ContributorRegistry, SalePrice, TaxRule},
    result::PricingResult,
    sequencer::Sequencer,
};

/// Contributors plus configuration.
#[derive(Debug)]
pub struct PricingEngine {
    registry: ContributorRegistry,
    config: PricingConfig,
}

impl PricingEngine {
    /// Create an engine over a custom registry.
    pub fn new(registry: ContributorRegistry, config: PricingConfig) -> Self {
        Self { registry, config }
    }

    /// Create an engine with the built-in contributors.
    pub fn standard(config: PricingConfig, tax_rules: Vec<TaxRule>, sale_prices: Vec<SalePrice<'static>>) -> Self {
        let registry = ContributorRegistry::standard(&config, tax_rules, sale_prices);

        Self::new(registry, config)
    }

    /// Registered contributors.
    pub fn registry(&self) -> &ContributorRegistry {
        &self.registry
    }

    /// Registered contributors, mutably.
    pub fn registry_mut(&mut self) -> &mut ContributorRegistry {
        &mut self.registry
    }

    /// Engine configuration.
    pub fn config(&self) -> &PricingConfig {
        &self.config
    }

    /// Run one pricing pass.
    #[tracing::instrument(
        name = "pricing.engine.compute",
        skip(self, snapshot),
        fields(
            items = snapshot.cart.len(),
            redeemed = snapshot.redeemed_codes.len(),
            contributors = self.registry.len()
        )
    )]
    pub fn compute<'a>(&self, snapshot: &CheckoutSnapshot<'a>) -> PricingResult<'a> {
        let mut applier = Applier::new(snapshot.cart.currency());

        let withdrawn = Sequencer::new(&self.registry).run(snapshot, &mut applier);

        let (ledger, adjustments) = applier.finish();

        info!(
            adjustments = adjustments.len(),
            grand_total = ledger.grand_total(),
            withdrawn = withdrawn.len(),
            "computed checkout totals"
        );

        PricingResult::new(
            ledger,
            adjustments,
            withdrawn,
            self.config.sale_price_reporting,
            snapshot.cart.currency(),
        )
    }
}
