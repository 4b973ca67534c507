//! Pricing configuration
//!
//! Phase priorities and reporting switches, loaded from YAML. Every field has a default, so an
//! empty document yields [`PricingConfig::default`].

use std::{fs, io, path::Path};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::adjustments::priority;

/// Errors that can occur while loading a [`PricingConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error(transparent)]
    Io(#[from] io::Error),

    /// The configuration document is malformed.
    #[error(transparent)]
    Yaml(#[from] serde_norway::Error),

    /// A priority is not a positive, finite number.
    #[error("{field} must be a positive, finite priority, got {value}")]
    InvalidPriority {
        /// Name of the offending field.
        field: &'static str,

        /// Rejected value.
        value: f64,
    },
}

/// Where sale price reductions are reported.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum SalePriceReporting {
    /// Subtotal is the sum of item subtotals and sale price reductions.
    Subtotal,

    /// Subtotal is the undiscounted item total; sale price reductions count as discount.
    #[default]
    Discount,
}

/// Engine configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PricingConfig {
    /// Phase of cart-level coupons. The product-level phase follows at a fixed offset.
    pub discount_priority: f64,

    /// Phase of sale price reductions.
    pub sale_price_priority: f64,

    /// Phase of shipping charges.
    pub shipping_priority: f64,

    /// Phase of tax.
    pub tax_priority: f64,

    /// Phase of gift card redemptions.
    pub gift_card_priority: f64,

    /// Where sale price reductions are reported.
    pub sale_price_reporting: SalePriceReporting,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            discount_priority: priority::DISCOUNT,
            sale_price_priority: priority::SALE_PRICE,
            shipping_priority: priority::SHIPPING,
            tax_priority: priority::TAX,
            gift_card_priority: priority::GIFT_CARD,
            sale_price_reporting: SalePriceReporting::default(),
        }
    }
}

impl PricingConfig {
    /// Parse and validate a YAML document.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the document is malformed or a priority is invalid.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }

        let config: PricingConfig = serde_norway::from_str(yaml)?;

        config.validate()?;

        Ok(config)
    }

    /// Read, parse and validate a YAML file.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the file cannot be read, is malformed, or a priority is
    /// invalid.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;

        Self::from_yaml_str(&contents)
    }

    /// Priority of the product-level coupon phase.
    pub fn product_discount_priority(&self) -> f64 {
        self.discount_priority + priority::PRODUCT_DISCOUNT_OFFSET
    }

    fn validate(&self) -> Result<(), ConfigError> {
        [
            ("discount_priority", self.discount_priority),
            ("sale_price_priority", self.sale_price_priority),
            ("shipping_priority", self.shipping_priority),
            ("tax_priority", self.tax_priority),
            ("gift_card_priority", self.gift_card_priority),
        ]
        .into_iter()
        .try_for_each(|(field, value)| {
            if value.is_finite() && value > 0.0 {
                Ok(())
            } else {
                Err(ConfigError::InvalidPriority { field, value })
            }
        })
    }
}
