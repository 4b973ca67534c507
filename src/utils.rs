//! Utils

use std::path::PathBuf;

use clap::Parser;

use crate::config::SalePriceReporting;

/// Log output format.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum LogFormat {
    /// Compact, human-readable logs.
    #[default]
    Compact,

    /// Structured JSON logs.
    Json,
}

/// Arguments for the checkout demo
#[derive(Debug, Parser)]
pub struct ExampleCheckoutArgs {
    /// Fixture set to price, from `fixtures/checkouts`
    #[clap(short, long, default_value = "storefront")]
    pub fixture: String,

    /// Pricing configuration file (YAML)
    #[clap(short, long)]
    pub config: Option<PathBuf>,

    /// Override where sale price reductions are reported
    #[clap(long, value_enum)]
    pub sale_price_reporting: Option<SalePriceReporting>,

    /// Log level (trace, debug, info, warn, error)
    #[clap(short, long, env = "RUST_LOG", default_value = "warn")]
    pub log_level: String,

    /// Log format (compact, json)
    #[clap(long, env = "LOG_FORMAT", value_enum, default_value_t = LogFormat::Compact)]
    pub log_format: LogFormat,
}
