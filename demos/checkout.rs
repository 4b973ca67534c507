//! Checkout Pricing Example
//!
//! Prices a checkout fixture with the built-in contributors and prints the breakdown.
//!
//! Use `-f` to load a fixture set by name
//! Use `-c` to load a pricing configuration file
//! Use `--sale-price-reporting subtotal` to report sale prices inside the subtotal

use std::{
    io::{self, Write},
    time::Instant,
};

use anyhow::Result;
use clap::Parser;
use humanize_duration::{Truncate, prelude::DurationExt};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use tally::{
    config::PricingConfig,
    fixtures::Fixture,
    utils::{ExampleCheckoutArgs, LogFormat},
};

/// Checkout Pricing Example
#[expect(clippy::print_stdout, reason = "Example program output to user")]
pub fn main() -> Result<()> {
    let args = ExampleCheckoutArgs::parse();

    init_logging(&args)?;

    let mut config = match &args.config {
        Some(path) => PricingConfig::from_path(path)?,
        None => PricingConfig::default(),
    };

    if let Some(reporting) = args.sale_price_reporting {
        config.sale_price_reporting = reporting;
    }

    let fixture = Fixture::from_set(&args.fixture)?;
    let engine = fixture.engine(config);
    let store = fixture.coupon_store();
    let mut checkout = fixture.checkout();

    let start = Instant::now();

    let result = checkout.pricing(&engine, &store, fixture.now());

    let elapsed = start.elapsed();

    let stdout = io::stdout();
    let mut handle = stdout.lock();

    result.write_to(&mut handle)?;

    writeln!(
        handle,
        " {} ({}s)",
        elapsed.human(Truncate::Nano),
        elapsed.as_secs_f32()
    )?;

    if !result.withdrawn_codes().is_empty() {
        println!("\n Withdrawn: {}", result.withdrawn_codes().join(", "));
    }

    Ok(())
}

fn init_logging(args: &ExampleCheckoutArgs) -> Result<()> {
    let filter = EnvFilter::try_new(&args.log_level)?;
    let registry = tracing_subscriber::registry().with(filter);

    match args.log_format {
        LogFormat::Compact => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .compact()
                    .with_target(true)
                    .with_writer(io::stderr),
            )
            .try_init()?,
        LogFormat::Json => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_span_list(true)
                    .with_writer(io::stderr),
            )
            .try_init()?,
    }

    Ok(())
}
