//! Price Fixtures

use rust_decimal::{Decimal, RoundingStrategy, prelude::ToPrimitive};
use rusty_money::{
    Money,
    iso::{self, Currency},
};

use crate::{adjustments::Amount, fixtures::FixtureError};

/// Look up an ISO currency code.
///
/// # Errors
///
/// Returns [`FixtureError::UnknownCurrency`] if the code is not an ISO 4217 currency.
pub fn parse_currency(code: &str) -> Result<&'static Currency, FixtureError> {
    iso::find(code.trim()).ok_or_else(|| FixtureError::UnknownCurrency(code.to_string()))
}

/// Parse price string (e.g., "2.99 USD") into minor units and currency
///
/// # Errors
///
/// Returns an error if the string is not in the format "AMOUNT CURRENCY", if the amount is not
/// a decimal number, or if the currency code is not recognized.
pub fn parse_price(s: &str) -> Result<(i64, &'static Currency), FixtureError> {
    let mut parts = s.split_whitespace();

    let (Some(amount), Some(code), None) = (parts.next(), parts.next(), parts.next()) else {
        return Err(FixtureError::InvalidPrice(format!(
            "Expected format 'AMOUNT CURRENCY', got: {s}"
        )));
    };

    let amount = amount
        .parse::<Decimal>()
        .map_err(|_err| FixtureError::InvalidPrice(s.to_string()))?;

    let currency = parse_currency(code)?;

    let minor_units = 10_i64
        .checked_pow(currency.exponent)
        .and_then(|scale| amount.checked_mul(Decimal::from(scale)))
        .and_then(|value| {
            value
                .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
                .to_i64()
        })
        .ok_or_else(|| FixtureError::InvalidPrice(s.to_string()))?;

    Ok((minor_units, currency))
}

/// Parse a price and check it is in `expected`.
///
/// # Errors
///
/// Returns an error if the price is malformed or in another currency.
pub fn parse_money(s: &str, expected: &'static Currency) -> Result<Money<'static, Currency>, FixtureError> {
    let (minor_units, currency) = parse_price(s)?;

    if currency != expected {
        return Err(FixtureError::CurrencyMismatch(
            expected.iso_alpha_code.to_string(),
            currency.iso_alpha_code.to_string(),
        ));
    }

    Ok(Money::from_minor(minor_units, currency))
}

/// Parse percentage points (e.g., "6%" or "-10%").
///
/// # Errors
///
/// Returns [`FixtureError::InvalidPercentage`] if the string has no `%` suffix or is not a
/// decimal number.
pub fn parse_points(s: &str) -> Result<Decimal, FixtureError> {
    s.trim()
        .strip_suffix('%')
        .and_then(|points| points.trim().parse::<Decimal>().ok())
        .ok_or_else(|| FixtureError::InvalidPercentage(s.to_string()))
}

/// Parse an adjustment amount: a percentage when it ends in `%`, otherwise a price.
///
/// # Errors
///
/// Returns an error if the amount is malformed or priced in another currency.
pub fn parse_amount(s: &str, expected: &'static Currency) -> Result<Amount<'static>, FixtureError> {
    if s.trim().ends_with('%') {
        Ok(Amount::percent_points(parse_points(s)?))
    } else {
        Ok(Amount::Flat(parse_money(s, expected)?))
    }
}
