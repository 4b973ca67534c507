//! Pricing
//!
//! Minor-unit arithmetic shared by the applier, the coupon allocator and the contributors.
//! Every amount that reaches the ledger passes through here, so every value is rounded to the
//! currency's minor unit at the step that produced it.

use decimal_percentage::Percentage;
use rust_decimal::{
    Decimal, RoundingStrategy,
    prelude::{FromPrimitive, ToPrimitive},
};
use rusty_money::{Money, MoneyError, iso::Currency};
use thiserror::Error;

/// Errors that can occur during minor-unit price arithmetic.
#[derive(Debug, Error, PartialEq)]
pub enum PricingError {
    /// Percentage calculation could not be safely converted.
    #[error("percentage conversion overflowed or was not finite")]
    PercentConversion,

    /// Minor unit arithmetic overflowed.
    #[error("minor unit arithmetic overflowed")]
    Overflow,

    /// Wrapped money arithmetic or currency mismatch error.
    #[error(transparent)]
    Money(#[from] MoneyError),
}

/// Calculate a percentage of a minor unit amount, rounded half away from zero.
///
/// # Errors
///
/// Returns [`PricingError::PercentConversion`] if the multiplication overflows or the result
/// does not fit in an `i64`.
pub fn percent_of_minor(percent: &Percentage, minor: i64) -> Result<i64, PricingError> {
    let minor = Decimal::from_i64(minor).ok_or(PricingError::PercentConversion)?;

    ((*percent) * Decimal::ONE) // decimal_percentage doesn't expose the underlying Decimal
        .checked_mul(minor)
        .ok_or(PricingError::PercentConversion)?
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_i64()
        .ok_or(PricingError::PercentConversion)
}

/// Convert percentage points (`6` for 6%) into a fractional [`Percentage`].
pub fn percentage_from_points(points: Decimal) -> Percentage {
    Percentage::from(points / Decimal::ONE_HUNDRED)
}

/// Convert a fractional [`Percentage`] back into percentage points for display.
pub fn percentage_points(percent: &Percentage) -> Decimal {
    ((*percent) * Decimal::ONE * Decimal::ONE_HUNDRED).normalize()
}

/// Calculate `unit price × quantity` in minor units.
///
/// # Errors
///
/// Returns [`PricingError::Overflow`] if the line total does not fit in an `i64`.
pub fn line_total_minor(unit_price: &Money<'_, Currency>, qty: u32) -> Result<i64, PricingError> {
    unit_price
        .to_minor_units()
        .checked_mul(i64::from(qty))
        .ok_or(PricingError::Overflow)
}

/// Add two minor unit amounts.
///
/// # Errors
///
/// Returns [`PricingError::Overflow`] if the sum does not fit in an `i64`.
pub fn add_minor(left: i64, right: i64) -> Result<i64, PricingError> {
    left.checked_add(right).ok_or(PricingError::Overflow)
}

/// Negate a money amount, keeping its currency.
pub fn negate<'a>(money: &Money<'a, Currency>) -> Money<'a, Currency> {
    Money::from_minor(money.to_minor_units().saturating_neg(), money.currency())
}
