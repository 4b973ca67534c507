//! Coupon allocation
//!
//! Turns redeemed codes into discount adjustments. In the cart phase the single most valuable
//! cart-level coupon is emitted. In the product phase every discountable unit takes the most
//! valuable product-level coupon that still has quota, so a coupon's usable quantity is shared
//! across every line it targets.

use jiff::Timestamp;
use rust_decimal::Decimal;
use rusty_money::Money;
use smallvec::SmallVec;
use tracing::{debug, warn};

use crate::{
    adjustments::{Amount, Label, LabelSet, PerItem, PriceAdjustment},
    cart::Cart,
    coupons::{CouponRecord, evaluate_limits},
    pricing::{PricingError, add_minor, percent_of_minor, percentage_from_points},
};

const CART_PERCENT_OFFSET: f64 = 0.00001;
const CART_FLAT_OFFSET: f64 = 0.0001;
const PRODUCT_CODE_OFFSET: f64 = 0.000_001;

/// Which allocation phase is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllocationPhase {
    /// Cart-level coupons, against the running cart grand total.
    Cart {
        /// Cart grand total when the phase started.
        cart_total: i64,
    },

    /// Product-level coupons, against unit prices.
    Product,
}

/// Inputs to one allocation phase.
#[derive(Debug, Clone, Copy)]
pub struct AllocationRequest<'r, 'a> {
    /// Redeemed codes, in redemption order.
    pub redeemed_codes: &'r [String],

    /// Cart contents.
    pub cart: &'r Cart<'a>,

    /// Preloaded coupon records.
    pub coupons: &'r [CouponRecord<'a>],

    /// Instant used for validity windows.
    pub now: Timestamp,

    /// Phase being allocated.
    pub phase: AllocationPhase,

    /// Priority of the phase.
    pub priority: f64,
}

/// Output of one allocation phase.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Allocation<'a> {
    /// Discount adjustments.
    pub adjustments: Vec<PriceAdjustment<'a>>,

    /// Redeemed codes outside their validity window.
    pub withdrawn: SmallVec<[String; 2]>,
}

/// An eligible coupon with its remaining usable quantity.
#[derive(Debug, Clone, PartialEq)]
pub struct Discount {
    /// Coupon code.
    pub code: String,

    /// Display name.
    pub name: String,

    /// Flat reduction in minor units.
    pub amount: i64,

    /// Percentage reduction in points.
    pub percent: Decimal,

    /// Remaining usable quantity.
    pub qty: u32,
}

impl Discount {
    /// Reduction this discount gives against `total`.
    ///
    /// # Errors
    ///
    /// Returns a [`PricingError`] if the arithmetic overflows.
    pub fn value_against(&self, total: i64) -> Result<i64, PricingError> {
        add_minor(
            self.amount,
            percent_of_minor(&percentage_from_points(self.percent), total)?,
        )
    }
}

/// Pick the most valuable discount against `total`, skipping exhausted ones.
///
/// A discount worth more than `total` is taken at once, valued at `total`. Otherwise the
/// strictly largest positive value wins and the first candidate wins ties. Returns the
/// candidate's position and its value.
///
/// # Errors
///
/// Returns a [`PricingError`] if a value cannot be computed.
pub fn find_biggest_discount<'d, I>(candidates: I, total: i64) -> Result<Option<(usize, i64)>, PricingError>
where
    I: IntoIterator<Item = (usize, &'d Discount)>,
{
    let mut biggest: Option<(usize, i64)> = None;

    for (position, discount) in candidates {
        if discount.qty == 0 {
            continue;
        }

        let value = discount.value_against(total)?;

        if value > total {
            return Ok(Some((position, total)));
        }

        if biggest.map_or(0, |(_, best)| best) < value {
            biggest = Some((position, value));
        }
    }

    Ok(biggest)
}

/// Allocate redeemed coupons for one phase.
///
/// # Errors
///
/// Returns a [`PricingError`] if discount arithmetic overflows.
#[tracing::instrument(
    name = "coupons.allocate",
    skip(request),
    fields(codes = request.redeemed_codes.len(), phase = ?request.phase),
    err
)]
pub fn allocate_coupon_discounts<'a>(request: &AllocationRequest<'_, 'a>) -> Result<Allocation<'a>, PricingError> {
    let (eligible, withdrawn) = eligible_discounts(request);

    let adjustments = match request.phase {
        AllocationPhase::Cart { cart_total } => allocate_cart(request, &eligible, cart_total)?,
        AllocationPhase::Product => allocate_products(request, eligible)?,
    };

    debug!(adjustments = adjustments.len(), withdrawn = withdrawn.len(), "allocated coupons");

    Ok(Allocation {
        adjustments,
        withdrawn,
    })
}

struct Eligible<'r, 'a> {
    record: &'r CouponRecord<'a>,
    discount: Discount,
}

fn eligible_discounts<'r, 'a>(request: &AllocationRequest<'r, 'a>) -> (Vec<Eligible<'r, 'a>>, SmallVec<[String; 2]>) {
    let quantities = request.cart.quantities();
    let currency = request.cart.currency();

    let mut eligible: Vec<Eligible<'r, 'a>> = Vec::new();
    let mut withdrawn: SmallVec<[String; 2]> = SmallVec::new();

    for code in request.redeemed_codes {
        if eligible.iter().any(|entry| entry.record.code == *code) || withdrawn.contains(code) {
            continue;
        }

        let Some(record) = request.coupons.iter().find(|record| record.code == *code) else {
            continue;
        };

        let qty = evaluate_limits(&record.limits, &quantities);

        if qty == 0 {
            continue;
        }

        if !record.is_valid_at(request.now) {
            warn!(code = %record.code, "withdrawing coupon outside its validity window");
            withdrawn.push(record.code.clone());
            continue;
        }

        if record.amount.currency() != currency {
            warn!(code = %record.code, "skipping coupon in a foreign currency");
            continue;
        }

        eligible.push(Eligible {
            record,
            discount: Discount {
                code: record.code.clone(),
                name: record.name.clone(),
                amount: record.amount.to_minor_units(),
                percent: record.percent,
                qty,
            },
        });
    }

    (eligible, withdrawn)
}

fn allocate_cart<'a>(
    request: &AllocationRequest<'_, 'a>,
    eligible: &[Eligible<'_, 'a>],
    cart_total: i64,
) -> Result<Vec<PriceAdjustment<'a>>, PricingError> {
    if cart_total <= 0 {
        return Ok(Vec::new());
    }

    let discounts: Vec<&Discount> = eligible
        .iter()
        .filter(|entry| entry.record.target.is_cart())
        .map(|entry| &entry.discount)
        .collect();

    let Some((position, _)) = find_biggest_discount(discounts.iter().copied().enumerate(), cart_total)? else {
        return Ok(Vec::new());
    };

    let Some(discount) = discounts.get(position) else {
        return Ok(Vec::new());
    };

    let currency = request.cart.currency();
    let mut adjustments = Vec::new();

    if discount.percent > Decimal::ZERO {
        adjustments.push(PriceAdjustment::new(
            discount.code.clone(),
            discount.name.clone(),
            request.priority + CART_PERCENT_OFFSET,
            Amount::percent_points(-discount.percent),
            LabelSet::single(Label::Discount),
        ));
    }

    if discount.amount > 0 {
        adjustments.push(PriceAdjustment::new(
            discount.code.clone(),
            discount.name.clone(),
            request.priority + CART_FLAT_OFFSET,
            Amount::flat_minor(-discount.amount, currency),
            LabelSet::single(Label::Discount),
        ));
    }

    Ok(adjustments)
}

struct ProductAdjustment<'a> {
    code: String,
    name: String,
    priority: f64,
    per_item: PerItem<'a>,
}

fn allocate_products<'a>(
    request: &AllocationRequest<'_, 'a>,
    eligible: Vec<Eligible<'_, 'a>>,
) -> Result<Vec<PriceAdjustment<'a>>, PricingError> {
    let currency = request.cart.currency();

    let (targets, mut discounts): (Vec<_>, Vec<_>) = eligible
        .into_iter()
        .filter(|entry| !entry.record.target.is_cart())
        .map(|entry| (entry.record.target.products(), entry.discount))
        .unzip();

    if discounts.is_empty() {
        return Ok(Vec::new());
    }

    let mut current = request.priority;
    let mut emitted: Vec<ProductAdjustment<'a>> = Vec::new();

    for item in request.cart.discountable_items() {
        let unit_price = item.unit_price().to_minor_units();

        if unit_price <= 0 {
            continue;
        }

        let candidates: SmallVec<[usize; 4]> = targets
            .iter()
            .enumerate()
            .filter(|(_, products)| products.iter().any(|product| product == item.product_id()))
            .map(|(position, _)| position)
            .collect();

        let mut remaining = item.qty();

        while remaining > 0 {
            let available = candidates
                .iter()
                .filter_map(|position| discounts.get(*position).map(|discount| (*position, discount)));

            let Some((position, value)) = find_biggest_discount(available, unit_price)? else {
                break;
            };

            let Some(discount) = discounts.get_mut(position) else {
                break;
            };

            let used = discount.qty.min(remaining);

            discount.qty -= used;
            remaining -= used;

            let reduction = value
                .checked_mul(i64::from(used))
                .ok_or(PricingError::Overflow)?;

            let money = Money::from_minor(-reduction, currency);

            match emitted.iter_mut().find(|adjustment| adjustment.code == discount.code) {
                Some(adjustment) => adjustment.per_item.accumulate(item.bucket(), money)?,
                None => {
                    current += PRODUCT_CODE_OFFSET;

                    let mut per_item = PerItem::new();
                    per_item.accumulate(item.bucket(), money)?;

                    emitted.push(ProductAdjustment {
                        code: discount.code.clone(),
                        name: discount.name.clone(),
                        priority: current,
                        per_item,
                    });
                }
            }
        }
    }

    Ok(emitted
        .into_iter()
        .map(|adjustment| {
            PriceAdjustment::per_item(
                adjustment.code,
                adjustment.name,
                adjustment.priority,
                LabelSet::single(Label::Discount),
                adjustment.per_item,
            )
        })
        .collect())
}
