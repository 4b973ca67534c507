//! Sequencer
//!
//! Runs a pricing pass in priority order. Contributors are invoked when the pass reaches each
//! priority they declared, so every phase sees the totals of the phases before it. Emitted
//! adjustments are applied in `(priority, registration order, emission order)` order.

use std::{
    cmp::{Ordering, Reverse},
    collections::BinaryHeap,
};

use smallvec::SmallVec;
use tracing::{debug, warn};

use crate::{
    adjustments::{Amount, Label, LabelSet, PerItem, PriceAdjustment, priority},
    applier::Applier,
    cart::Cart,
    checkout::CheckoutSnapshot,
    contributors::{CalculationContext, Contributor, ContributorRegistry},
    pricing::PricingError,
};

/// Code of the item subtotal adjustment that opens every pass.
pub const SUBTOTAL_CODE: &str = "subtotal";

/// Stable sort by ascending priority. Equal priorities keep their input order.
pub fn order(adjustments: &mut [PriceAdjustment<'_>]) {
    adjustments.sort_by(|left, right| priority::compare(left.priority(), right.priority()));
}

/// Build the per-item subtotal adjustment for a cart.
///
/// # Errors
///
/// Returns a [`PricingError`] if a line total overflows.
pub fn subtotal_adjustment<'a>(cart: &Cart<'a>) -> Result<PriceAdjustment<'a>, PricingError> {
    let per_item = cart
        .iter()
        .map(|item| Ok((item.bucket(), Amount::Flat(item.line_total()?))))
        .collect::<Result<PerItem<'a>, PricingError>>()?;

    Ok(PriceAdjustment::per_item(
        SUBTOTAL_CODE,
        "Subtotal",
        priority::SUBTOTAL,
        LabelSet::single(Label::Subtotal),
        per_item,
    ))
}

/// Runs contributors and applies their adjustments in priority order.
#[derive(Debug, Clone, Copy)]
pub struct Sequencer<'r> {
    registry: &'r ContributorRegistry,
}

struct Phase<'r> {
    priority: f64,
    contributor: &'r dyn Contributor,
}

struct Pending<'a> {
    sequence: usize,
    adjustment: PriceAdjustment<'a>,
}

impl Pending<'_> {
    fn key(&self) -> (f64, usize) {
        (self.adjustment.priority(), self.sequence)
    }
}

impl PartialEq for Pending<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other).is_eq()
    }
}

impl Eq for Pending<'_> {}

impl PartialOrd for Pending<'_> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Pending<'_> {
    fn cmp(&self, other: &Self) -> Ordering {
        let (left_priority, left_sequence) = self.key();
        let (right_priority, right_sequence) = other.key();

        priority::compare(left_priority, right_priority).then(left_sequence.cmp(&right_sequence))
    }
}

impl<'r> Sequencer<'r> {
    /// Create a sequencer over a registry.
    pub fn new(registry: &'r ContributorRegistry) -> Self {
        Self { registry }
    }

    /// Run one pricing pass into `applier`, returning the redeemed codes withdrawn during it.
    ///
    /// A failing adjustment is logged and skipped; the pass carries on with the rest.
    pub fn run<'a>(&self, snapshot: &CheckoutSnapshot<'a>, applier: &mut Applier<'a>) -> SmallVec<[String; 2]> {
        let mut phases: Vec<Phase<'r>> = self
            .registry
            .iter()
            .flat_map(|(_, contributor)| {
                contributor
                    .priorities()
                    .into_iter()
                    .map(move |priority| Phase { priority, contributor })
            })
            .collect();

        phases.sort_by(|left, right| priority::compare(left.priority, right.priority));

        let mut phases = phases.into_iter().peekable();
        let mut pending: BinaryHeap<Reverse<Pending<'a>>> = BinaryHeap::new();
        let mut sequence = 0_usize;
        let mut withdrawn: SmallVec<[String; 2]> = SmallVec::new();

        match subtotal_adjustment(&snapshot.cart) {
            Ok(subtotal) => {
                pending.push(Reverse(Pending {
                    sequence,
                    adjustment: subtotal,
                }));
                sequence += 1;
            }
            Err(error) => warn!(%error, "skipping item subtotals"),
        }

        loop {
            let next_phase = phases.peek().map(|phase| phase.priority);
            let next_pending = pending.peek().map(|Reverse(entry)| entry.adjustment.priority());

            let run_phase = match (next_phase, next_pending) {
                (None, None) => break,
                (Some(_), None) => true,
                (None, Some(_)) => false,
                (Some(phase), Some(adjustment)) => priority::compare(phase, adjustment).is_le(),
            };

            if run_phase {
                let Some(phase) = phases.next() else {
                    break;
                };

                let ctx = CalculationContext::new(snapshot, applier.ledger());
                let contribution = phase.contributor.calculate(&ctx, phase.priority);

                debug!(
                    contributor = phase.contributor.code(),
                    priority = phase.priority,
                    adjustments = contribution.adjustments.len(),
                    "ran contributor phase"
                );

                for code in contribution.withdrawn {
                    if !withdrawn.contains(&code) {
                        withdrawn.push(code);
                    }
                }

                for adjustment in contribution.adjustments {
                    if priority::compare(adjustment.priority(), phase.priority).is_lt() {
                        warn!(
                            code = adjustment.code(),
                            priority = adjustment.priority(),
                            phase = phase.priority,
                            "adjustment emitted below its phase priority, applying next"
                        );
                    }

                    pending.push(Reverse(Pending { sequence, adjustment }));
                    sequence += 1;
                }
            } else if let Some(Reverse(entry)) = pending.pop() {
                let code = entry.adjustment.code().to_string();

                if let Err(error) = applier.apply(entry.adjustment) {
                    warn!(%error, code = %code, "skipping price adjustment");
                }
            }
        }

        withdrawn
    }
}
