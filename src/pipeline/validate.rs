//! Reconciliation: cross-check computed sums against the claimed total.
//!
//! `validate` is a pure, total function from an [`ExtractionResult`] to a
//! [`ValidationReport`] — no I/O, no mutation, no panics on degenerate
//! input. Running it twice on the same result yields identical reports,
//! which is what lets the orchestrator treat reconciliation as the one
//! stage that cannot fail.
//!
//! Monetary values are rounded to 2 decimal places at the report boundary.
//! The tolerance is an absolute margin in the bill's currency unit and the
//! boundary is inclusive: a discrepancy of exactly the tolerance passes.

use crate::pipeline::duplicates::find_duplicates;
use crate::schema::{ExtractionResult, ValidationReport};

/// Default reconciliation tolerance: one unit of the bill's currency.
pub const DEFAULT_TOLERANCE: f64 = 1.0;

/// Round to 2 decimal places (monetary precision).
pub fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

/// Derive a [`ValidationReport`] with the default tolerance.
pub fn validate(result: &ExtractionResult) -> ValidationReport {
    validate_with(result, DEFAULT_TOLERANCE)
}

/// Derive a [`ValidationReport`] with an explicit tolerance.
///
/// Missing amounts are excluded from the computed sum (they contribute
/// nothing; they are not treated as zero-priced items that might mask a
/// mismatch). Detected duplicates are counted but NOT excluded from the
/// sum — see DESIGN.md.
pub fn validate_with(result: &ExtractionResult, tolerance: f64) -> ValidationReport {
    let mut report = ValidationReport::default();

    let mut computed_total = 0.0;
    for item in result.items() {
        if let Some(amount) = item.amount {
            computed_total += amount;
        }
        if item.rate.is_none() {
            report.missing_rate_count += 1;
        }
        if item.quantity.is_none() {
            report.missing_quantity_count += 1;
        }
    }
    report.computed_total = round2(computed_total);

    report.duplicate_count = find_duplicates(&result.pages).len();

    if let Some(claimed) = result.claimed_total {
        report.has_claimed_total = true;
        report.claimed_total = claimed;
        report.discrepancy = round2((computed_total - claimed).abs());
        // The percentage comparison is only meaningful against a positive
        // claimed total; otherwise the comparison is skipped and the report
        // keeps its "unverified" defaults.
        if claimed > 0.0 {
            report.match_percentage = round2((1.0 - report.discrepancy / claimed) * 100.0);
            report.exceeds_tolerance = report.discrepancy > tolerance;
        }
    }

    report
}
