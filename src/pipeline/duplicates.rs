//! Cross-page duplicate detection.
//!
//! Hospital bills repeat line items: a "Final Bill" summary page often
//! re-lists items already present on detail pages, and a model that reads
//! both pages reports the item twice. This stage finds those recurrences so
//! the validator can count them; it does not remove anything — duplicates
//! are flagged, never dropped (see DESIGN.md for the policy decision).
//!
//! Identity is a normalized fingerprint of name + exact amount. Both must
//! match: "Paracetamol" at 50.00 and "Paracetamol" at 50.01 are different
//! charges, and two distinct items that happen to cost the same are not
//! duplicates either. An absent amount participates as-is, so two items
//! sharing a name and both missing an amount do collide.

use crate::schema::{LineItem, Page};
use std::collections::HashMap;

/// One detected recurrence: `item` on `page_no` repeats an identical item
/// first seen on `original_page_no`.
#[derive(Debug, Clone, PartialEq)]
pub struct DuplicateRecord {
    pub item: LineItem,
    pub page_no: String,
    pub original_page_no: String,
}

/// Find line items that recur across pages.
///
/// Single linear pass over pages in their given order — callers supply
/// detail pages before summary pages, so the first occurrence (the one the
/// record attributes as `original_page_no`) is the detail-page entry.
/// Deterministic for a given input order; the page list is not mutated.
pub fn find_duplicates(pages: &[Page]) -> Vec<DuplicateRecord> {
    let mut seen: HashMap<String, &str> = HashMap::new();
    let mut duplicates = Vec::new();

    for page in pages {
        for item in &page.items {
            let fp = fingerprint(item);
            match seen.get(fp.as_str()) {
                Some(original_page_no) => duplicates.push(DuplicateRecord {
                    item: item.clone(),
                    page_no: page.page_no.clone(),
                    original_page_no: (*original_page_no).to_string(),
                }),
                None => {
                    seen.insert(fp, page.page_no.as_str());
                }
            }
        }
    }

    duplicates
}

/// Normalized identity key: trimmed lowercased name + exact amount.
///
/// The amount is formatted from its full float value, not rounded — a
/// one-paisa difference is a different fingerprint.
fn fingerprint(item: &LineItem) -> String {
    let name = item.name.trim().to_lowercase();
    match item.amount {
        Some(amount) => format!("{name}_{amount}"),
        None => format!("{name}_missing"),
    }
}
