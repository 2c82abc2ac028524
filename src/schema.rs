//! The external JSON contract and the sentinel boundary.
//!
//! The vision model's output schema (and therefore our response schema) uses
//! a reserved sentinel of `-1` for "field not present" instead of `null`.
//! Letting that sentinel leak into arithmetic is how `-1` rupees end up
//! subtracted from a computed total, so the rule here is strict:
//!
//! * **Internally** absent numbers are `Option<f64>` / `Option<i64>`.
//! * **At the JSON boundary** the serde helpers in [`sentinel`] translate
//!   `None ⇄ -1` in both directions. Nothing outside this module ever
//!   compares a value against `-1`.
//!
//! Model output is untrusted input: every field has a defensive default, a
//! numeric field tolerates number-as-string, and an unknown `page_type`
//! label coerces to [`PageType::BillDetail`] rather than voiding the whole
//! extraction. Field names below are a compatibility contract with clients
//! and must not be renamed.

use serde::{Deserialize, Serialize};

/// Wire-level sentinel standing in for "field not present".
pub const MISSING_SENTINEL: f64 = -1.0;

// ── Line items and pages ─────────────────────────────────────────────────

/// A single billable entry extracted from a document page.
///
/// `amount` may be negative: discounts are represented as negative line
/// items, not as a separate field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    #[serde(default)]
    pub name: String,
    /// Net amount after discounts. `None` when the bill does not show one.
    #[serde(default, with = "sentinel")]
    pub amount: Option<f64>,
    /// Unit price, when printed.
    #[serde(default, with = "sentinel")]
    pub rate: Option<f64>,
    /// Quantity, when printed.
    #[serde(default, with = "sentinel")]
    pub quantity: Option<f64>,
}

/// Classification of a bill page, as labelled by the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum PageType {
    /// Detailed breakdown page with individual line items.
    #[default]
    BillDetail,
    /// Summary page carrying the grand total.
    FinalBill,
    /// Medicine/drug items page.
    Pharmacy,
}

impl PageType {
    /// Canonical wire label.
    pub fn as_str(&self) -> &'static str {
        match self {
            PageType::BillDetail => "BillDetail",
            PageType::FinalBill => "FinalBill",
            PageType::Pharmacy => "Pharmacy",
        }
    }
}

impl From<String> for PageType {
    /// Lenient mapping: models emit variations like "Final Bill" or
    /// "pharmacy". Anything unrecognised coerces to `BillDetail`.
    fn from(s: String) -> Self {
        let normalized: String = s
            .chars()
            .filter(|c| !c.is_whitespace())
            .flat_map(char::to_lowercase)
            .collect();
        match normalized.as_str() {
            "finalbill" => PageType::FinalBill,
            "pharmacy" => PageType::Pharmacy,
            _ => PageType::BillDetail,
        }
    }
}

impl From<PageType> for String {
    fn from(t: PageType) -> Self {
        t.as_str().to_string()
    }
}

/// One page of the bill with its ordered line items.
///
/// Page order is significant: callers supply detail pages before summary
/// pages so duplicate attribution prefers the detail page as the original.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Page {
    #[serde(default)]
    pub page_no: String,
    #[serde(default)]
    pub page_type: PageType,
    #[serde(default)]
    pub items: Vec<LineItem>,
}

/// A claimed per-section aggregate, independent of the line-item sums.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectionSubtotal {
    #[serde(default)]
    pub section_name: String,
    #[serde(default, deserialize_with = "lenient::number")]
    pub subtotal: f64,
    #[serde(default, deserialize_with = "lenient::integer")]
    pub item_count: i64,
}

// ── Extraction result and derived report ─────────────────────────────────

/// The parsed model output, pre-validation.
///
/// Created once per request from the model's JSON, immediately validated,
/// then discarded — nothing is persisted across requests.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ExtractionResult {
    /// The model's own claim that extraction was complete and accurate.
    /// The outcome policy may still downgrade this.
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub pages: Vec<Page>,
    #[serde(default)]
    pub subtotals: Vec<SectionSubtotal>,
    /// Grand total as stated on the bill, if the model found one.
    #[serde(default, with = "sentinel")]
    pub claimed_total: Option<f64>,
    /// Item count as stated by the model.
    #[serde(default, deserialize_with = "lenient::integer")]
    pub claimed_item_count: i64,
}

impl ExtractionResult {
    /// Iterate every line item across all pages, in page order.
    pub fn items(&self) -> impl Iterator<Item = &LineItem> {
        self.pages.iter().flat_map(|p| p.items.iter())
    }
}

/// Token accounting from the model transport, when the provider reports it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TokenUsage {
    #[serde(default, with = "sentinel_tokens")]
    pub total: Option<i64>,
    #[serde(default, with = "sentinel_tokens")]
    pub input: Option<i64>,
    #[serde(default, with = "sentinel_tokens")]
    pub output: Option<i64>,
}

/// Read-only reconciliation summary derived from an [`ExtractionResult`].
///
/// Always produced by a pure function over the extraction result; see
/// [`crate::pipeline::validate`]. Defaults are the "nothing verified yet"
/// state: in particular `exceeds_tolerance` starts `true`, so an absent
/// claimed total reads as "unverified", never as "matched".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub has_claimed_total: bool,
    pub computed_total: f64,
    pub claimed_total: f64,
    pub discrepancy: f64,
    /// Defined only when the claimed total is positive; otherwise stays 0.
    pub match_percentage: f64,
    pub exceeds_tolerance: bool,
    pub duplicate_count: usize,
    pub missing_rate_count: usize,
    pub missing_quantity_count: usize,
}

impl Default for ValidationReport {
    fn default() -> Self {
        Self {
            has_claimed_total: false,
            computed_total: 0.0,
            claimed_total: 0.0,
            discrepancy: 0.0,
            match_percentage: 0.0,
            exceeds_tolerance: true,
            duplicate_count: 0,
            missing_rate_count: 0,
            missing_quantity_count: 0,
        }
    }
}

// ── Response envelope ────────────────────────────────────────────────────

/// The full response body returned by the service and the CLI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BillResponse {
    pub is_success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_usage: Option<TokenUsage>,
    pub data: ExtractionResult,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation: Option<ValidationReport>,
    /// Human-readable explanation when the outcome policy downgraded
    /// `is_success` (names both totals).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
    /// First 500 characters of the raw model text. Present only in the
    /// canned failure payload, for diagnostics.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_raw_output: Option<String>,
}

impl BillResponse {
    /// The canned zeroed payload returned when the model's output contained
    /// no parsable JSON.
    pub fn unparsable(raw_prefix: impl Into<String>) -> Self {
        Self {
            is_success: false,
            token_usage: Some(TokenUsage::default()),
            data: ExtractionResult::default(),
            validation: None,
            warning: None,
            model_raw_output: Some(raw_prefix.into()),
        }
    }
}

// ── Sentinel boundary helpers ────────────────────────────────────────────

/// `Option<f64> ⇄ -1` translation, tolerant of the model's sloppiness.
///
/// Accepts a JSON number, a numeric string, or `null`; anything else (and
/// the sentinel itself) deserializes to `None`. Serialization always emits
/// a number, substituting the sentinel for `None`, so the wire schema never
/// contains `null`.
mod sentinel {
    use super::MISSING_SENTINEL;
    use serde::{Deserialize, Deserializer, Serializer};
    use serde_json::Value;

    pub fn serialize<S: Serializer>(v: &Option<f64>, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_f64(v.unwrap_or(MISSING_SENTINEL))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<f64>, D::Error> {
        let raw = Value::deserialize(d)?;
        Ok(coerce_f64(&raw))
    }

    pub(super) fn coerce_f64(v: &Value) -> Option<f64> {
        super::lenient::coerce(v).filter(|x| *x != MISSING_SENTINEL)
    }
}

/// Lenient deserializers for plain (non-sentinel) numeric fields: accept a
/// number or a numeric string, fall back to zero otherwise. A model that
/// emits `"claimed_item_count": 2.0` must not void the whole extraction.
mod lenient {
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    pub(super) fn coerce(v: &Value) -> Option<f64> {
        match v {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        }
    }

    pub fn number<'de, D: Deserializer<'de>>(d: D) -> Result<f64, D::Error> {
        let raw = Value::deserialize(d)?;
        Ok(coerce(&raw).unwrap_or(0.0))
    }

    pub fn integer<'de, D: Deserializer<'de>>(d: D) -> Result<i64, D::Error> {
        let raw = Value::deserialize(d)?;
        Ok(coerce(&raw).map(|f| f as i64).unwrap_or(0))
    }
}

/// `Option<i64> ⇄ -1` for token counts.
mod sentinel_tokens {
    use serde::{Deserialize, Deserializer, Serializer};
    use serde_json::Value;

    pub fn serialize<S: Serializer>(v: &Option<i64>, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_i64(v.unwrap_or(-1))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<i64>, D::Error> {
        let raw = Value::deserialize(d)?;
        Ok(super::sentinel::coerce_f64(&raw).map(|f| f as i64))
    }
}
