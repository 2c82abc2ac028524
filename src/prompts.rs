//! Extraction prompts sent alongside the bill document.
//!
//! Centralising every prompt here serves two purposes:
//!
//! 1. **Single source of truth** — tightening an extraction rule or the
//!    output schema requires editing exactly one place.
//!
//! 2. **Testability** — unit tests can assert schema field names appear in
//!    the prompt without calling a real model.
//!
//! Callers can override the default via
//! [`crate::config::ExtractionConfig::prompt`]; the constant here is used
//! only when no override is provided.

/// Default extraction prompt.
///
/// The output schema embedded here mirrors [`crate::schema`] exactly: the
/// parser feeds the model's JSON straight into [`crate::schema::ExtractionResult`],
/// so any field renamed here must be renamed there too.
pub const DEFAULT_EXTRACTION_PROMPT: &str = r#"You are an expert medical bill extraction system. Extract ALL line items with PERFECT accuracy.

CRITICAL REQUIREMENTS:
1. Extract EVERY single line item - missing items = FAILURE
2. DO NOT double-count items (check if an item appears on both detail and summary pages)
3. Extract sub-totals per section (Pharmacy, Diagnostics, Room charges, etc.)
4. Extract the FINAL TOTAL from the bill
5. Ensure the calculated total matches the extracted total

OUTPUT SCHEMA (JSON ONLY, NO MARKDOWN):
{
  "success": boolean,
  "pages": [
    {
      "page_no": "string",
      "page_type": "BillDetail | FinalBill | Pharmacy",
      "items": [
        {
          "name": "string",
          "amount": float,
          "rate": float,
          "quantity": float
        }
      ]
    }
  ],
  "subtotals": [
    {
      "section_name": "string",
      "subtotal": float,
      "item_count": integer
    }
  ],
  "claimed_total": float,
  "claimed_item_count": integer
}

EXTRACTION RULES:
1. Line items: extract ONLY actual billable items, NOT sub-totals or grand totals
2. Name: copy EXACTLY as printed (join multi-line names with a single space)
3. Amount: net amount after discounts (use -1 if missing)
4. Rate: unit price (use -1 if not shown)
5. Quantity: quantity (use -1 if not shown)
6. Page type:
   - "Pharmacy" = medicine/drug items
   - "BillDetail" = detailed breakdown with line items
   - "FinalBill" = summary page with totals
7. Section sub-totals: Pharmacy, Diagnostics, Radiology, Pathology, Room Charges, Consultation, etc.
8. claimed_total: the GRAND TOTAL printed on the bill (use -1 if not shown)
9. If the same item appears on multiple pages, count it ONLY ONCE (prefer the detail page)

EDGE CASES:
- Discount items: include as negative amounts
- Tax items: include as separate line items
- Missing rate/quantity: set to -1
- Items without an amount: set amount to -1

IMPORTANT:
- Return ONLY valid JSON (no markdown, no code blocks, no explanations)
- All numbers must be numeric types (not strings)
- Set success=true ONLY if extraction is complete and accurate
- List detail pages BEFORE summary pages"#;

/// Build the full prompt for one request, prefixing the detected file kind
/// so the model knows what rendering to expect.
pub fn extraction_prompt(kind: &str, mime_type: &str, override_prompt: Option<&str>) -> String {
    let body = override_prompt.unwrap_or(DEFAULT_EXTRACTION_PROMPT);
    format!("File type: {kind} (mime: {mime_type})\n\n{body}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_names_every_schema_field() {
        for field in [
            "page_no",
            "page_type",
            "name",
            "amount",
            "rate",
            "quantity",
            "section_name",
            "subtotal",
            "item_count",
            "claimed_total",
            "claimed_item_count",
        ] {
            assert!(
                DEFAULT_EXTRACTION_PROMPT.contains(field),
                "prompt is missing schema field {field:?}"
            );
        }
    }

    #[test]
    fn request_prompt_carries_file_kind_prefix() {
        let p = extraction_prompt("pdf", "application/pdf", None);
        assert!(p.starts_with("File type: pdf (mime: application/pdf)"));
        assert!(p.contains("OUTPUT SCHEMA"));
    }

    #[test]
    fn override_replaces_default_body() {
        let p = extraction_prompt("image", "image/png", Some("Just the totals."));
        assert!(p.ends_with("Just the totals."));
        assert!(!p.contains("OUTPUT SCHEMA"));
    }
}
