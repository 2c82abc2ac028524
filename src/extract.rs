//! The extraction orchestrator: one URL in, one [`BillResponse`] out.
//!
//! Failure policy: stages that cannot produce a bill at all return an
//! [`ExtractError`] (the HTTP layer maps those to status codes). A
//! reconciliation mismatch is different — extraction worked, the numbers
//! just disagree — so it stays inside a successful return as
//! `is_success = false` plus a warning naming both totals.

use crate::config::ExtractionConfig;
use crate::error::ExtractError;
use crate::pipeline::detect::{self, FileKind};
use crate::pipeline::fetch::DocumentFetcher;
use crate::pipeline::{parse, validate};
use crate::prompts;
use crate::provider::VisionModel;
use crate::schema::{BillResponse, ExtractionResult};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

/// Maximum characters of raw model text attached to failure payloads.
const RAW_OUTPUT_PREFIX_CHARS: usize = 500;

/// Runs the full pipeline for one document URL.
///
/// Holds shared handles only; cloning is cheap and every request is
/// independent — nothing persists between calls.
#[derive(Clone)]
pub struct BillExtractor {
    fetcher: Arc<dyn DocumentFetcher>,
    model: Arc<dyn VisionModel>,
    config: ExtractionConfig,
}

impl BillExtractor {
    pub fn new(
        fetcher: Arc<dyn DocumentFetcher>,
        model: Arc<dyn VisionModel>,
        config: ExtractionConfig,
    ) -> Self {
        Self {
            fetcher,
            model,
            config,
        }
    }

    pub fn config(&self) -> &ExtractionConfig {
        &self.config
    }

    pub fn model(&self) -> &dyn VisionModel {
        self.model.as_ref()
    }

    /// Extract structured bill data from the document at `url`.
    pub async fn extract(&self, url: &str) -> Result<BillResponse, ExtractError> {
        let started = Instant::now();

        // ── Step 1: fetch ────────────────────────────────────────────────
        let (content, content_type) = self.fetcher.fetch(url).await?;

        // ── Step 2: classify ─────────────────────────────────────────────
        let (mime_type, kind) = detect::detect(url, &content, content_type.as_deref());
        if kind == FileKind::Unknown {
            return Err(ExtractError::UnknownDocumentType {
                url: url.to_string(),
            });
        }
        info!(url, mime_type, kind = kind.as_str(), bytes = content.len(), "document classified");

        // ── Step 3: invoke the vision model ──────────────────────────────
        let prompt =
            prompts::extraction_prompt(kind.as_str(), &mime_type, self.config.prompt.as_deref());
        let reply = self.model.extract(&prompt, &mime_type, &content).await?;

        // ── Step 4: parse the model's text into an ExtractionResult ──────
        let json = parse::extract_json(&reply.text).ok_or_else(|| {
            ExtractError::UnparsableModelOutput {
                raw_prefix: parse::truncate_chars(&reply.text, RAW_OUTPUT_PREFIX_CHARS).to_string(),
            }
        })?;
        let data: ExtractionResult =
            serde_json::from_value(json).map_err(|_| ExtractError::UnparsableModelOutput {
                raw_prefix: parse::truncate_chars(&reply.text, RAW_OUTPUT_PREFIX_CHARS).to_string(),
            })?;

        // ── Step 5: reconcile totals ─────────────────────────────────────
        let report = validate::validate_with(&data, self.config.tolerance);

        // ── Step 6: outcome policy ───────────────────────────────────────
        // A mismatch past the tolerance with a match percentage below the
        // floor downgrades the outcome; a near-miss above the floor keeps
        // is_success but still ships the full report. An absent claimed
        // total leaves the report in its unverified defaults and is
        // downgraded the same way: unverified is not matched.
        let mut is_success = data.success;
        let mut warning = None;
        if report.exceeds_tolerance && report.match_percentage < self.config.match_floor {
            is_success = false;
            warning = Some(format!(
                "Total mismatch: Calculated={:.2}, Extracted={:.2}",
                report.computed_total, report.claimed_total
            ));
            warn!(
                url,
                computed = report.computed_total,
                claimed = report.claimed_total,
                match_percentage = report.match_percentage,
                "total reconciliation failed"
            );
        }

        info!(
            url,
            elapsed_ms = started.elapsed().as_millis() as u64,
            items = data.items().count(),
            is_success,
            "extraction complete"
        );

        Ok(BillResponse {
            is_success,
            token_usage: Some(reply.usage),
            data,
            validation: Some(report),
            warning,
            model_raw_output: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::ModelReply;
    use crate::schema::TokenUsage;
    use async_trait::async_trait;

    /// Serves fixed bytes for any URL.
    struct StubFetcher {
        content: Vec<u8>,
        content_type: Option<String>,
    }

    #[async_trait]
    impl DocumentFetcher for StubFetcher {
        async fn fetch(&self, _url: &str) -> Result<(Vec<u8>, Option<String>), ExtractError> {
            Ok((self.content.clone(), self.content_type.clone()))
        }
    }

    /// Replies with fixed text for any document.
    struct StubModel {
        reply: String,
    }

    #[async_trait]
    impl VisionModel for StubModel {
        fn name(&self) -> &str {
            "stub"
        }

        fn model_id(&self) -> &str {
            "stub-1"
        }

        async fn extract(
            &self,
            _prompt: &str,
            _mime_type: &str,
            _content: &[u8],
        ) -> Result<ModelReply, ExtractError> {
            Ok(ModelReply {
                text: self.reply.clone(),
                usage: TokenUsage {
                    total: Some(100),
                    input: Some(80),
                    output: Some(20),
                },
            })
        }
    }

    fn extractor(reply: &str) -> BillExtractor {
        BillExtractor::new(
            Arc::new(StubFetcher {
                content: b"%PDF-1.7".to_vec(),
                content_type: Some("application/pdf".into()),
            }),
            Arc::new(StubModel {
                reply: reply.to_string(),
            }),
            ExtractionConfig::default(),
        )
    }

    const MATCHED_BILL: &str = r#"{
        "success": true,
        "pages": [
            { "page_no": "1", "page_type": "BillDetail", "items": [
                { "name": "CBC", "amount": 400.0, "rate": 400.0, "quantity": 1 },
                { "name": "Paracetamol", "amount": 50.0, "rate": 5.0, "quantity": 10 }
            ] }
        ],
        "subtotals": [],
        "claimed_total": 450.0,
        "claimed_item_count": 2
    }"#;

    #[tokio::test]
    async fn matched_totals_keep_is_success() {
        let resp = extractor(MATCHED_BILL)
            .extract("https://e.com/bill.pdf")
            .await
            .unwrap();
        assert!(resp.is_success);
        assert!(resp.warning.is_none());
        let report = resp.validation.unwrap();
        assert_eq!(report.match_percentage, 100.0);
        assert_eq!(resp.token_usage.unwrap().total, Some(100));
    }

    #[tokio::test]
    async fn mismatch_downgrades_with_a_warning() {
        let reply = r#"{
            "success": true,
            "pages": [ { "page_no": "1", "items": [ { "name": "CBC", "amount": 400.0 } ] } ],
            "claimed_total": 900.0
        }"#;
        let resp = extractor(reply)
            .extract("https://e.com/bill.pdf")
            .await
            .unwrap();
        assert!(!resp.is_success);
        let warning = resp.warning.unwrap();
        assert!(warning.contains("400.00"), "warning was {warning:?}");
        assert!(warning.contains("900.00"));
    }

    #[tokio::test]
    async fn near_miss_above_the_floor_is_not_downgraded() {
        // Discrepancy 5 on 450 exceeds the tolerance but matches 98.89%.
        let reply = r#"{
            "success": true,
            "pages": [ { "page_no": "1", "items": [ { "name": "CBC", "amount": 445.0 } ] } ],
            "claimed_total": 450.0
        }"#;
        let resp = extractor(reply)
            .extract("https://e.com/bill.pdf")
            .await
            .unwrap();
        assert!(resp.is_success);
        assert!(resp.warning.is_none());
        assert!(resp.validation.unwrap().exceeds_tolerance);
    }

    #[tokio::test]
    async fn absent_claimed_total_is_downgraded_as_unverified() {
        let reply = r#"{
            "success": true,
            "pages": [ { "page_no": "1", "items": [ { "name": "CBC", "amount": 400.0 } ] } ],
            "claimed_total": -1
        }"#;
        let resp = extractor(reply)
            .extract("https://e.com/bill.pdf")
            .await
            .unwrap();
        assert!(!resp.is_success, "no claimed total means nothing verified");
        assert!(resp.warning.is_some());
        let report = resp.validation.unwrap();
        assert!(!report.has_claimed_total);
        assert!(report.exceeds_tolerance);
        assert_eq!(report.match_percentage, 0.0);
    }

    #[tokio::test]
    async fn fenced_model_output_is_accepted() {
        let reply = format!("Here you go:\n```json\n{MATCHED_BILL}\n```");
        let resp = extractor(&reply)
            .extract("https://e.com/bill.pdf")
            .await
            .unwrap();
        assert!(resp.is_success);
    }

    #[tokio::test]
    async fn float_item_count_does_not_void_the_extraction() {
        let reply = r#"{
            "success": true,
            "pages": [
                { "page_no": "1", "items": [
                    { "name": "CBC", "amount": 400.0 },
                    { "name": "Paracetamol", "amount": 50.0 }
                ] }
            ],
            "claimed_total": 450.0,
            "claimed_item_count": 2.0
        }"#;
        let resp = extractor(reply)
            .extract("https://e.com/bill.pdf")
            .await
            .unwrap();
        assert!(resp.is_success);
        assert_eq!(resp.data.claimed_item_count, 2);
        assert_eq!(resp.validation.unwrap().match_percentage, 100.0);
    }

    #[tokio::test]
    async fn prose_only_reply_is_unparsable() {
        let err = extractor("I could not read this document, sorry.")
            .extract("https://e.com/bill.pdf")
            .await
            .unwrap_err();
        match err {
            ExtractError::UnparsableModelOutput { raw_prefix } => {
                assert!(raw_prefix.starts_with("I could not read"));
            }
            other => panic!("expected UnparsableModelOutput, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn unknown_document_type_is_rejected_before_the_model() {
        let ex = BillExtractor::new(
            Arc::new(StubFetcher {
                content: b"hello world".to_vec(),
                content_type: None,
            }),
            Arc::new(StubModel {
                reply: MATCHED_BILL.to_string(),
            }),
            ExtractionConfig::default(),
        );
        let err = ex.extract("https://e.com/blob").await.unwrap_err();
        assert!(matches!(err, ExtractError::UnknownDocumentType { .. }));
    }
}
