//! End-to-end service tests against the router, no network and no model.
//!
//! A stub fetcher serves fixed bytes and a stub model replies with fixed
//! text, so every test exercises the real pipeline code (detection,
//! parsing, duplicate flagging, reconciliation, status mapping) through
//! the actual HTTP surface.

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use bill2data::error::ExtractError;
use bill2data::provider::{ModelReply, VisionModel};
use bill2data::server::{build_router, AppState};
use bill2data::{BillExtractor, DocumentFetcher, ExtractionConfig, TokenUsage};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

struct StubFetcher {
    result: Result<(Vec<u8>, Option<String>), ExtractError>,
}

#[async_trait]
impl DocumentFetcher for StubFetcher {
    async fn fetch(&self, _url: &str) -> Result<(Vec<u8>, Option<String>), ExtractError> {
        match &self.result {
            Ok(ok) => Ok(ok.clone()),
            Err(ExtractError::FetchFailed { url, reason }) => Err(ExtractError::FetchFailed {
                url: url.clone(),
                reason: reason.clone(),
            }),
            Err(_) => unreachable!("stub only carries FetchFailed"),
        }
    }
}

struct StubModel {
    reply: String,
}

#[async_trait]
impl VisionModel for StubModel {
    fn name(&self) -> &str {
        "stub"
    }

    fn model_id(&self) -> &str {
        "stub-vision-1"
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
                total: Some(1540),
                input: Some(1200),
                output: Some(340),
            },
        })
    }
}

fn app_with(fetcher: StubFetcher, reply: &str) -> axum::Router {
    let extractor = BillExtractor::new(
        Arc::new(fetcher),
        Arc::new(StubModel {
            reply: reply.to_string(),
        }),
        ExtractionConfig::default(),
    );
    build_router(Arc::new(AppState {
        extractor,
        api_key_configured: true,
    }))
}

fn pdf_app(reply: &str) -> axum::Router {
    app_with(
        StubFetcher {
            result: Ok((b"%PDF-1.7".to_vec(), Some("application/pdf".into()))),
        },
        reply,
    )
}

fn extract_request(document: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/extract-bill-data")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(
            json!({ "document": document }).to_string(),
        ))
        .unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

const MATCHED_BILL: &str = r#"{
    "success": true,
    "pages": [
        { "page_no": "1", "page_type": "BillDetail", "items": [
            { "name": "CBC", "amount": 400.0, "rate": 400.0, "quantity": 1 },
            { "name": "Paracetamol 500mg", "amount": 50.0, "rate": 5.0, "quantity": 10 }
        ] },
        { "page_no": "2", "page_type": "FinalBill", "items": [] }
    ],
    "subtotals": [ { "section_name": "Diagnostics", "subtotal": 400.0, "item_count": 1 } ],
    "claimed_total": 450.0,
    "claimed_item_count": 2
}"#;

#[tokio::test]
async fn happy_path_returns_reconciled_response() {
    let response = pdf_app(MATCHED_BILL)
        .oneshot(extract_request("https://e.com/bill.pdf"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["is_success"], json!(true));
    assert_eq!(body["validation"]["computed_total"], json!(450.0));
    assert_eq!(body["validation"]["match_percentage"], json!(100.0));
    assert_eq!(body["validation"]["exceeds_tolerance"], json!(false));
    assert_eq!(body["token_usage"]["total"], json!(1540));
    assert!(body.get("warning").is_none());
    assert!(body.get("model_raw_output").is_none());
}

#[tokio::test]
async fn total_mismatch_is_a_soft_failure_with_warning() {
    let reply = r#"{
        "success": true,
        "pages": [ { "page_no": "1", "items": [ { "name": "CBC", "amount": 400.0 } ] } ],
        "claimed_total": 900.0
    }"#;
    let response = pdf_app(reply)
        .oneshot(extract_request("https://e.com/bill.pdf"))
        .await
        .unwrap();
    // Mismatch is not an HTTP error: the extraction itself worked.
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["is_success"], json!(false));
    let warning = body["warning"].as_str().unwrap();
    assert!(warning.contains("Total mismatch"));
    assert!(warning.contains("400.00"));
    assert!(warning.contains("900.00"));
}

#[tokio::test]
async fn cross_page_duplicates_are_counted() {
    let reply = r#"{
        "success": true,
        "pages": [
            { "page_no": "1", "items": [ { "name": "CBC", "amount": 400.0 } ] },
            { "page_no": "2", "items": [ { "name": "cbc", "amount": 400.0 } ] }
        ],
        "claimed_total": 800.0
    }"#;
    let response = pdf_app(reply)
        .oneshot(extract_request("https://e.com/bill.pdf"))
        .await
        .unwrap();
    let body = body_json(response).await;
    assert_eq!(body["validation"]["duplicate_count"], json!(1));
    assert_eq!(body["validation"]["computed_total"], json!(800.0));
}

#[tokio::test]
async fn unparsable_model_output_is_502_with_canned_payload() {
    let response = pdf_app("I'm sorry, this page is too blurry to read.")
        .oneshot(extract_request("https://e.com/bill.pdf"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);

    let body = body_json(response).await;
    assert_eq!(body["is_success"], json!(false));
    assert_eq!(body["data"]["pages"], json!([]));
    assert_eq!(body["data"]["claimed_total"], json!(-1.0));
    assert!(body["model_raw_output"]
        .as_str()
        .unwrap()
        .starts_with("I'm sorry"));
}

#[tokio::test]
async fn unknown_document_type_is_400() {
    let app = app_with(
        StubFetcher {
            result: Ok((b"just some text".to_vec(), None)),
        },
        MATCHED_BILL,
    );
    let response = app
        .oneshot(extract_request("https://e.com/notes"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = body_json(response).await;
    assert!(body["error"]
        .as_str()
        .unwrap()
        .contains("could not determine document type"));
}

#[tokio::test]
async fn fetch_failure_is_400() {
    let app = app_with(
        StubFetcher {
            result: Err(ExtractError::FetchFailed {
                url: "https://e.com/gone.pdf".into(),
                reason: "HTTP 404 Not Found".into(),
            }),
        },
        MATCHED_BILL,
    );
    let response = app
        .oneshot(extract_request("https://e.com/gone.pdf"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn empty_document_url_is_rejected() {
    let response = pdf_app(MATCHED_BILL)
        .oneshot(extract_request("   "))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn health_reports_provider_and_model() {
    let response = pdf_app(MATCHED_BILL)
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["status"], json!("ok"));
    assert_eq!(body["provider"], json!("stub"));
    assert_eq!(body["model"], json!("stub-vision-1"));
    assert_eq!(body["api_key_configured"], json!(true));
    let features = body["features"].as_array().unwrap();
    assert!(features.contains(&json!("duplicate_detection")));
    assert!(features.contains(&json!("total_validation")));
}

#[tokio::test]
async fn root_serves_the_same_banner() {
    let response = pdf_app(MATCHED_BILL)
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["service"], json!("bill2data"));
}
