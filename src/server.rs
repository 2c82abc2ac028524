//! HTTP service surface.
//!
//! Three routes:
//!
//! * `POST /extract-bill-data` — run the pipeline on `{"document": "<url>"}`.
//! * `GET /health` — liveness plus provider/model/key status.
//! * `GET /` — service banner, same shape as `/health`.
//!
//! Status mapping follows [`crate::error::FailureKind`]: caller mistakes are
//! 400, model misbehaviour is 502, everything else is 500. The one special
//! case is unparsable model output: that 502 carries the canned zeroed
//! [`BillResponse`] so clients always get the same body shape back.

use crate::error::{ExtractError, FailureKind};
use crate::extract::BillExtractor;
use crate::schema::BillResponse;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

/// Shared state handed to every handler.
pub struct AppState {
    pub extractor: BillExtractor,
    pub api_key_configured: bool,
}

/// Request body for `POST /extract-bill-data`.
#[derive(Debug, Deserialize, Serialize)]
pub struct ExtractRequest {
    /// URL of the bill document (PDF or image).
    pub document: String,
}

/// Build the service router.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/extract-bill-data", post(extract_bill_data))
        .route("/health", get(health))
        .route("/", get(health))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Bind and serve until ctrl-c.
pub async fn serve(state: Arc<AppState>, addr: &str) -> Result<(), ExtractError> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| ExtractError::Internal(format!("failed to bind {addr}: {e}")))?;
    info!(addr, "bill extraction service listening");

    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutdown signal received");
        })
        .await
        .map_err(|e| ExtractError::Internal(format!("server error: {e}")))
}

async fn extract_bill_data(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ExtractRequest>,
) -> Result<Json<BillResponse>, ApiError> {
    let url = request.document.trim();
    if url.is_empty() {
        return Err(ApiError::bad_request("'document' must be a non-empty URL"));
    }

    info!(url, "extraction requested");
    let response = state.extractor.extract(url).await.map_err(ApiError::from)?;
    Ok(Json(response))
}

async fn health(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "service": "bill2data",
        "provider": state.extractor.model().name(),
        "model": state.extractor.model().model_id(),
        "api_key_configured": state.api_key_configured,
        "features": ["duplicate_detection", "total_validation", "section_subtotals"],
    }))
}

/// HTTP-facing error wrapper around [`ExtractError`].
pub struct ApiError {
    status: StatusCode,
    body: Response,
}

impl ApiError {
    fn bad_request(message: &str) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            body: Json(json!({ "error": message })).into_response(),
        }
    }
}

impl From<ExtractError> for ApiError {
    fn from(err: ExtractError) -> Self {
        // Unparsable output keeps the response-body contract: clients get
        // the zeroed payload with the raw prefix attached.
        if let ExtractError::UnparsableModelOutput { raw_prefix } = &err {
            error!(%err, "model output unparsable");
            return Self {
                status: StatusCode::BAD_GATEWAY,
                body: Json(BillResponse::unparsable(raw_prefix.clone())).into_response(),
            };
        }

        let status = match err.kind() {
            FailureKind::BadInput => StatusCode::BAD_REQUEST,
            FailureKind::Upstream => StatusCode::BAD_GATEWAY,
            FailureKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        };
        error!(%err, status = status.as_u16(), "extraction failed");
        Self {
            status,
            body: Json(json!({ "error": err.to_string() })).into_response(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut response = self.body;
        *response.status_mut() = self.status;
        response
    }
}
