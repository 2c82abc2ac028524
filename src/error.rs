//! Error types for the bill2data library.
//!
//! Every pipeline stage maps its failures into one [`ExtractError`] variant,
//! and every variant belongs to exactly one [`FailureKind`]:
//!
//! * [`FailureKind::BadInput`] — the caller supplied something we cannot
//!   work with (unreachable URL, non-2xx fetch, untyped document). Surfaced
//!   as HTTP 400. Not retried.
//!
//! * [`FailureKind::Upstream`] — the vision model misbehaved (transport
//!   error, timeout, response with no JSON in it). Not the caller's fault.
//!   Surfaced as HTTP 502. Not retried.
//!
//! * [`FailureKind::Internal`] — anything unexpected. HTTP 500.
//!
//! A reconciliation mismatch is deliberately NOT an error: it flips the
//! `is_success` flag inside a 200 response body so callers can distinguish
//! "we extracted but the totals disagree" from "we could not extract".

use thiserror::Error;

/// Coarse failure category used by the HTTP layer for status mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// User-caused: unreachable or untyped document. 4xx.
    BadInput,
    /// Model invocation or response-shape failure. 502.
    Upstream,
    /// Unexpected failure anywhere in the pipeline. 500.
    Internal,
}

/// All fatal errors returned by the extraction pipeline.
///
/// Soft failures (total mismatch beyond tolerance) never reach this type —
/// they live in the response body as `is_success = false` plus a `warning`.
#[derive(Debug, Error)]
pub enum ExtractError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Document download failed (network error or non-2xx status).
    #[error("failed to fetch document '{url}': {reason}")]
    FetchFailed { url: String, reason: String },

    /// Document download exceeded the fixed fetch timeout.
    #[error("fetch timed out after {secs}s for '{url}'")]
    FetchTimeout { url: String, secs: u64 },

    /// Neither header, URL suffix, magic bytes, nor raster sniffing could
    /// classify the document as a PDF or image.
    #[error("could not determine document type of '{url}' (not a PDF or raster image)")]
    UnknownDocumentType { url: String },

    // ── Provider errors ───────────────────────────────────────────────────
    /// The configured vision provider is not usable (missing API key etc.).
    #[error("vision provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    /// The model API returned an error or a malformed envelope.
    #[error("model invocation failed: {detail}")]
    ModelInvocationFailed { detail: String },

    /// The model call exceeded the fixed invocation timeout.
    #[error("model call timed out after {secs}s")]
    ModelTimeout { secs: u64 },

    /// Every JSON-extraction strategy failed on the model's text output.
    ///
    /// `raw_prefix` carries the first 500 characters of the raw response
    /// for diagnostics; the HTTP layer embeds it in the failure payload.
    #[error("model response contained no parsable JSON object")]
    UnparsableModelOutput { raw_prefix: String },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ExtractError {
    /// The HTTP-facing category of this error.
    pub fn kind(&self) -> FailureKind {
        match self {
            ExtractError::FetchFailed { .. }
            | ExtractError::FetchTimeout { .. }
            | ExtractError::UnknownDocumentType { .. } => FailureKind::BadInput,
            ExtractError::ModelInvocationFailed { .. }
            | ExtractError::ModelTimeout { .. }
            | ExtractError::UnparsableModelOutput { .. } => FailureKind::Upstream,
            ExtractError::ProviderNotConfigured { .. }
            | ExtractError::InvalidConfig(_)
            | ExtractError::Internal(_) => FailureKind::Internal,
        }
    }
}
