//! # bill2data
//!
//! Structured data extraction from medical bills (PDF or image) using
//! hosted vision models, with arithmetic cross-checks the model cannot be
//! trusted to do itself.
//!
//! ## Pipeline
//!
//! ```text
//! URL ──▶ fetch ──▶ detect ──▶ vision model ──▶ parse ──▶ validate ──▶ BillResponse
//!         bytes     pdf/image   free text        JSON      reconcile
//! ```
//!
//! * [`pipeline::fetch`] downloads the document.
//! * [`pipeline::detect`] classifies it (header, suffix, magic bytes, sniff).
//! * [`provider`] sends it to Gemini or OpenRouter with the extraction prompt.
//! * [`pipeline::parse`] digs one JSON object out of the model's reply.
//! * [`pipeline::duplicates`] flags line items repeated across pages.
//! * [`pipeline::validate`] reconciles the computed sum against the bill's
//!   stated total within a one-currency-unit tolerance.
//!
//! [`extract::BillExtractor`] orchestrates the stages; [`server`] exposes
//! them as an HTTP service (`POST /extract-bill-data`, `GET /health`).
//!
//! ## Example
//!
//! ```rust,no_run
//! use bill2data::{BillExtractor, ExtractionConfig, HttpFetcher, resolve_model};
//! use std::sync::Arc;
//!
//! # async fn run() -> Result<(), bill2data::ExtractError> {
//! let config = ExtractionConfig::default();
//! let fetcher = Arc::new(HttpFetcher::new(config.fetch_timeout_secs)?);
//! let model = resolve_model(&config)?;
//! let extractor = BillExtractor::new(fetcher, model, config);
//!
//! let response = extractor.extract("https://example.com/bill.pdf").await?;
//! println!("computed total: {:?}", response.validation);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod extract;
pub mod pipeline;
pub mod prompts;
pub mod provider;
pub mod schema;
pub mod server;

pub use config::{ExtractionConfig, ExtractionConfigBuilder};
pub use error::{ExtractError, FailureKind};
pub use extract::BillExtractor;
pub use pipeline::fetch::{DocumentFetcher, HttpFetcher};
pub use provider::{resolve_model, ModelReply, VisionModel};
pub use schema::{BillResponse, ExtractionResult, LineItem, Page, TokenUsage, ValidationReport};
