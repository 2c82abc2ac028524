//! Document download.
//!
//! The fetcher is a trait so the rest of the pipeline (and every test) can
//! run against an in-memory stub instead of the network. Production uses
//! [`HttpFetcher`], a thin wrapper over a shared `reqwest` client.

use crate::error::ExtractError;
use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

/// Fetches bill documents by URL.
#[async_trait]
pub trait DocumentFetcher: Send + Sync {
    /// Download the document, returning its bytes and the response's
    /// `content-type` header when present.
    async fn fetch(&self, url: &str) -> Result<(Vec<u8>, Option<String>), ExtractError>;
}

/// HTTP fetcher backed by `reqwest`.
///
/// Follows redirects (signed bucket URLs usually bounce at least once) and
/// enforces the configured download timeout. Any non-2xx status is a fetch
/// failure; there are no retries.
pub struct HttpFetcher {
    client: reqwest::Client,
    timeout_secs: u64,
}

impl HttpFetcher {
    pub fn new(timeout_secs: u64) -> Result<Self, ExtractError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| ExtractError::Internal(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            timeout_secs,
        })
    }
}

#[async_trait]
impl DocumentFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<(Vec<u8>, Option<String>), ExtractError> {
        let response = self.client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                ExtractError::FetchTimeout {
                    url: url.to_string(),
                    secs: self.timeout_secs,
                }
            } else {
                ExtractError::FetchFailed {
                    url: url.to_string(),
                    reason: e.to_string(),
                }
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ExtractError::FetchFailed {
                url: url.to_string(),
                reason: format!("HTTP {status}"),
            });
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let bytes = response.bytes().await.map_err(|e| {
            if e.is_timeout() {
                ExtractError::FetchTimeout {
                    url: url.to_string(),
                    secs: self.timeout_secs,
                }
            } else {
                ExtractError::FetchFailed {
                    url: url.to_string(),
                    reason: format!("failed to read body: {e}"),
                }
            }
        })?;

        debug!(url, bytes = bytes.len(), content_type, "fetched document");
        Ok((bytes.to_vec(), content_type))
    }
}
