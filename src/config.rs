//! Configuration for the extraction pipeline.
//!
//! All behaviour is controlled through [`ExtractionConfig`], built via its
//! [`ExtractionConfigBuilder`]. One struct for every knob keeps configs easy
//! to share across handlers and to log when two runs disagree.
//!
//! # Design choice: builder over constructor
//! The builder lets callers set only what they care about and rely on
//! documented defaults for the rest; validation happens once in `build()`.

use crate::error::ExtractError;
use serde::{Deserialize, Serialize};

/// Configuration for a bill-extraction run.
///
/// Built via [`ExtractionConfig::builder()`] or [`ExtractionConfig::default()`].
///
/// # Example
/// ```rust
/// use bill2data::ExtractionConfig;
///
/// let config = ExtractionConfig::builder()
///     .provider_name("gemini")
///     .model("gemini-2.0-flash")
///     .fetch_timeout_secs(30)
///     .build()
///     .unwrap();
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionConfig {
    /// Vision provider name ("gemini" or "openrouter"). If `None`, the
    /// provider is auto-detected from which API key is set in the
    /// environment.
    pub provider_name: Option<String>,

    /// Model identifier, e.g. "gemini-2.0-flash". If `None`, the provider's
    /// default model is used.
    pub model: Option<String>,

    /// Document download timeout in seconds. Default: 60.
    ///
    /// A bill is a handful of pages; anything that takes longer than a
    /// minute to download is treated as unreachable rather than retried.
    pub fetch_timeout_secs: u64,

    /// Model invocation timeout in seconds. Default: 120.
    ///
    /// Vision calls on multi-page PDFs routinely take 30–60 s. A request
    /// that exceeds this fails outright; there is no retry or resume.
    pub model_timeout_secs: u64,

    /// Absolute monetary tolerance for total reconciliation, in units of
    /// the bill's currency. Default: 1.00.
    ///
    /// Computed and claimed totals within this margin are considered
    /// reconciled. The boundary is inclusive: a discrepancy of exactly the
    /// tolerance still passes.
    pub tolerance: f64,

    /// Match-percentage floor for the outcome policy. Default: 90.0.
    ///
    /// When the discrepancy exceeds the tolerance AND the match percentage
    /// falls below this floor, the response's `is_success` flag flips to
    /// false and a warning naming both totals is attached.
    pub match_floor: f64,

    /// Custom extraction prompt. If `None`, uses the built-in default.
    pub prompt: Option<String>,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            provider_name: None,
            model: None,
            fetch_timeout_secs: 60,
            model_timeout_secs: 120,
            tolerance: 1.0,
            match_floor: 90.0,
            prompt: None,
        }
    }
}

impl ExtractionConfig {
    /// Create a new builder for `ExtractionConfig`.
    pub fn builder() -> ExtractionConfigBuilder {
        ExtractionConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`ExtractionConfig`].
#[derive(Debug)]
pub struct ExtractionConfigBuilder {
    config: ExtractionConfig,
}

impl ExtractionConfigBuilder {
    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn fetch_timeout_secs(mut self, secs: u64) -> Self {
        self.config.fetch_timeout_secs = secs.max(1);
        self
    }

    pub fn model_timeout_secs(mut self, secs: u64) -> Self {
        self.config.model_timeout_secs = secs.max(1);
        self
    }

    pub fn tolerance(mut self, tolerance: f64) -> Self {
        self.config.tolerance = tolerance;
        self
    }

    pub fn match_floor(mut self, floor: f64) -> Self {
        self.config.match_floor = floor;
        self
    }

    pub fn prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.prompt = Some(prompt.into());
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ExtractionConfig, ExtractError> {
        let c = &self.config;
        if !c.tolerance.is_finite() || c.tolerance < 0.0 {
            return Err(ExtractError::InvalidConfig(format!(
                "tolerance must be a non-negative number, got {}",
                c.tolerance
            )));
        }
        if !c.match_floor.is_finite() || !(0.0..=100.0).contains(&c.match_floor) {
            return Err(ExtractError::InvalidConfig(format!(
                "match_floor must be within 0–100, got {}",
                c.match_floor
            )));
        }
        Ok(self.config)
    }
}
