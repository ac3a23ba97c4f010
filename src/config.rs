//! Configuration types for flyer extraction.
//!
//! All run behaviour is controlled through [`ExtractionConfig`], built via
//! its [`ExtractionConfigBuilder`]. The [`FlyerVariant`] carries everything
//! that differs between the generic parser and the store-specific one, so
//! the pipeline itself never branches on a store name.

use crate::error::DealsError;
use crate::pipeline::llm::Extractor;
use crate::progress::ProgressCallback;
use crate::prompts;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Default model used for extraction.
pub const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";

/// Default Messages API endpoint.
pub const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";

/// Which flyer layout the run targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FlyerVariant {
    /// Any grocery flyer; no store tagging, no deal-type column.
    #[default]
    Generic,
    /// Safeway flyers: deal-type tagging, store column, HTML search page.
    Safeway,
}

impl FlyerVariant {
    /// Fixed store name stamped on every record, if any.
    pub fn store_name(&self) -> Option<&'static str> {
        match self {
            FlyerVariant::Generic => None,
            FlyerVariant::Safeway => Some("Safeway"),
        }
    }

    /// True for variants that tag records with a store and a deal type.
    pub fn is_store_specific(&self) -> bool {
        self.store_name().is_some()
    }

    /// Built-in extraction prompt.
    pub fn prompt(&self) -> &'static str {
        prompts::prompt_for(*self)
    }

    /// Output-token budget. Safeway flyers list far more items per page.
    pub fn default_max_tokens(&self) -> u32 {
        match self {
            FlyerVariant::Generic => 8000,
            FlyerVariant::Safeway => 15000,
        }
    }

    pub fn default_output_dir(&self) -> &'static str {
        match self {
            FlyerVariant::Generic => "out",
            FlyerVariant::Safeway => "out_safeway",
        }
    }

    pub fn json_file_name(&self) -> &'static str {
        match self {
            FlyerVariant::Generic => "deals.json",
            FlyerVariant::Safeway => "deals_safeway.json",
        }
    }

    pub fn csv_file_name(&self) -> &'static str {
        match self {
            FlyerVariant::Generic => "deals.csv",
            FlyerVariant::Safeway => "deals_safeway.csv",
        }
    }

    /// Search page file name; only the store-specific variant gets one.
    pub fn html_file_name(&self) -> Option<&'static str> {
        match self {
            FlyerVariant::Generic => None,
            FlyerVariant::Safeway => Some("index_safeway.html"),
        }
    }
}

impl fmt::Display for FlyerVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlyerVariant::Generic => f.write_str("generic"),
            FlyerVariant::Safeway => f.write_str("safeway"),
        }
    }
}

/// Configuration for an extraction run.
///
/// Built via [`ExtractionConfig::builder()`] or using
/// [`ExtractionConfig::default()`].
///
/// # Example
/// ```rust
/// use slugsaver::{ExtractionConfig, FlyerVariant};
///
/// let config = ExtractionConfig::builder()
///     .variant(FlyerVariant::Safeway)
///     .api_key("sk-ant-...")
///     .output_dir("out_safeway")
///     .build()
///     .unwrap();
/// assert_eq!(config.max_tokens, 15000);
/// ```
#[derive(Clone)]
pub struct ExtractionConfig {
    /// Flyer layout. Default: [`FlyerVariant::Generic`].
    pub variant: FlyerVariant,

    /// Model identifier. Default: [`DEFAULT_MODEL`].
    pub model: String,

    /// Maximum tokens the model may generate per flyer.
    ///
    /// Defaults to the variant's budget. A long flyer that exhausts it comes
    /// back as a truncated JSON array, which the normaliser repairs.
    pub max_tokens: u32,

    /// API key for the built-in Anthropic extractor.
    /// If None, `ANTHROPIC_API_KEY` is consulted.
    pub api_key: Option<String>,

    /// Base URL of the Messages API. Default: [`DEFAULT_BASE_URL`].
    pub base_url: String,

    /// Per-request timeout in seconds. Default: 300.
    ///
    /// A full flyer with 15 000 output tokens routinely takes minutes.
    pub api_timeout_secs: u64,

    /// Custom prompt. If None, uses the variant's built-in prompt.
    pub prompt: Option<String>,

    /// Directory the output files are written to.
    /// Defaults to the variant's directory.
    pub output_dir: PathBuf,

    /// Pre-constructed extractor. Takes precedence over `api_key`.
    pub extractor: Option<Arc<dyn Extractor>>,

    /// Optional progress callback fired for each file.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self::for_variant(FlyerVariant::default())
    }
}

impl fmt::Debug for ExtractionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtractionConfig")
            .field("variant", &self.variant)
            .field("model", &self.model)
            .field("max_tokens", &self.max_tokens)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("base_url", &self.base_url)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field("prompt", &self.prompt.as_ref().map(|p| p.len()))
            .field("output_dir", &self.output_dir)
            .field("extractor", &self.extractor.as_ref().map(|e| e.name().to_string()))
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<callback>"),
            )
            .finish()
    }
}

impl ExtractionConfig {
    /// Defaults for a given variant.
    pub fn for_variant(variant: FlyerVariant) -> Self {
        Self {
            variant,
            model: DEFAULT_MODEL.to_string(),
            max_tokens: variant.default_max_tokens(),
            api_key: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            api_timeout_secs: 300,
            prompt: None,
            output_dir: PathBuf::from(variant.default_output_dir()),
            extractor: None,
            progress_callback: None,
        }
    }

    /// Create a new builder for `ExtractionConfig`.
    pub fn builder() -> ExtractionConfigBuilder {
        ExtractionConfigBuilder {
            config: Self::default(),
            max_tokens_set: false,
            output_dir_set: false,
        }
    }

    /// The prompt actually sent: the override, or the variant's built-in one.
    pub fn effective_prompt(&self) -> &str {
        self.prompt.as_deref().unwrap_or_else(|| self.variant.prompt())
    }
}

/// Builder for [`ExtractionConfig`].
///
/// Variant-dependent defaults (`max_tokens`, `output_dir`) follow the
/// variant unless set explicitly, regardless of call order.
pub struct ExtractionConfigBuilder {
    config: ExtractionConfig,
    max_tokens_set: bool,
    output_dir_set: bool,
}

impl fmt::Debug for ExtractionConfigBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtractionConfigBuilder")
            .field("config", &self.config)
            .finish()
    }
}

impl ExtractionConfigBuilder {
    pub fn variant(mut self, variant: FlyerVariant) -> Self {
        self.config.variant = variant;
        if !self.max_tokens_set {
            self.config.max_tokens = variant.default_max_tokens();
        }
        if !self.output_dir_set {
            self.config.output_dir = PathBuf::from(variant.default_output_dir());
        }
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = model.into();
        self
    }

    pub fn max_tokens(mut self, n: u32) -> Self {
        self.config.max_tokens = n;
        self.max_tokens_set = true;
        self
    }

    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.config.api_key = Some(key.into());
        self
    }

    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config.base_url = url.into();
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.prompt = Some(prompt.into());
        self
    }

    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.output_dir = dir.into();
        self.output_dir_set = true;
        self
    }

    pub fn extractor(mut self, extractor: Arc<dyn Extractor>) -> Self {
        self.config.extractor = Some(extractor);
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ExtractionConfig, DealsError> {
        let c = &self.config;
        if c.model.trim().is_empty() {
            return Err(DealsError::InvalidConfig("Model must not be empty".into()));
        }
        if c.max_tokens == 0 {
            return Err(DealsError::InvalidConfig("max_tokens must be ≥ 1".into()));
        }
        if c.api_timeout_secs == 0 {
            return Err(DealsError::InvalidConfig(
                "API timeout must be ≥ 1 second".into(),
            ));
        }
        if c.prompt.as_deref().is_some_and(|p| p.trim().is_empty()) {
            return Err(DealsError::InvalidConfig("Custom prompt is empty".into()));
        }
        Ok(self.config)
    }
}
