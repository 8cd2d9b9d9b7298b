//! Configuration for a catalog extraction run.
//!
//! Every knob lives in [`ExtractionConfig`], built via its builder. Keeping
//! the tunables in one struct makes it trivial to share configs across
//! threads and to diff two runs to understand why their outputs differ.
//! Batch sizes and attempt budgets are configuration, not invariants: the
//! defaults encode the production trade-offs (classification batches of 5,
//! one extraction call per page) but callers may tune both.

use crate::error::ExtractError;
use crate::gateway::ModelGateway;
use crate::pipeline::render::Rasterizer;
use crate::pricing::DEFAULT_USD_TO_INR;
use crate::progress::ProgressSink;
use crate::row::RowSchema;
use std::fmt;
use std::sync::Arc;

/// Model used when neither config nor environment picks one.
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";

/// Configuration for [`crate::extract::extract_document`].
#[derive(Clone)]
pub struct ExtractionConfig {
    /// Model identifier, also the accounting key. Default: [`DEFAULT_MODEL`].
    pub model: Option<String>,

    /// Provider name (e.g. "gemini", "openai"). If `None` along with
    /// `gateway`, the provider is auto-detected from the environment.
    pub provider_name: Option<String>,

    /// Pre-constructed model gateway. Takes precedence over `provider_name`.
    pub gateway: Option<Arc<dyn ModelGateway>>,

    /// Page rasterizer. Defaults to poppler's `pdftoppm`.
    pub rasterizer: Option<Arc<dyn Rasterizer>>,

    /// Progress sink for observability events. Defaults to a no-op.
    pub progress: Option<Arc<dyn ProgressSink>>,

    /// Row field layout the extractor produces. Default: value+unit.
    pub row_schema: RowSchema,

    /// Pages per classification call. Default: 5.
    ///
    /// Larger batches amortise the instruction prompt over more pages but
    /// raise the blast radius of one bad response: a failed batch drops the
    /// classifications of every page in it.
    pub classify_batch_size: usize,

    /// Pages per extraction call. Default: 1.
    ///
    /// One call per page costs more prompt tokens overall but isolates
    /// failures to a single page and keeps row provenance unambiguous.
    pub extract_batch_size: usize,

    /// Generation attempts (including JSON repair) per classification batch.
    /// Default: 1; classification failures degrade gracefully instead of
    /// being retried expensively.
    pub classify_attempts: u32,

    /// Generation attempts for the planning call. Default: 2; planning is a
    /// single cheap text-only call and the repair attempt is worth it.
    pub plan_attempts: u32,

    /// Generation attempts per extraction batch. Default: 1.
    pub extract_attempts: u32,

    /// Rasterization DPI. Default: 200.
    pub render_dpi: u32,

    /// Sampling temperature. Default: 0.0; extraction wants the model
    /// deterministic and faithful to the page.
    pub temperature: f32,

    /// Max output tokens per model call. Default: 8192. Dense price tables
    /// produce many rows; a low cap silently truncates the JSON mid-array.
    pub max_tokens: usize,

    /// USD to INR conversion for cost reporting. Default: 90.7.
    pub usd_to_inr: f64,

    /// Download timeout for URL inputs, in seconds. Default: 120.
    pub download_timeout_secs: u64,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            model: None,
            provider_name: None,
            gateway: None,
            rasterizer: None,
            progress: None,
            row_schema: RowSchema::default(),
            classify_batch_size: 5,
            extract_batch_size: 1,
            classify_attempts: 1,
            plan_attempts: 2,
            extract_attempts: 1,
            render_dpi: 200,
            temperature: 0.0,
            max_tokens: 8192,
            usd_to_inr: DEFAULT_USD_TO_INR,
            download_timeout_secs: 120,
        }
    }
}

impl fmt::Debug for ExtractionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtractionConfig")
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("gateway", &self.gateway.as_ref().map(|_| "<dyn ModelGateway>"))
            .field("rasterizer", &self.rasterizer.as_ref().map(|_| "<dyn Rasterizer>"))
            .field("progress", &self.progress.as_ref().map(|_| "<dyn ProgressSink>"))
            .field("row_schema", &self.row_schema)
            .field("classify_batch_size", &self.classify_batch_size)
            .field("extract_batch_size", &self.extract_batch_size)
            .field("classify_attempts", &self.classify_attempts)
            .field("plan_attempts", &self.plan_attempts)
            .field("extract_attempts", &self.extract_attempts)
            .field("render_dpi", &self.render_dpi)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("usd_to_inr", &self.usd_to_inr)
            .finish()
    }
}

impl ExtractionConfig {
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
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn gateway(mut self, gateway: Arc<dyn ModelGateway>) -> Self {
        self.config.gateway = Some(gateway);
        self
    }

    pub fn rasterizer(mut self, rasterizer: Arc<dyn Rasterizer>) -> Self {
        self.config.rasterizer = Some(rasterizer);
        self
    }

    pub fn progress(mut self, sink: Arc<dyn ProgressSink>) -> Self {
        self.config.progress = Some(sink);
        self
    }

    pub fn row_schema(mut self, schema: RowSchema) -> Self {
        self.config.row_schema = schema;
        self
    }

    pub fn classify_batch_size(mut self, n: usize) -> Self {
        self.config.classify_batch_size = n.max(1);
        self
    }

    pub fn extract_batch_size(mut self, n: usize) -> Self {
        self.config.extract_batch_size = n.max(1);
        self
    }

    pub fn classify_attempts(mut self, n: u32) -> Self {
        self.config.classify_attempts = n.max(1);
        self
    }

    pub fn plan_attempts(mut self, n: u32) -> Self {
        self.config.plan_attempts = n.max(1);
        self
    }

    pub fn extract_attempts(mut self, n: u32) -> Self {
        self.config.extract_attempts = n.max(1);
        self
    }

    pub fn render_dpi(mut self, dpi: u32) -> Self {
        self.config.render_dpi = dpi.clamp(72, 600);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn usd_to_inr(mut self, rate: f64) -> Self {
        self.config.usd_to_inr = rate;
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ExtractionConfig, ExtractError> {
        let c = &self.config;
        if c.classify_batch_size == 0 || c.extract_batch_size == 0 {
            return Err(ExtractError::InvalidConfig(
                "Batch sizes must be ≥ 1".into(),
            ));
        }
        if c.usd_to_inr <= 0.0 || !c.usd_to_inr.is_finite() {
            return Err(ExtractError::InvalidConfig(format!(
                "usd_to_inr must be a positive number, got {}",
                c.usd_to_inr
            )));
        }
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_production_values() {
        let config = ExtractionConfig::default();
        assert_eq!(config.classify_batch_size, 5);
        assert_eq!(config.extract_batch_size, 1);
        assert_eq!(config.classify_attempts, 1);
        assert_eq!(config.extract_attempts, 1);
        assert_eq!(config.render_dpi, 200);
        assert_eq!(config.row_schema, RowSchema::ValueUnit);
    }

    #[test]
    fn builder_clamps_degenerate_values() {
        let config = ExtractionConfig::builder()
            .classify_batch_size(0)
            .extract_batch_size(0)
            .classify_attempts(0)
            .render_dpi(10_000)
            .temperature(9.0)
            .build()
            .unwrap();
        assert_eq!(config.classify_batch_size, 1);
        assert_eq!(config.extract_batch_size, 1);
        assert_eq!(config.classify_attempts, 1);
        assert_eq!(config.render_dpi, 600);
        assert_eq!(config.temperature, 2.0);
    }

    #[test]
    fn build_rejects_bad_exchange_rate() {
        let err = ExtractionConfig::builder()
            .usd_to_inr(-1.0)
            .build()
            .unwrap_err();
        assert!(matches!(err, ExtractError::InvalidConfig(_)));
    }
}
