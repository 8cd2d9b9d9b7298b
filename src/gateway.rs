//! The model gateway seam: one "generate text from prompt parts" call.
//!
//! The whole pipeline talks to vision models through [`ModelGateway`], a
//! single-method trait taking an ordered list of [`PromptPart`]s (instruction
//! text, page-number markers, base64 page images) and returning whatever text
//! the model produced plus its token usage.
//!
//! Keeping the seam this narrow has two payoffs:
//!
//! 1. Tests script the pipeline end-to-end with
//!    [`crate::testing::MockGateway`] and never touch the network.
//! 2. "The model returned nothing" is a *value* (`text: None`), not an error.
//!    Gateways must reserve `Err` for transport failures; the retry layer
//!    treats empty output as a spent attempt, not a reason to abort the run.
//!
//! [`LlmGateway`] is the production implementation, backed by the
//! edgequake-llm provider stack (OpenAI / Anthropic / Gemini / Ollama).

use crate::config::{ExtractionConfig, DEFAULT_MODEL};
use crate::error::ExtractError;
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use edgequake_llm::{ChatMessage, CompletionOptions, ImageData, LLMProvider, ProviderFactory};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// One element of a multi-part model prompt, in send order.
#[derive(Debug, Clone, PartialEq)]
pub enum PromptPart {
    /// Plain instruction or marker text.
    Text(String),
    /// A page image, already base64-encoded.
    Image(ImagePayload),
}

impl PromptPart {
    /// Convenience constructor for text parts.
    pub fn text(s: impl Into<String>) -> Self {
        PromptPart::Text(s.into())
    }

    /// The text content, if this is a text part.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            PromptPart::Text(s) => Some(s),
            PromptPart::Image(_) => None,
        }
    }
}

/// A base64-encoded image ready for a multimodal API request body.
#[derive(Clone, PartialEq)]
pub struct ImagePayload {
    /// Base64 image bytes (no data-URI prefix).
    pub data: String,
    /// MIME type, e.g. `image/png`.
    pub mime_type: String,
}

impl ImagePayload {
    /// Read an image file and base64-encode it.
    ///
    /// `page` is only used for error attribution; a missing or unreadable
    /// image aborts the enclosing run (see [`ExtractError::ImageReadFailed`]).
    pub async fn from_path(path: &Path, page: u32) -> Result<Self, ExtractError> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|source| ExtractError::ImageReadFailed { page, source })?;
        debug!(page, bytes = bytes.len(), "loaded page image");
        Ok(Self {
            data: STANDARD.encode(bytes),
            mime_type: "image/png".to_string(),
        })
    }
}

impl fmt::Debug for ImagePayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // The payload is kilobytes of base64; log its size, not its content.
        f.debug_struct("ImagePayload")
            .field("mime_type", &self.mime_type)
            .field("base64_len", &self.data.len())
            .finish()
    }
}

/// Token counts reported by the model API for a single call.
///
/// Field names mirror the wire format of the Gemini-style usage block.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UsageMetadata {
    pub prompt_token_count: u64,
    pub candidates_token_count: u64,
    pub thoughts_token_count: u64,
    pub total_token_count: u64,
}

/// The outcome of a single model call.
#[derive(Debug, Clone, Default)]
pub struct GenerationResponse {
    /// Generated text. `None` when the model produced no usable output;
    /// this is a normal outcome, not an error.
    pub text: Option<String>,
    /// Usage metadata when the API reported it.
    pub usage: Option<UsageMetadata>,
}

/// The single external model capability the pipeline depends on.
#[async_trait]
pub trait ModelGateway: Send + Sync {
    /// Run one generation call.
    ///
    /// `model` is the identifier used for token accounting; gateways bound
    /// to a fixed provider/model pair may ignore it, custom gateways may
    /// route on it. Implementations must return `Ok` with `text: None` for
    /// "no output" and reserve `Err` for transport-level failures.
    async fn generate(
        &self,
        model: &str,
        parts: &[PromptPart],
    ) -> Result<GenerationResponse, ExtractError>;
}

/// Production gateway over the edgequake-llm provider stack.
pub struct LlmGateway {
    provider: Arc<dyn LLMProvider>,
    temperature: f32,
    max_tokens: usize,
}

impl LlmGateway {
    pub fn new(provider: Arc<dyn LLMProvider>, temperature: f32, max_tokens: usize) -> Self {
        Self {
            provider,
            temperature,
            max_tokens,
        }
    }
}

#[async_trait]
impl ModelGateway for LlmGateway {
    async fn generate(
        &self,
        _model: &str,
        parts: &[PromptPart],
    ) -> Result<GenerationResponse, ExtractError> {
        // Collapse the ordered parts into one user turn: marker/instruction
        // text joined by blank lines, images attached in order. Page-number
        // markers stay adjacent to their images in the joined text because
        // parts are built marker-then-image per page.
        let mut text = Vec::new();
        let mut images = Vec::new();
        for part in parts {
            match part {
                PromptPart::Text(s) => text.push(s.as_str()),
                PromptPart::Image(img) => images.push(
                    ImageData::new(img.data.clone(), img.mime_type.as_str()).with_detail("high"),
                ),
            }
        }

        let messages = vec![ChatMessage::user_with_images(text.join("\n\n"), images)];
        let options = CompletionOptions {
            temperature: Some(self.temperature),
            max_tokens: Some(self.max_tokens),
            ..Default::default()
        };

        match self.provider.chat(&messages, Some(&options)).await {
            Ok(response) => {
                let prompt_tokens = response.prompt_tokens as u64;
                let output_tokens = response.completion_tokens as u64;
                let text = if response.content.trim().is_empty() {
                    None
                } else {
                    Some(response.content)
                };
                Ok(GenerationResponse {
                    text,
                    usage: Some(UsageMetadata {
                        prompt_token_count: prompt_tokens,
                        candidates_token_count: output_tokens,
                        thoughts_token_count: 0,
                        total_token_count: prompt_tokens + output_tokens,
                    }),
                })
            }
            Err(e) => Err(ExtractError::Gateway {
                message: e.to_string(),
            }),
        }
    }
}

/// Resolve the model gateway, from most-specific to least-specific.
///
/// 1. Pre-built gateway (`config.gateway`): used as-is. This is how tests
///    inject [`crate::testing::MockGateway`] and how callers add middleware.
/// 2. Named provider (`config.provider_name`) + model via
///    [`ProviderFactory::create_llm_provider`], which reads the matching API
///    key from the environment.
/// 3. `CATALOG2ROWS_LLM_PROVIDER` + `CATALOG2ROWS_MODEL` env pair, so the
///    execution environment can pick without code changes.
/// 4. Full auto-detection via [`ProviderFactory::from_env`].
pub fn resolve_gateway(config: &ExtractionConfig) -> Result<Arc<dyn ModelGateway>, ExtractError> {
    if let Some(ref gateway) = config.gateway {
        return Ok(Arc::clone(gateway));
    }

    let model = config.model.as_deref().unwrap_or(DEFAULT_MODEL);

    if let Some(ref name) = config.provider_name {
        let provider = create_provider(name, model)?;
        return Ok(Arc::new(LlmGateway::new(
            provider,
            config.temperature,
            config.max_tokens,
        )));
    }

    if let (Ok(prov), Ok(env_model)) = (
        std::env::var("CATALOG2ROWS_LLM_PROVIDER"),
        std::env::var("CATALOG2ROWS_MODEL"),
    ) {
        if !prov.is_empty() && !env_model.is_empty() {
            let provider = create_provider(&prov, &env_model)?;
            return Ok(Arc::new(LlmGateway::new(
                provider,
                config.temperature,
                config.max_tokens,
            )));
        }
    }

    let (provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| ExtractError::GatewayNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No model provider could be auto-detected from the environment.\n\
                 Set GEMINI_API_KEY, OPENAI_API_KEY, or ANTHROPIC_API_KEY, or pass --provider.\n\
                 Error: {e}"
            ),
        })?;

    Ok(Arc::new(LlmGateway::new(
        provider,
        config.temperature,
        config.max_tokens,
    )))
}

fn create_provider(name: &str, model: &str) -> Result<Arc<dyn LLMProvider>, ExtractError> {
    ProviderFactory::create_llm_provider(name, model).map_err(|e| {
        ExtractError::GatewayNotConfigured {
            provider: name.to_string(),
            hint: format!("{e}"),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_part_text_accessor() {
        let part = PromptPart::text("PAGE_NUMBER: 3");
        assert_eq!(part.as_text(), Some("PAGE_NUMBER: 3"));

        let img = PromptPart::Image(ImagePayload {
            data: "aGk=".into(),
            mime_type: "image/png".into(),
        });
        assert_eq!(img.as_text(), None);
    }

    #[test]
    fn image_payload_debug_hides_data() {
        let img = ImagePayload {
            data: "A".repeat(4096),
            mime_type: "image/png".into(),
        };
        let dbg = format!("{img:?}");
        assert!(dbg.contains("4096"));
        assert!(!dbg.contains("AAAA"));
    }

    #[test]
    fn usage_metadata_deserializes_wire_names() {
        let usage: UsageMetadata = serde_json::from_str(
            r#"{"promptTokenCount": 10, "candidatesTokenCount": 4, "totalTokenCount": 14}"#,
        )
        .unwrap();
        assert_eq!(usage.prompt_token_count, 10);
        assert_eq!(usage.candidates_token_count, 4);
        assert_eq!(usage.thoughts_token_count, 0);
        assert_eq!(usage.total_token_count, 14);
    }

    #[tokio::test]
    async fn image_payload_from_missing_path_is_fatal() {
        let err = ImagePayload::from_path(Path::new("/nonexistent/page-01.png"), 1)
            .await
            .unwrap_err();
        assert!(matches!(err, ExtractError::ImageReadFailed { page: 1, .. }));
    }
}
