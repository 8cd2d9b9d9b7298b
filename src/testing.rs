//! Testing utilities: mock implementations of the external seams.
//!
//! Useful for testing the pipeline (and applications built on it) without
//! real model calls or a poppler install. [`MockGateway`] replays a scripted
//! queue of responses and records every call for assertions;
//! [`MockRasterizer`] materialises placeholder page images on disk so the
//! image-loading path runs for real.

use crate::error::ExtractError;
use crate::gateway::{GenerationResponse, ModelGateway, PromptPart, UsageMetadata};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// One recorded gateway call.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub model: String,
    pub parts: Vec<PromptPart>,
}

enum Scripted {
    Reply(GenerationResponse),
    Fail(String),
}

/// A scripted model gateway.
///
/// Responses are consumed front-to-back, one per call; once the script is
/// exhausted every further call returns an empty response (`text: None`),
/// which the pipeline treats as a degraded batch, not an error.
#[derive(Default)]
pub struct MockGateway {
    script: Mutex<VecDeque<Scripted>>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl MockGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a text reply with plausible usage metadata attached.
    pub fn with_text(self, text: impl Into<String>) -> Self {
        self.script
            .lock()
            .unwrap()
            .push_back(Scripted::Reply(GenerationResponse {
                text: Some(text.into()),
                usage: Some(UsageMetadata {
                    prompt_token_count: 100,
                    candidates_token_count: 20,
                    thoughts_token_count: 0,
                    total_token_count: 120,
                }),
            }));
        self
    }

    /// Queue a "model produced nothing" reply.
    pub fn with_empty(self) -> Self {
        self.script
            .lock()
            .unwrap()
            .push_back(Scripted::Reply(GenerationResponse::default()));
        self
    }

    /// Queue an exact response.
    pub fn with_response(self, response: GenerationResponse) -> Self {
        self.script.lock().unwrap().push_back(Scripted::Reply(response));
        self
    }

    /// Queue a transport failure.
    pub fn with_failure(self, message: impl Into<String>) -> Self {
        self.script
            .lock()
            .unwrap()
            .push_back(Scripted::Fail(message.into()));
        self
    }

    /// Snapshot of every call made so far.
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl ModelGateway for MockGateway {
    async fn generate(
        &self,
        model: &str,
        parts: &[PromptPart],
    ) -> Result<GenerationResponse, ExtractError> {
        self.calls.lock().unwrap().push(RecordedCall {
            model: model.to_string(),
            parts: parts.to_vec(),
        });

        match self.script.lock().unwrap().pop_front() {
            Some(Scripted::Reply(response)) => Ok(response),
            Some(Scripted::Fail(message)) => Err(ExtractError::Gateway { message }),
            None => Ok(GenerationResponse::default()),
        }
    }
}

/// A rasterizer that writes `pages` placeholder PNGs into the output dir.
///
/// The files hold stub bytes; the pipeline only reads and base64-encodes
/// them, so no real image data is needed.
pub struct MockRasterizer {
    pub pages: u32,
}

impl MockRasterizer {
    pub fn new(pages: u32) -> Self {
        Self { pages }
    }
}

#[async_trait]
impl crate::pipeline::render::Rasterizer for MockRasterizer {
    async fn render(
        &self,
        _pdf_path: &Path,
        output_dir: &Path,
        _dpi: u32,
    ) -> Result<Vec<PathBuf>, ExtractError> {
        let mut paths = Vec::with_capacity(self.pages as usize);
        for page in 1..=self.pages {
            let path = output_dir.join(format!("page-{page:02}.png"));
            tokio::fs::write(&path, b"\x89PNG\r\n\x1a\nstub")
                .await
                .map_err(|e| ExtractError::RasterizationFailed {
                    detail: format!("mock write failed: {e}"),
                })?;
            paths.push(path);
        }
        Ok(paths)
    }
}
