//! End-to-end document extraction: the library's primary entry point.
//!
//! [`extract_document`] sequences the pipeline stages — resolve input,
//! rasterize, classify, plan, extract — and returns the normalized rows
//! together with the run's token accounting and stats. Every run owns a
//! fresh [`TokenUsage`]; nothing is ambient, so concurrent documents never
//! share accounting state.
//!
//! A run that extracts zero rows is still a successful run: the caller gets
//! counts and usage rather than an error. Only structural failures (missing
//! file, zero pages, transport errors) surface as `Err`, and those are also
//! mirrored to the progress sink's error event before propagating.

use crate::config::{ExtractionConfig, DEFAULT_MODEL};
use crate::error::ExtractError;
use crate::gateway::resolve_gateway;
use crate::pipeline::render::{rasterize, PopplerRasterizer, Rasterizer};
use crate::pipeline::{classify, input, pages, plan, RunContext};
use crate::pricing::TokenUsage;
use crate::progress::{CompleteEvent, NoopProgressSink, ProgressSink};
use crate::row::ProductRow;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

/// Counts and timings for one document run.
#[derive(Debug, Clone, Serialize)]
pub struct ExtractionStats {
    /// Pages in the rasterized document.
    pub total_pages: usize,
    /// Pages that received a classification.
    pub classified_pages: usize,
    /// Pages the plan (after fallbacks) selected for extraction.
    pub extraction_pages: usize,
    /// Rows in the final output.
    pub total_rows: usize,
    pub render_duration_ms: u64,
    pub total_duration_ms: u64,
}

/// Result of one document run.
#[derive(Debug, Clone, Serialize)]
pub struct ExtractionOutput {
    pub rows: Vec<ProductRow>,
    /// Global brand name derived from classification; `""` when none seen.
    pub brand_name: String,
    pub usage: TokenUsage,
    pub stats: ExtractionStats,
}

/// Extract structured product rows from a PDF catalog (path or URL).
///
/// # Errors
///
/// Returns `Err` only for structural failures: unreadable input, a document
/// with zero pages, an unconfigured provider, an unreadable page image, or
/// a transport-level gateway failure. Transient generation failures degrade
/// the affected batch to "no data" and never abort the run.
pub async fn extract_document(
    input_str: impl AsRef<str>,
    config: &ExtractionConfig,
) -> Result<ExtractionOutput, ExtractError> {
    let sink: Arc<dyn ProgressSink> = config
        .progress
        .clone()
        .unwrap_or_else(|| Arc::new(NoopProgressSink));

    let result = run_extraction(input_str.as_ref(), config, sink.as_ref()).await;
    if let Err(ref e) = result {
        warn!(error = %e, "extraction run failed");
        sink.on_error(&e.to_string());
    }
    result
}

async fn run_extraction(
    input_str: &str,
    config: &ExtractionConfig,
    sink: &dyn ProgressSink,
) -> Result<ExtractionOutput, ExtractError> {
    let total_start = Instant::now();
    info!("starting catalog extraction: {input_str}");

    // ── Step 1: Resolve input ────────────────────────────────────────────
    let resolved = input::resolve_input(input_str, config.download_timeout_secs).await?;

    // ── Step 2: Resolve seams ────────────────────────────────────────────
    let gateway = resolve_gateway(config)?;
    let rasterizer: Arc<dyn Rasterizer> = config
        .rasterizer
        .clone()
        .unwrap_or_else(|| Arc::new(PopplerRasterizer));

    // ── Step 3: Rasterize ────────────────────────────────────────────────
    sink.on_log("rendering catalog pages");
    let render_start = Instant::now();
    let document = rasterize(rasterizer.as_ref(), resolved.path(), config.render_dpi).await?;
    let render_duration_ms = render_start.elapsed().as_millis() as u64;

    if document.images().is_empty() {
        return Err(ExtractError::EmptyDocument {
            path: resolved.path().to_path_buf(),
        });
    }
    info!(
        pages = document.page_count(),
        render_ms = render_duration_ms,
        "document ready"
    );

    // ── Step 4: Run the model pipeline with per-run accounting ───────────
    let model = config
        .model
        .clone()
        .unwrap_or_else(|| DEFAULT_MODEL.to_string());
    let mut usage = TokenUsage::new();
    let mut ctx = RunContext {
        gateway: gateway.as_ref(),
        sink,
        usage: &mut usage,
        model: &model,
        config,
    };

    sink.on_log("classifying pages");
    let outcome = classify::classify_pages(&mut ctx, document.images()).await?;

    sink.on_log("planning extraction");
    let extraction_plan = plan::plan_extraction(&mut ctx, &outcome.classifications).await?;
    let extraction_pages = pages::extraction_page_set(&extraction_plan, document.images()).len();

    sink.on_log(&format!("extracting {extraction_pages} pages"));
    let rows = pages::extract_rows(
        &mut ctx,
        &extraction_plan,
        &outcome.brand_name,
        document.images(),
    )
    .await?;
    drop(ctx);

    // ── Step 5: Assemble output ──────────────────────────────────────────
    let stats = ExtractionStats {
        total_pages: document.page_count(),
        classified_pages: outcome.classifications.len(),
        extraction_pages,
        total_rows: rows.len(),
        render_duration_ms,
        total_duration_ms: total_start.elapsed().as_millis() as u64,
    };

    sink.on_complete(&CompleteEvent {
        total_pages: stats.total_pages,
        extracted_rows: stats.total_rows,
    });
    info!(
        rows = stats.total_rows,
        pages = stats.total_pages,
        ms = stats.total_duration_ms,
        "extraction complete"
    );

    Ok(ExtractionOutput {
        rows,
        brand_name: outcome.brand_name,
        usage,
        stats,
    })
}
