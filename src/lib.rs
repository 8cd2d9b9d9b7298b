//! # catalog2rows
//!
//! Extract structured product rows from scanned PDF catalogs using Vision
//! Language Models (VLMs), and reconcile the output of two independent
//! extraction runs.
//!
//! ## Why this crate?
//!
//! Furniture and lighting catalogs are hostile to classical table
//! extraction: price matrices, modular-unit grids, and composition tables
//! share pages with covers, indexes, and upholstery charts, and most of the
//! content is effectively an image. This crate rasterises each page and lets
//! a VLM read it as a human would — but never trusts a single model answer.
//! Pages are classified before extraction, the page plan fails closed,
//! malformed JSON gets a bounded self-repair loop, and a second extraction
//! run can be reconciled field-by-field against the first.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF
//!  │
//!  ├─ 1. Input     resolve local file or download from URL
//!  ├─ 2. Render    rasterise pages via pdftoppm (external collaborator)
//!  ├─ 3. Classify  label each page's content type + extractability
//!  ├─ 4. Plan      page inclusion/exclusion plan (fail-closed fallback)
//!  ├─ 5. Extract   per-page structured rows (fail-open fallback)
//!  └─ 6. Output    normalized ProductRows + token/cost accounting
//!
//! dual-source mode: run twice, then reconcile(rows_a, rows_b)
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use catalog2rows::{extract_document, ExtractionConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Provider auto-detected from GEMINI_API_KEY / OPENAI_API_KEY / ...
//!     let config = ExtractionConfig::default();
//!     let output = extract_document("catalog.pdf", &config).await?;
//!     println!("{} rows from {} pages", output.rows.len(), output.stats.total_pages);
//!     if let Some(cost) = output.usage.overall.cost {
//!         eprintln!("cost: ${:.4} (₹{:.2})", cost.usd, cost.inr);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Dual-source reconciliation
//!
//! ```rust,no_run
//! use catalog2rows::{extract_document, reconcile, ExtractionConfig};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let gemini = ExtractionConfig::builder().provider_name("gemini").build()?;
//! let openai = ExtractionConfig::builder().provider_name("openai").build()?;
//!
//! let run_a = extract_document("catalog.pdf", &gemini).await?;
//! let run_b = extract_document("catalog.pdf", &openai).await?;
//!
//! let result = reconcile(&run_a.rows, &run_b.rows);
//! println!(
//!     "{} matched, {} mismatched",
//!     result.matched_rows.len(),
//!     result.mismatched_rows.len()
//! );
//! # Ok(())
//! # }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod extract;
pub mod gateway;
pub mod pipeline;
pub mod pricing;
pub mod progress;
pub mod prompts;
pub mod reconcile;
pub mod row;
pub mod testing;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ExtractionConfig, ExtractionConfigBuilder, DEFAULT_MODEL};
pub use error::ExtractError;
pub use extract::{extract_document, ExtractionOutput, ExtractionStats};
pub use gateway::{
    resolve_gateway, GenerationResponse, ImagePayload, LlmGateway, ModelGateway, PromptPart,
    UsageMetadata,
};
pub use pipeline::classify::{
    ClassificationOutcome, PageClass, PageClassification, NON_EXTRACTABLE,
};
pub use pipeline::plan::ExtractionPlan;
pub use pipeline::render::{PageImage, PopplerRasterizer, RasterizedDocument, Rasterizer};
pub use pricing::{lookup_pricing, CostBreakdown, ModelPricing, TokenUsage, UsageTotals};
pub use progress::{
    CompleteEvent, ModelCallEvent, NoopProgressSink, ProgressSink, SharedProgressSink,
};
pub use reconcile::{
    reconcile, reconcile_with_schema, CompareKind, FieldDiff, MismatchIssue, Reconciliation,
    RowComparison, RowMismatch,
};
pub use row::{ProductRow, RowSchema};
