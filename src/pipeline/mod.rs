//! Pipeline stages for catalog extraction.
//!
//! Each submodule implements exactly one transformation step. Keeping the
//! stages separate makes each independently testable against the mock
//! gateway and lets us swap implementations (e.g. a different rasterizer
//! backend) without touching the others.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ render ──▶ classify ──▶ plan ──▶ pages
//! (URL/path) (pdftoppm) (label pages) (pick pages) (rows)
//!                └────────── json + generate ──────────┘
//!                      (JSON recovery & self-repair)
//! ```
//!
//! 1. [`input`]    — canonicalise the user-supplied path or URL to a local PDF
//! 2. [`render`]   — rasterise every page to PNG via the external rasterizer
//! 3. [`classify`] — label each page's content type and extractability
//! 4. [`plan`]     — derive the page inclusion/exclusion plan (fail-closed)
//! 5. [`pages`]    — extract structured rows from planned pages (fail-open)
//!
//! [`json`] and [`generate`] are the shared JSON-recovery substrate used by
//! stages 3–5: every model call goes through the bounded-attempt generator,
//! which feeds malformed output back to the model for self-repair.
//!
//! Batches are processed **sequentially**: this bounds concurrent external
//! API load and keeps the progress narrative strictly page-ascending.

use crate::config::ExtractionConfig;
use crate::gateway::ModelGateway;
use crate::pricing::TokenUsage;
use crate::progress::ProgressSink;

pub mod classify;
pub mod generate;
pub mod input;
pub mod json;
pub mod pages;
pub mod plan;
pub mod render;

/// Shared per-run state threaded through the pipeline stages.
///
/// Owns nothing: it borrows the run's accounting context and seams so the
/// orchestrator keeps control of their lifetimes. A fresh [`TokenUsage`] per
/// run (rather than ambient global state) is what makes concurrent document
/// runs safe.
pub struct RunContext<'a> {
    pub gateway: &'a dyn ModelGateway,
    pub sink: &'a dyn ProgressSink,
    pub usage: &'a mut TokenUsage,
    /// Resolved model identifier; also the accounting key.
    pub model: &'a str,
    pub config: &'a ExtractionConfig,
}
