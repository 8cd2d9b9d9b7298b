//! Extraction planning: decide which pages get extracted, and fail closed.
//!
//! The planner sends the full classification list to the model and trusts
//! the returned plan verbatim; the "don't extract front-matter/index/blank"
//! rules live in the prompt, and this component does not re-validate bucket
//! membership (the page extractor applies its own non-extractable filter as
//! the second line of defence).
//!
//! When planning fails — no output, or output that never parses — the
//! fallback is deterministic and **fail-closed**: every classified page goes
//! into `skip_pages` and every bucket is empty. Ambiguous classification
//! must never cause speculative extraction of unclassified pages. (The page
//! extractor's own fallback points the other way; see
//! [`crate::pipeline::pages`].)

use crate::error::ExtractError;
use crate::gateway::PromptPart;
use crate::pipeline::classify::{PageClass, PageClassification};
use crate::pipeline::generate::generate_json;
use crate::pipeline::RunContext;
use crate::prompts::EXTRACTION_PLANNER;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::{info, warn};

/// The page inclusion/exclusion plan for one document.
///
/// Every page number referenced should appear at most once across the
/// `extract` buckets; duplicates are a planner defect, assumed not enforced.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionPlan {
    pub template_family: String,
    pub skip_pages: BTreeSet<u32>,
    /// Pages to extract, bucketed by page class, in bucket order.
    pub extract: IndexMap<PageClass, Vec<u32>>,
    pub notes: String,
}

/// Deterministic fail-closed plan: skip everything that was classified.
pub fn fallback_plan(classifications: &[PageClassification]) -> ExtractionPlan {
    let skip_pages: BTreeSet<u32> = classifications.iter().map(|c| c.page_number).collect();
    let extract: IndexMap<PageClass, Vec<u32>> =
        PageClass::ALL.iter().map(|c| (*c, Vec::new())).collect();

    ExtractionPlan {
        template_family: "AUTO".to_string(),
        skip_pages,
        extract,
        notes: "Planner output unavailable; failing closed: all classified pages skipped."
            .to_string(),
    }
}

/// Derive the extraction plan from the classifications.
///
/// One model call; on any failure the fail-closed [`fallback_plan`] is
/// returned instead of an error.
pub async fn plan_extraction(
    ctx: &mut RunContext<'_>,
    classifications: &[PageClassification],
) -> Result<ExtractionPlan, ExtractError> {
    let listing = serde_json::to_string(classifications)
        .map_err(|e| ExtractError::Internal(format!("classification serialization: {e}")))?;

    let parts = vec![
        PromptPart::text(EXTRACTION_PLANNER),
        PromptPart::Text(listing),
    ];
    let attempts = ctx.config.plan_attempts;

    match generate_json(ctx, "plan", parts, attempts).await? {
        Some(json) => match serde_json::from_str::<ExtractionPlan>(&json) {
            Ok(plan) => {
                info!(
                    skip = plan.skip_pages.len(),
                    buckets = plan.extract.len(),
                    "extraction plan received"
                );
                Ok(plan)
            }
            Err(err) => {
                warn!(%err, "extraction plan did not parse; failing closed");
                ctx.sink
                    .on_log("extraction plan was malformed; skipping all classified pages");
                Ok(fallback_plan(classifications))
            }
        },
        None => {
            warn!("planner produced no output; failing closed");
            ctx.sink
                .on_log("planner produced no output; skipping all classified pages");
            Ok(fallback_plan(classifications))
        }
    }
}
