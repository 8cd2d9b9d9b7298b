//! Page classification: label every page's content type before extraction.
//!
//! Catalogs interleave price tables with covers, indexes, upholstery charts,
//! and pure product photography. Sending every page to the row extractor
//! wastes tokens and invites hallucinated rows from pages that hold no
//! tabular data, so the pipeline first asks the model to label each page.
//!
//! Classification is deliberately lossy: a failed batch contributes zero
//! classifications and the run continues. Partial classification is
//! acceptable because the planner fails closed over whatever arrived.

use crate::error::ExtractError;
use crate::gateway::{ImagePayload, PromptPart};
use crate::pipeline::generate::generate_json;
use crate::pipeline::render::PageImage;
use crate::pipeline::RunContext;
use crate::prompts::{page_marker, PAGE_CLASSIFIER};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Content-type label for one catalog page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PageClass {
    FrontMatter,
    IndexPage,
    CodeImageOnly,
    TechInfoOnly,
    UpholsteryList,
    VariantPriceTable,
    ModularUnitTable,
    CompositionTable,
    SimpleTextList,
    BlankPage,
    /// Also the catch-all for any label the model invents.
    #[default]
    #[serde(other)]
    Unknown,
}

impl PageClass {
    /// All classes, in the order the planner prompt lists its buckets.
    pub const ALL: [PageClass; 11] = [
        PageClass::FrontMatter,
        PageClass::IndexPage,
        PageClass::CodeImageOnly,
        PageClass::TechInfoOnly,
        PageClass::UpholsteryList,
        PageClass::VariantPriceTable,
        PageClass::ModularUnitTable,
        PageClass::CompositionTable,
        PageClass::SimpleTextList,
        PageClass::BlankPage,
        PageClass::Unknown,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PageClass::FrontMatter => "FRONT_MATTER",
            PageClass::IndexPage => "INDEX_PAGE",
            PageClass::CodeImageOnly => "CODE_IMAGE_ONLY",
            PageClass::TechInfoOnly => "TECH_INFO_ONLY",
            PageClass::UpholsteryList => "UPHOLSTERY_LIST",
            PageClass::VariantPriceTable => "VARIANT_PRICE_TABLE",
            PageClass::ModularUnitTable => "MODULAR_UNIT_TABLE",
            PageClass::CompositionTable => "COMPOSITION_TABLE",
            PageClass::SimpleTextList => "SIMPLE_TEXT_LIST",
            PageClass::BlankPage => "BLANK_PAGE",
            PageClass::Unknown => "UNKNOWN",
        }
    }
}

/// Classes that never yield product rows, regardless of what the planner
/// put in their buckets. The page extractor filters these out.
pub const NON_EXTRACTABLE: &[PageClass] = &[
    PageClass::FrontMatter,
    PageClass::IndexPage,
    PageClass::UpholsteryList,
    PageClass::CodeImageOnly,
    PageClass::BlankPage,
    PageClass::Unknown,
];

/// Classification of a single page. Produced once, never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PageClassification {
    pub page_number: u32,
    pub class: PageClass,
    pub has_extractable_data: bool,
    pub confidence: f32,
}

impl Default for PageClassification {
    fn default() -> Self {
        Self {
            page_number: 0,
            class: PageClass::Unknown,
            has_extractable_data: false,
            confidence: 0.0,
        }
    }
}

/// Result of classifying a whole document.
#[derive(Debug, Clone, Default)]
pub struct ClassificationOutcome {
    /// Sorted ascending by `page_number`.
    pub classifications: Vec<PageClassification>,
    /// First non-empty brand name seen across batches; `""` when none.
    pub brand_name: String,
}

/// Wire shape of one classifier response.
#[derive(Debug, Deserialize)]
struct ClassifierBatch {
    #[serde(default)]
    brand_name: String,
    #[serde(default)]
    pages: Vec<PageClassification>,
}

/// Classify every page, in fixed-size batches.
///
/// Each batch call carries the classifier instruction and, per page, a
/// page-number marker followed by the page image. The first non-empty
/// `brand_name` across batches wins and later batches never overwrite it
/// (the brand is on the cover, and the cover is in the first batch).
/// Entries without a page number are dropped as malformed.
pub async fn classify_pages(
    ctx: &mut RunContext<'_>,
    images: &[PageImage],
) -> Result<ClassificationOutcome, ExtractError> {
    let batch_size = ctx.config.classify_batch_size.max(1);
    let attempts = ctx.config.classify_attempts;
    let mut classifications: Vec<PageClassification> = Vec::with_capacity(images.len());
    let mut brand_name = String::new();

    for (batch_index, batch) in images.chunks(batch_size).enumerate() {
        let mut parts = vec![PromptPart::text(PAGE_CLASSIFIER)];
        for image in batch {
            parts.push(PromptPart::text(page_marker(image.page_number)));
            parts.push(PromptPart::Image(
                ImagePayload::from_path(&image.path, image.page_number).await?,
            ));
        }

        let Some(json) = generate_json(ctx, "classify", parts, attempts).await? else {
            warn!(batch_index, "classification batch produced no JSON; skipping");
            ctx.sink.on_log(&format!(
                "classification batch {} produced no output; continuing",
                batch_index + 1
            ));
            continue;
        };

        let batch_result: ClassifierBatch = match serde_json::from_str(&json) {
            Ok(parsed) => parsed,
            Err(err) => {
                warn!(batch_index, %err, "classification batch did not parse; skipping");
                ctx.sink.on_log(&format!(
                    "classification batch {} was malformed; continuing",
                    batch_index + 1
                ));
                continue;
            }
        };

        if brand_name.is_empty() && !batch_result.brand_name.trim().is_empty() {
            brand_name = batch_result.brand_name.trim().to_string();
            info!(brand = %brand_name, "brand name detected");
        }

        let before = batch_result.pages.len();
        let valid = batch_result
            .pages
            .into_iter()
            .filter(|p| p.page_number != 0);
        classifications.extend(valid);
        let kept = classifications.len();
        debug!(batch_index, pages = before, kept, "classification batch done");
    }

    // Batches arrive in order, but the model may list pages within a batch
    // in any order. Stable sort keeps original order for (invalid) ties.
    classifications.sort_by_key(|c| c.page_number);

    Ok(ClassificationOutcome {
        classifications,
        brand_name,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_class_labels_fall_back_to_unknown() {
        let parsed: PageClassification = serde_json::from_str(
            r#"{"page_number": 4, "class": "HOLOGRAM_PAGE", "has_extractable_data": true, "confidence": 0.4}"#,
        )
        .unwrap();
        assert_eq!(parsed.class, PageClass::Unknown);
        assert_eq!(parsed.page_number, 4);
    }

    #[test]
    fn missing_fields_default() {
        let parsed: PageClassification = serde_json::from_str(r#"{"page_number": 2}"#).unwrap();
        assert_eq!(parsed.class, PageClass::Unknown);
        assert!(!parsed.has_extractable_data);
        assert_eq!(parsed.confidence, 0.0);
    }

    #[test]
    fn class_serializes_screaming_snake() {
        let text = serde_json::to_string(&PageClass::VariantPriceTable).unwrap();
        assert_eq!(text, "\"VARIANT_PRICE_TABLE\"");
        assert_eq!(PageClass::VariantPriceTable.as_str(), "VARIANT_PRICE_TABLE");
    }

    #[test]
    fn as_str_round_trips_through_serde() {
        for class in PageClass::ALL {
            let json = format!("\"{}\"", class.as_str());
            let back: PageClass = serde_json::from_str(&json).unwrap();
            assert_eq!(back, class);
        }
    }

    #[test]
    fn non_extractable_set_membership() {
        assert!(NON_EXTRACTABLE.contains(&PageClass::BlankPage));
        assert!(NON_EXTRACTABLE.contains(&PageClass::Unknown));
        assert!(!NON_EXTRACTABLE.contains(&PageClass::VariantPriceTable));
        assert!(!NON_EXTRACTABLE.contains(&PageClass::TechInfoOnly));
    }
}
