//! Page extraction: turn planned pages into normalized product rows.
//!
//! The extraction page set is derived from the plan with a hard filter
//! (classes in [`NON_EXTRACTABLE`] never extract, whatever the planner said)
//! and a **fail-open** fallback: when the plan yields no candidate pages at
//! all, every page in the document is extracted. This deliberately points
//! the opposite way from the planner's fail-closed fallback — an absent
//! *plan* must not extract unvetted pages, but an empty *page set* from a
//! present plan means the planning signal was useless, and over-extraction
//! beats returning nothing. Both fallbacks are load-bearing.
//!
//! Model output per batch is tolerated in three shapes (a bare row array,
//! an envelope object wrapping the array, a single row object); anything
//! else is discarded. Every surviving row is normalized to the configured
//! schema, gets the classifier's brand when its own is empty, and has its
//! page number force-set from the batch (model-reported page numbers are
//! not trusted).

use crate::error::ExtractError;
use crate::gateway::{ImagePayload, PromptPart};
use crate::pipeline::classify::NON_EXTRACTABLE;
use crate::pipeline::generate::generate_json;
use crate::pipeline::plan::ExtractionPlan;
use crate::pipeline::render::PageImage;
use crate::pipeline::RunContext;
use crate::prompts::page_marker;
use crate::row::ProductRow;
use serde_json::Value;
use std::collections::{BTreeSet, HashMap};
use tracing::{debug, info, warn};

/// Compute the set of pages to extract, ascending.
///
/// Union of the plan's extractable buckets, minus `skip_pages`; empty
/// result falls open to all document pages.
pub fn extraction_page_set(plan: &ExtractionPlan, images: &[PageImage]) -> BTreeSet<u32> {
    let mut pages: BTreeSet<u32> = plan
        .extract
        .iter()
        .filter(|(class, _)| !NON_EXTRACTABLE.contains(class))
        .flat_map(|(_, numbers)| numbers.iter().copied())
        .collect();

    for skip in &plan.skip_pages {
        pages.remove(skip);
    }

    if pages.is_empty() {
        info!("plan yielded no extractable pages; falling open to all pages");
        return images.iter().map(|i| i.page_number).collect();
    }
    pages
}

/// The three tolerated shapes of one extraction response.
///
/// Disambiguation is ordered: a bare array wins; otherwise the first
/// array-valued property of an envelope object; otherwise the object itself
/// is a single row; any other shape is discarded.
enum RowPayload {
    Rows(Vec<Value>),
    Envelope(Vec<Value>),
    Single(Value),
}

impl RowPayload {
    fn from_value(value: Value) -> Option<RowPayload> {
        match value {
            Value::Array(rows) => Some(RowPayload::Rows(rows)),
            Value::Object(map) => {
                for candidate in map.values() {
                    if let Value::Array(rows) = candidate {
                        return Some(RowPayload::Envelope(rows.clone()));
                    }
                }
                Some(RowPayload::Single(Value::Object(map)))
            }
            _ => None,
        }
    }

    fn into_rows(self) -> Vec<Value> {
        match self {
            RowPayload::Rows(rows) | RowPayload::Envelope(rows) => rows,
            RowPayload::Single(row) => vec![row],
        }
    }
}

/// Extract product rows from every planned page, in ascending page order.
pub async fn extract_rows(
    ctx: &mut RunContext<'_>,
    plan: &ExtractionPlan,
    brand_name: &str,
    images: &[PageImage],
) -> Result<Vec<ProductRow>, ExtractError> {
    let pages: Vec<u32> = extraction_page_set(plan, images).into_iter().collect();
    let by_number: HashMap<u32, &PageImage> =
        images.iter().map(|i| (i.page_number, i)).collect();

    let schema = ctx.config.row_schema;
    let prompt = schema.extractor_prompt();
    let batch_size = ctx.config.extract_batch_size.max(1);
    let attempts = ctx.config.extract_attempts;
    let mut rows: Vec<ProductRow> = Vec::new();

    for batch in pages.chunks(batch_size) {
        let mut parts = vec![PromptPart::text(prompt)];
        let mut batch_pages: Vec<u32> = Vec::with_capacity(batch.len());
        for &page in batch {
            let Some(image) = by_number.get(&page) else {
                // The planner can reference pages the document doesn't have.
                warn!(page, "planned page has no rendered image; skipping");
                continue;
            };
            parts.push(PromptPart::text(page_marker(page)));
            parts.push(PromptPart::Image(
                ImagePayload::from_path(&image.path, page).await?,
            ));
            batch_pages.push(page);
        }
        let Some(&first_page) = batch_pages.first() else {
            continue;
        };

        let Some(json) = generate_json(ctx, "extract", parts, attempts).await? else {
            ctx.sink
                .on_log(&format!("page {first_page}: extraction produced no output"));
            continue;
        };

        let value: Value = match serde_json::from_str(&json) {
            Ok(v) => v,
            Err(err) => {
                warn!(page = first_page, %err, "extraction JSON re-parse failed; skipping batch");
                continue;
            }
        };

        let Some(payload) = RowPayload::from_value(value) else {
            debug!(page = first_page, "extraction output was a bare scalar; discarding");
            continue;
        };

        let mut batch_rows = 0usize;
        for raw in payload.into_rows() {
            if !raw.is_object() {
                debug!(page = first_page, "skipping non-object row entry");
                continue;
            }
            let mut row = ProductRow::from_model_value(&raw, schema);
            if row.get("brand_name").is_empty() {
                row.set("brand_name", brand_name);
            }
            // Models copy page numbers from printed folios, which rarely
            // match the PDF page index; the batch is the source of truth.
            row.set("page_number", first_page.to_string());
            rows.push(row);
            batch_rows += 1;
        }
        debug!(page = first_page, rows = batch_rows, "extraction batch done");
    }

    info!(rows = rows.len(), "page extraction complete");
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::classify::PageClass;
    use serde_json::json;
    use std::path::PathBuf;

    fn images(n: u32) -> Vec<PageImage> {
        (1..=n)
            .map(|page_number| PageImage {
                page_number,
                path: PathBuf::from(format!("/tmp/page-{page_number:02}.png")),
            })
            .collect()
    }

    fn plan_with(buckets: &[(PageClass, &[u32])], skip: &[u32]) -> ExtractionPlan {
        ExtractionPlan {
            template_family: "AUTO".into(),
            skip_pages: skip.iter().copied().collect(),
            extract: buckets
                .iter()
                .map(|(c, pages)| (*c, pages.to_vec()))
                .collect(),
            notes: String::new(),
        }
    }

    #[test]
    fn page_set_unions_extractable_buckets() {
        let plan = plan_with(
            &[
                (PageClass::VariantPriceTable, &[3, 4]),
                (PageClass::ModularUnitTable, &[6]),
            ],
            &[],
        );
        let set = extraction_page_set(&plan, &images(10));
        assert_eq!(set.into_iter().collect::<Vec<_>>(), vec![3, 4, 6]);
    }

    #[test]
    fn page_set_excludes_non_extractable_buckets() {
        let plan = plan_with(
            &[
                (PageClass::VariantPriceTable, &[3]),
                (PageClass::IndexPage, &[2]),
                (PageClass::BlankPage, &[9]),
                (PageClass::Unknown, &[8]),
            ],
            &[],
        );
        let set = extraction_page_set(&plan, &images(10));
        assert_eq!(set.into_iter().collect::<Vec<_>>(), vec![3]);
    }

    #[test]
    fn page_set_subtracts_skip_pages() {
        let plan = plan_with(&[(PageClass::VariantPriceTable, &[3, 4, 5])], &[4]);
        let set = extraction_page_set(&plan, &images(5));
        assert_eq!(set.into_iter().collect::<Vec<_>>(), vec![3, 5]);
    }

    #[test]
    fn empty_plan_falls_open_to_all_pages() {
        let plan = ExtractionPlan::default();
        let set = extraction_page_set(&plan, &images(5));
        assert_eq!(set.into_iter().collect::<Vec<_>>(), vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn fully_skipped_plan_also_falls_open() {
        // Every planned page is also skipped: the net set is empty, which
        // the fail-open treats the same as "no plan signal".
        let plan = plan_with(&[(PageClass::SimpleTextList, &[2])], &[2]);
        let set = extraction_page_set(&plan, &images(3));
        assert_eq!(set.into_iter().collect::<Vec<_>>(), vec![1, 2, 3]);
    }

    #[test]
    fn payload_bare_array() {
        let payload = RowPayload::from_value(json!([{"a": 1}, {"b": 2}])).unwrap();
        assert_eq!(payload.into_rows().len(), 2);
    }

    #[test]
    fn payload_envelope_object_unwraps_first_array() {
        let payload =
            RowPayload::from_value(json!({"comment": "ok", "rows": [{"a": 1}]})).unwrap();
        let rows = payload.into_rows();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0], json!({"a": 1}));
    }

    #[test]
    fn payload_single_object_coerces_to_one_row() {
        let payload = RowPayload::from_value(json!({"product_code": "X"})).unwrap();
        assert_eq!(payload.into_rows().len(), 1);
    }

    #[test]
    fn payload_scalar_is_discarded() {
        assert!(RowPayload::from_value(json!("no rows here")).is_none());
        assert!(RowPayload::from_value(json!(42)).is_none());
        assert!(RowPayload::from_value(json!(null)).is_none());
    }
}
