//! Dual-source reconciliation: match and diff rows from two independent
//! extraction runs.
//!
//! Two non-deterministic extractors reading the same catalog produce
//! structurally similar but never identical row sets. The engine associates
//! corresponding rows through two composite keys:
//!
//! * **primary**: normalized `product_code` + `variant_code` — the stable
//!   identity when both extractors read the codes;
//! * **fallback**: normalized `page_number` + `product_name` + price — for
//!   rows where one extractor missed the codes.
//!
//! Every row is indexed under its primary key (when non-empty) *and* its
//! prefixed fallback key, so a single row can be reachable twice. That is
//! intentional: either extractor may have populated only the code or only
//! the fallback-identifying fields. The duplicate matches this creates are
//! collapsed at the end by a normalized five-field fingerprint.
//!
//! The engine is pure and does no I/O; it is safe to run in parallel across
//! independent document pairs.

use crate::row::{ProductRow, RowSchema};
use indexmap::{IndexMap, IndexSet};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

/// Absolute tolerance for numeric field comparison.
pub const NUM_TOLERANCE: f64 = 0.01;

static RE_WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());
static RE_NON_NUMERIC: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\d.\-]").unwrap());

// ── Normalizers ──────────────────────────────────────────────────────────

/// Case-fold, collapse whitespace runs, trim.
pub fn normalize_value(v: &str) -> String {
    RE_WHITESPACE
        .replace_all(v, " ")
        .trim()
        .to_lowercase()
}

/// As [`normalize_value`], then strip spaces and thousands separators.
///
/// Deliberately NOT numeric: "100" and "100.0" stay distinct. Prices are
/// compared byte-faithfully after cleanup so a dropped decimal by one
/// extractor is surfaced, not papered over.
pub fn normalize_price(v: &str) -> String {
    normalize_value(v)
        .chars()
        .filter(|c| *c != ' ' && *c != ',')
        .collect()
}

/// As [`normalize_value`], then strip periods ("cm." matches "cm").
pub fn normalize_unit(v: &str) -> String {
    normalize_value(v).chars().filter(|c| *c != '.').collect()
}

/// Parse a numeric field, keeping only digits, `.` and `-`.
/// `None` means "no data" rather than zero.
pub fn normalize_number(v: &str) -> Option<f64> {
    let cleaned = RE_NON_NUMERIC.replace_all(v, "");
    let cleaned = cleaned.trim();
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse::<f64>().ok().filter(|n| n.is_finite())
}

fn number_match(a: &str, b: &str) -> bool {
    match (normalize_number(a), normalize_number(b)) {
        // Two unparsable values are both "no data" and therefore agree.
        (None, None) => true,
        (Some(na), Some(nb)) => (na - nb).abs() <= NUM_TOLERANCE,
        _ => false,
    }
}

fn fuzzy_text_match(a: &str, b: &str) -> bool {
    let na = normalize_value(a);
    let nb = normalize_value(b);

    if na.is_empty() && nb.is_empty() {
        return true;
    }
    if na.is_empty() || nb.is_empty() {
        return false;
    }
    if na == nb {
        return true;
    }
    // Descriptions often differ by elaboration only; substring containment
    // counts as agreement.
    na.contains(&nb) || nb.contains(&na)
}

// ── Comparison schema ────────────────────────────────────────────────────

/// Per-field comparison rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareKind {
    /// Normalized exact string equality.
    Norm,
    /// String equality after price cleanup (NOT numeric).
    Price,
    /// String equality after unit cleanup (periods stripped).
    Unit,
    /// Numeric equality within [`NUM_TOLERANCE`].
    Num,
    /// Equal normalized text or substring containment.
    Fuzzy,
}

/// Full-column schema for the value+unit row layout.
pub const VALUE_UNIT_COMPARE_SCHEMA: &[(&str, CompareKind)] = &[
    ("brand_name", CompareKind::Norm),
    ("product_code", CompareKind::Norm),
    ("product_name", CompareKind::Norm),
    ("product_type", CompareKind::Norm),
    ("description", CompareKind::Fuzzy),
    ("variant_code", CompareKind::Norm),
    ("variant_details", CompareKind::Fuzzy),
    ("upholstery", CompareKind::Norm),
    ("materials", CompareKind::Norm),
    ("height_value", CompareKind::Num),
    ("height_unit", CompareKind::Unit),
    ("length_value", CompareKind::Num),
    ("length_unit", CompareKind::Unit),
    ("breadth_value", CompareKind::Num),
    ("breadth_unit", CompareKind::Unit),
    ("seat_height_value", CompareKind::Num),
    ("seat_height_unit", CompareKind::Unit),
    ("diameter_value", CompareKind::Num),
    ("diameter_unit", CompareKind::Unit),
    ("weight_value", CompareKind::Num),
    ("weight_unit", CompareKind::Unit),
    ("volume_value", CompareKind::Num),
    ("volume_unit", CompareKind::Unit),
    ("currency", CompareKind::Norm),
    ("price", CompareKind::Price),
    ("page_number", CompareKind::Num),
];

/// Full-column schema for the flat centimetre row layout.
pub const FLAT_CM_COMPARE_SCHEMA: &[(&str, CompareKind)] = &[
    ("brand_name", CompareKind::Norm),
    ("product_name", CompareKind::Norm),
    ("furniture_type", CompareKind::Norm),
    ("design", CompareKind::Norm),
    ("product_code", CompareKind::Norm),
    ("system_code", CompareKind::Norm),
    ("length_cm", CompareKind::Num),
    ("breath_cm", CompareKind::Num),
    ("height_cm", CompareKind::Num),
    ("seat_height_cm", CompareKind::Num),
    ("upholstery", CompareKind::Norm),
    ("currency", CompareKind::Norm),
    ("price", CompareKind::Price),
    ("other_material_comments", CompareKind::Fuzzy),
    ("special_feature", CompareKind::Fuzzy),
    ("additional_price", CompareKind::Price),
    ("cbm", CompareKind::Num),
    ("product_weight_kg", CompareKind::Num),
    ("remark", CompareKind::Norm),
    ("initials", CompareKind::Norm),
    ("date", CompareKind::Norm),
    ("page_number", CompareKind::Num),
];

/// The fixed comparator schema for a row layout.
pub fn comparison_schema(schema: RowSchema) -> &'static [(&'static str, CompareKind)] {
    match schema {
        RowSchema::FlatCm => FLAT_CM_COMPARE_SCHEMA,
        RowSchema::ValueUnit => VALUE_UNIT_COMPARE_SCHEMA,
    }
}

// ── Keys ─────────────────────────────────────────────────────────────────

/// Composite primary key; `""` when both components are empty.
pub fn primary_key(row: &ProductRow) -> String {
    let code = normalize_value(row.get("product_code"));
    let variant = normalize_value(row.get("variant_code"));
    if code.is_empty() && variant.is_empty() {
        return String::new();
    }
    format!("{code}__{variant}")
}

/// Composite fallback key; always defined.
pub fn fallback_key(row: &ProductRow) -> String {
    let page = normalize_value(row.get("page_number"));
    let name = normalize_value(row.get("product_name"));
    let price = normalize_price(row.get("price"));
    format!("{page}__{name}__{price}")
}

// ── Full-column comparison ───────────────────────────────────────────────

/// One disagreeing field, with the raw (pre-normalization) values.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldDiff {
    pub field: String,
    pub value_a: String,
    pub value_b: String,
}

/// Outcome of comparing two rows field-by-field.
#[derive(Debug, Clone, Serialize)]
pub struct RowComparison {
    pub ok: bool,
    pub diffs: Vec<FieldDiff>,
}

/// Compare two rows under the fixed schema, collecting every disagreement.
pub fn compare_row_full(a: &ProductRow, b: &ProductRow, schema: RowSchema) -> RowComparison {
    let mut diffs = Vec::new();

    for (field, kind) in comparison_schema(schema) {
        let va = a.get(field);
        let vb = b.get(field);

        let ok = match kind {
            CompareKind::Norm => normalize_value(va) == normalize_value(vb),
            CompareKind::Price => normalize_price(va) == normalize_price(vb),
            CompareKind::Unit => normalize_unit(va) == normalize_unit(vb),
            CompareKind::Num => number_match(va, vb),
            CompareKind::Fuzzy => fuzzy_text_match(va, vb),
        };

        if !ok {
            diffs.push(FieldDiff {
                field: field.to_string(),
                value_a: va.to_string(),
                value_b: vb.to_string(),
            });
        }
    }

    RowComparison {
        ok: diffs.is_empty(),
        diffs,
    }
}

// ── Reconciliation ───────────────────────────────────────────────────────

/// Why a key ended up in the mismatch list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MismatchIssue {
    /// The key exists only in source B.
    MissingInA,
    /// The key exists only in source A.
    MissingInB,
    /// Both sources have the row but at least one field disagrees.
    FullColumnMismatch,
}

/// One unmatched or disagreeing key.
#[derive(Debug, Clone, Serialize)]
pub struct RowMismatch {
    pub key: String,
    pub issue: MismatchIssue,
    pub source_a: Option<ProductRow>,
    pub source_b: Option<ProductRow>,
    pub diffs: Vec<FieldDiff>,
}

/// Output of [`reconcile`].
#[derive(Debug, Clone, Default, Serialize)]
pub struct Reconciliation {
    /// Rows both sources agree on (source A's copy is canonical), deduped.
    pub matched_rows: Vec<ProductRow>,
    pub mismatched_rows: Vec<RowMismatch>,
}

/// Reconcile two row sets under the default (value+unit) schema.
pub fn reconcile(rows_a: &[ProductRow], rows_b: &[ProductRow]) -> Reconciliation {
    reconcile_with_schema(rows_a, rows_b, RowSchema::ValueUnit)
}

/// Reconcile two row sets under an explicit row schema.
pub fn reconcile_with_schema(
    rows_a: &[ProductRow],
    rows_b: &[ProductRow],
    schema: RowSchema,
) -> Reconciliation {
    let map_a = index_rows(rows_a);
    let map_b = index_rows(rows_b);

    // Union of keys, in first-seen order: all of A's, then B's novel ones.
    let mut all_keys: IndexSet<&String> = map_a.keys().collect();
    all_keys.extend(map_b.keys());

    let mut matched: Vec<ProductRow> = Vec::new();
    let mut mismatched: Vec<RowMismatch> = Vec::new();

    for key in all_keys {
        let row_a = map_a.get(key);
        let row_b = map_b.get(key);

        match (row_a, row_b) {
            (Some(a), Some(b)) => {
                let result = compare_row_full(a, b, schema);
                if result.ok {
                    matched.push((*a).clone());
                } else {
                    mismatched.push(RowMismatch {
                        key: key.clone(),
                        issue: MismatchIssue::FullColumnMismatch,
                        source_a: Some((*a).clone()),
                        source_b: Some((*b).clone()),
                        diffs: result.diffs,
                    });
                }
            }
            (Some(a), None) => mismatched.push(RowMismatch {
                key: key.clone(),
                issue: MismatchIssue::MissingInB,
                source_a: Some((*a).clone()),
                source_b: None,
                diffs: Vec::new(),
            }),
            (None, Some(b)) => mismatched.push(RowMismatch {
                key: key.clone(),
                issue: MismatchIssue::MissingInA,
                source_a: None,
                source_b: Some((*b).clone()),
                diffs: Vec::new(),
            }),
            (None, None) => unreachable!("key came from one of the maps"),
        }
    }

    Reconciliation {
        matched_rows: dedup_rows(matched),
        mismatched_rows: mismatched,
    }
}

/// Index rows under primary key (when present) and prefixed fallback key.
/// Later rows with the same key overwrite earlier ones but keep the first
/// insertion position, matching first-seen key ordering downstream.
fn index_rows(rows: &[ProductRow]) -> IndexMap<String, &ProductRow> {
    let mut map: IndexMap<String, &ProductRow> = IndexMap::new();
    for row in rows {
        let primary = primary_key(row);
        if !primary.is_empty() {
            map.insert(primary, row);
        }
        map.insert(format!("fallback__{}", fallback_key(row)), row);
    }
    map
}

/// Collapse rows reachable through both index keys: first occurrence wins,
/// encounter order preserved.
fn dedup_rows(rows: Vec<ProductRow>) -> Vec<ProductRow> {
    let mut seen: IndexSet<String> = IndexSet::new();
    let mut out = Vec::with_capacity(rows.len());
    for row in rows {
        let fingerprint = format!(
            "{}|{}|{}|{}|{}",
            normalize_value(row.get("product_code")),
            normalize_value(row.get("variant_code")),
            normalize_value(row.get("product_name")),
            normalize_price(row.get("price")),
            normalize_value(row.get("page_number")),
        );
        if seen.insert(fingerprint) {
            out.push(row);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(pairs: &[(&str, &str)]) -> ProductRow {
        ProductRow::from_pairs(RowSchema::ValueUnit, pairs)
    }

    // ── Normalizers ──────────────────────────────────────────────────────

    #[test]
    fn normalize_value_folds_case_and_whitespace() {
        assert_eq!(normalize_value("  Sofa   GRANDE \t"), "sofa grande");
        assert_eq!(normalize_value(""), "");
    }

    #[test]
    fn normalize_price_strips_spaces_and_commas() {
        assert_eq!(normalize_price("1, 250"), "1250");
        assert_eq!(normalize_price("2 450"), "2450");
    }

    #[test]
    fn normalize_unit_strips_periods() {
        assert_eq!(normalize_unit("cm."), "cm");
        assert_eq!(normalize_unit("CM"), "cm");
    }

    #[test]
    fn normalize_number_extracts_digits() {
        assert_eq!(normalize_number("≈ 75 cm"), Some(75.0));
        assert_eq!(normalize_number("75,5"), Some(755.0)); // comma is stripped, not a decimal
        assert_eq!(normalize_number("n/a"), None);
        assert_eq!(normalize_number(""), None);
    }

    // ── Comparators ──────────────────────────────────────────────────────

    #[test]
    fn num_agrees_within_tolerance_only() {
        assert!(number_match("75.00", "75.005"));
        assert!(!number_match("75.00", "75.02"));
        assert!(number_match("n/a", "")); // both no-data
        assert!(!number_match("75", "")); // one-sided data
    }

    #[test]
    fn fuzzy_accepts_substrings() {
        assert!(fuzzy_text_match("3-seater sofa", "Sofa"));
        assert!(fuzzy_text_match("", ""));
        assert!(!fuzzy_text_match("sofa", ""));
        assert!(!fuzzy_text_match("sofa", "armchair"));
    }

    #[test]
    fn price_comparison_is_string_faithful() {
        // Documented edge: equal prices in different decimal representations
        // are reported as a mismatch. The price comparator is byte-faithful
        // after cleanup, not numeric.
        let a = row(&[("product_code", "X1"), ("price", "100")]);
        let b = row(&[("product_code", "X1"), ("price", "100.0")]);
        let result = compare_row_full(&a, &b, RowSchema::ValueUnit);
        assert!(!result.ok);
        assert_eq!(result.diffs.len(), 1);
        assert_eq!(result.diffs[0].field, "price");
        assert_eq!(result.diffs[0].value_a, "100");
        assert_eq!(result.diffs[0].value_b, "100.0");
    }

    #[test]
    fn case_folded_codes_and_cleaned_prices_match() {
        let a = row(&[("product_code", "X1"), ("price", "1,250")]);
        let b = row(&[("product_code", "x1"), ("price", "1 250")]);
        let result = compare_row_full(&a, &b, RowSchema::ValueUnit);
        assert!(result.ok, "diffs: {:?}", result.diffs);
    }

    #[test]
    fn num_field_beyond_tolerance_is_named_in_diffs() {
        let a = row(&[("product_code", "X1"), ("height_value", "75.00")]);
        let b = row(&[("product_code", "X1"), ("height_value", "75.02")]);
        let result = compare_row_full(&a, &b, RowSchema::ValueUnit);
        assert!(!result.ok);
        assert!(result.diffs.iter().any(|d| d.field == "height_value"));
    }

    // ── Keys ─────────────────────────────────────────────────────────────

    #[test]
    fn primary_key_empty_when_both_components_empty() {
        assert_eq!(primary_key(&row(&[])), "");
        assert_eq!(primary_key(&row(&[("product_code", "A1")])), "a1__");
        assert_eq!(
            primary_key(&row(&[("product_code", "A1"), ("variant_code", "V2")])),
            "a1__v2"
        );
    }

    #[test]
    fn fallback_key_is_always_defined() {
        let r = row(&[
            ("page_number", "3"),
            ("product_name", "Sofa Grande"),
            ("price", "1,200"),
        ]);
        assert_eq!(fallback_key(&r), "3__sofa grande__1200");
        assert_eq!(fallback_key(&row(&[])), "____");
    }

    // ── Reconciliation ───────────────────────────────────────────────────

    #[test]
    fn identical_rows_match_once() {
        let a = vec![row(&[
            ("product_code", "X1"),
            ("product_name", "Sofa"),
            ("price", "100"),
            ("page_number", "2"),
        ])];
        let b = vec![row(&[
            ("product_code", "x1"),
            ("product_name", "sofa"),
            ("price", "100"),
            ("page_number", "2"),
        ])];
        let result = reconcile(&a, &b);
        // The row matches via both primary and fallback keys; dedup must
        // collapse it to exactly one matched row.
        assert_eq!(result.matched_rows.len(), 1);
        assert!(result.mismatched_rows.is_empty());
        // Source A's copy is the canonical representative.
        assert_eq!(result.matched_rows[0].get("product_code"), "X1");
    }

    #[test]
    fn row_only_in_a_is_missing_in_b() {
        let a = vec![row(&[("product_code", "X9"), ("product_name", "Lamp")])];
        let result = reconcile(&a, &[]);
        assert!(result.matched_rows.is_empty());
        // One mismatch per index key the row is reachable under.
        assert!(!result.mismatched_rows.is_empty());
        assert!(result
            .mismatched_rows
            .iter()
            .all(|m| m.issue == MismatchIssue::MissingInB));
        assert!(result.mismatched_rows.iter().all(|m| m.source_b.is_none()));
    }

    #[test]
    fn row_only_in_b_is_missing_in_a() {
        let b = vec![row(&[("product_code", "Z3")])];
        let result = reconcile(&[], &b);
        assert!(result
            .mismatched_rows
            .iter()
            .all(|m| m.issue == MismatchIssue::MissingInA));
    }

    #[test]
    fn disagreeing_rows_carry_field_diffs() {
        let a = vec![row(&[("product_code", "X1"), ("currency", "EURO")])];
        let b = vec![row(&[("product_code", "X1"), ("currency", "USD")])];
        let result = reconcile(&a, &b);
        let full_mismatch = result
            .mismatched_rows
            .iter()
            .find(|m| m.issue == MismatchIssue::FullColumnMismatch)
            .expect("primary key collides, fields differ");
        assert!(full_mismatch.diffs.iter().any(|d| d.field == "currency"));
    }

    #[test]
    fn code_only_row_meets_fallback_only_row() {
        // A read the code but not the name; B read the name but not the code.
        // Neither key associates them, so both sides report missing rows.
        let a = vec![row(&[("product_code", "K7"), ("page_number", "4")])];
        let b = vec![row(&[
            ("product_name", "Console"),
            ("page_number", "4"),
            ("price", "900"),
        ])];
        let result = reconcile(&a, &b);
        assert!(result.matched_rows.is_empty());
        let issues: Vec<_> = result.mismatched_rows.iter().map(|m| m.issue).collect();
        assert!(issues.contains(&MismatchIssue::MissingInA));
        assert!(issues.contains(&MismatchIssue::MissingInB));
    }

    #[test]
    fn matched_set_preserves_encounter_order() {
        let a = vec![
            row(&[("product_code", "A"), ("product_name", "First")]),
            row(&[("product_code", "B"), ("product_name", "Second")]),
        ];
        let result = reconcile(&a, &a.clone());
        let names: Vec<&str> = result
            .matched_rows
            .iter()
            .map(|r| r.get("product_name"))
            .collect();
        assert_eq!(names, vec!["First", "Second"]);
    }

    #[test]
    fn flat_schema_comparator_covers_cm_fields() {
        let a = ProductRow::from_pairs(
            RowSchema::FlatCm,
            &[("product_code", "C1"), ("length_cm", "168")],
        );
        let b = ProductRow::from_pairs(
            RowSchema::FlatCm,
            &[("product_code", "C1"), ("length_cm", "168 cm")],
        );
        // num comparison strips the unit text from the flat cm field.
        let result = compare_row_full(&a, &b, RowSchema::FlatCm);
        assert!(result.ok, "diffs: {:?}", result.diffs);
    }
}
