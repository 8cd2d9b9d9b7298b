//! Model prompts for catalog classification, planning, and extraction.
//!
//! Centralising every prompt here serves two purposes:
//!
//! 1. **Single source of truth**: tweaking a classification rule or a row
//!    schema means editing exactly one place.
//! 2. **Testability**: unit tests inspect prompts directly without spinning
//!    up a real model, so prompt regressions are cheap to catch.
//!
//! The extractor prompts each embed their row schema verbatim; the field
//! lists in [`crate::row`] must stay in sync with them.

/// Classifier instruction: label every page image with a content class and
/// an extractability flag, and report the catalog brand if visible.
pub const PAGE_CLASSIFIER: &str = r#"You are a PAGE CLASSIFIER for furniture/lighting PDF catalogs.
For each page image, return JSON.

Classes:
- FRONT_MATTER
- INDEX_PAGE
- CODE_IMAGE_ONLY
- TECH_INFO_ONLY
- UPHOLSTERY_LIST
- VARIANT_PRICE_TABLE
- MODULAR_UNIT_TABLE
- COMPOSITION_TABLE
- SIMPLE_TEXT_LIST
- BLANK_PAGE
- UNKNOWN

Rules:
- If the cover page contains a clear catalog brand name, set brand_name. Otherwise brand_name="".
- If the page is a table of contents / index / elenco / indice with many product names and page numbers -> INDEX_PAGE.
- If the page has product codes + a price table -> MODULAR_UNIT_TABLE or VARIANT_PRICE_TABLE or COMPOSITION_TABLE.
- If the page has only product drawings/images with codes/dimensions and NO prices -> CODE_IMAGE_ONLY.
- CODE_IMAGE_ONLY pages must have has_extractable_data=false.
- If the page lists fabric/leather categories -> UPHOLSTERY_LIST.
- If the page is a text-like code/description/price list -> SIMPLE_TEXT_LIST.
- If cover/terms/contact -> FRONT_MATTER.
- If the page is blank -> BLANK_PAGE.
- If not sure -> UNKNOWN.

Return format:
{
  "brand_name": "",
  "pages": [
    { "page_number": 1, "class": "", "has_extractable_data": true, "confidence": 0.0 }
  ]
}

Return ONLY JSON."#;

/// Planner instruction: turn the classification list into a page
/// inclusion/exclusion plan.
pub const EXTRACTION_PLANNER: &str = r#"You are building a JSON Extraction Plan for a PDF catalog from page classifications.

Input: array of {page_number, class, has_extractable_data, confidence}.

Return ONLY a JSON object.

Output format:
{
  "template_family": "AUTO",
  "skip_pages": [],
  "extract": {
    "FRONT_MATTER": [],
    "INDEX_PAGE": [],
    "CODE_IMAGE_ONLY": [],
    "UPHOLSTERY_LIST": [],
    "MODULAR_UNIT_TABLE": [],
    "COMPOSITION_TABLE": [],
    "VARIANT_PRICE_TABLE": [],
    "SIMPLE_TEXT_LIST": [],
    "BLANK_PAGE": [],
    "UNKNOWN": []
  },
  "notes": ""
}

Rules:
- Put pages with has_extractable_data=false into skip_pages.
- DO NOT extract INDEX_PAGE, FRONT_MATTER, BLANK_PAGE, UPHOLSTERY_LIST.
- UNKNOWN pages must be added to skip_pages (do not extract).
- DO NOT extract CODE_IMAGE_ONLY (skip_pages).

Return ONLY JSON."#;

/// Page extractor for the value+unit row schema
/// ([`crate::row::RowSchema::ValueUnit`]).
pub const VALUE_UNIT_EXTRACTOR: &str = r#"You are extracting structured product data from ONE PDF page image.

CRITICAL RULES:
- Extract ONLY what is clearly visible on THIS page.
- DO NOT guess, infer, calculate, or merge across pages.
- DO NOT convert units or currencies.
- Missing values -> empty string.
- ONE product variant = ONE row.
- Never skip a product variant.

ROW SPLIT RULES:
- Never merge multiple product codes in one row.
- If codes appear as "A/B", "A,B", "A or B", or Left/Right (sx/dx), output separate rows (one row per product code).
- Left & Right versions must be 2 rows; variant_details should mention Left/Right if visible.
- If the same code has multiple categories/grades/prices, create multiple rows (one per category/price).

DIMENSION RULES:
- Split numeric value and unit into the matching _value and _unit fields.

PRICE RULES:
- Detect currency from symbol/text: USD/EURO/INR/GBP. If not visible, currency="".
- price: digits + optional single decimal point only (no symbols, no commas, no spaces).
- If the visible price contains a decimal point, keep it exactly as shown.

Return STRICT JSON array ONLY:
[
  {
    "brand_name": "",
    "product_code": "",
    "product_name": "",
    "product_type": "",
    "description": "",
    "variant_code": "",
    "variant_details": "",
    "upholstery": "",
    "materials": "",
    "height_value": "",
    "height_unit": "",
    "length_value": "",
    "length_unit": "",
    "breadth_value": "",
    "breadth_unit": "",
    "seat_height_value": "",
    "seat_height_unit": "",
    "diameter_value": "",
    "diameter_unit": "",
    "weight_value": "",
    "weight_unit": "",
    "volume_value": "",
    "volume_unit": "",
    "currency": "",
    "price": "",
    "page_number": 0
  }
]

FINAL CONSTRAINT:
- Never fabricate.
- Never merge rows.
- Output ONLY the JSON array."#;

/// Page extractor for the flat centimetre row schema
/// ([`crate::row::RowSchema::FlatCm`]).
pub const FLAT_CM_EXTRACTOR: &str = r#"You are extracting structured product data from ONE PDF page image.

CRITICAL RULES:
- Extract ONLY what is clearly visible on THIS page.
- DO NOT guess, infer, calculate, or merge across pages.
- Missing values -> empty string.
- ONE product variant = ONE row.
- Extract data strictly page-wise; never merge data across pages.
- Never skip a product variant.

PRODUCT NAME RULES:
- If the product name contains multiple languages separated by "/", keep ONLY the ENGLISH name.
  Example: "Poltrona / Armchair" -> "Armchair"
- If the product name contains dimensions or numbers, REMOVE the size part and keep ONLY the name.
  Example: "Sofa - 168 cm" -> "Sofa"
- REMOVE units (cm, mm, m, inch) ONLY when they appear with numbers.
- If the product name is already clean, KEEP it unchanged.

ROW SPLIT RULES:
- Never merge multiple product codes in one row.
- If codes appear as "A/B", "A,B", "A or B", or Left/Right (sx/dx), output separate rows (one row per product code).
- If the same code has multiple categories/grades/prices, create multiple rows (one per category/price).

NUMERIC RULES:
- length_cm, breath_cm, height_cm, seat_height_cm -> numeric-only strings.

PRICE RULES:
- currency: USD/EURO/INR/GBP. If not visible, currency="".
- price: digits + optional single decimal point only (no symbols, no spaces).
- If the visible price contains a decimal point, keep it exactly as shown.

FORBIDDEN FIELDS (must ALWAYS be empty string):
- design
- system_code
- remark
- initials
- date
Never generate or infer these fields.

Return STRICT JSON array ONLY:
[
  {
    "brand_name": "",
    "product_name": "",
    "furniture_type": "",
    "design": "",
    "product_code": "",
    "system_code": "",
    "length_cm": "",
    "breath_cm": "",
    "height_cm": "",
    "seat_height_cm": "",
    "upholstery": "",
    "currency": "",
    "price": "",
    "other_material_comments": "",
    "special_feature": "",
    "additional_price": "",
    "cbm": "",
    "product_weight_kg": "",
    "remark": "",
    "initials": "",
    "date": ""
  }
]
Return ONLY JSON."#;

/// Instruction prefix for the JSON self-repair attempt.
///
/// The repair call is a pure text-to-text correction: the retry layer sends
/// exactly this instruction plus the previously extracted (invalid) text,
/// discarding the original images and context.
pub const REPAIR_INSTRUCTION: &str = "Fix the following into strict valid JSON. \
Return ONLY the corrected JSON, with no markdown fences and no commentary.";

/// Marker text placed immediately before each page image in a batch prompt.
pub fn page_marker(page_number: u32) -> String {
    format!("PAGE_NUMBER: {page_number}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_marker_format() {
        assert_eq!(page_marker(7), "PAGE_NUMBER: 7");
    }

    #[test]
    fn prompts_demand_json_only() {
        for prompt in [
            PAGE_CLASSIFIER,
            EXTRACTION_PLANNER,
            VALUE_UNIT_EXTRACTOR,
            FLAT_CM_EXTRACTOR,
        ] {
            assert!(prompt.contains("ONLY"), "prompt must demand JSON-only output");
        }
    }

    #[test]
    fn extractor_prompts_embed_key_fields() {
        assert!(VALUE_UNIT_EXTRACTOR.contains("\"variant_code\""));
        assert!(VALUE_UNIT_EXTRACTOR.contains("\"page_number\""));
        assert!(FLAT_CM_EXTRACTOR.contains("\"length_cm\""));
    }
}
