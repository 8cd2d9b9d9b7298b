//! JSON span recovery from raw model output.
//!
//! Models asked for "ONLY JSON" still wrap their answer in markdown fences,
//! preface it with prose, or append a sign-off. [`extract_json`] recovers
//! the largest plausible JSON span: strip fence markers, take everything
//! from the earliest opening bracket to the latest closing bracket.
//!
//! This is a heuristic span extractor, not a parser. It never validates
//! bracket balance; `serde_json` downstream is the correctness check. When
//! no plausible span exists the answer is `None` — a structural rejection,
//! not a retry trigger (the retry layer only repairs text that at least
//! *looked* like JSON).

use once_cell::sync::Lazy;
use regex::Regex;

static RE_FENCES: Lazy<Regex> = Lazy::new(|| Regex::new(r"```(?:json)?").unwrap());

/// Recover the largest plausible JSON substring from raw model output.
///
/// Returns `None` when the text contains no opening bracket, or when the
/// last closing bracket sits at or before the first opening bracket.
pub fn extract_json(raw: &str) -> Option<String> {
    let cleaned = RE_FENCES.replace_all(raw, "");
    let cleaned: &str = cleaned.as_ref();

    let open = match (cleaned.find('{'), cleaned.find('[')) {
        (Some(a), Some(b)) => a.min(b),
        (Some(a), None) => a,
        (None, Some(b)) => b,
        (None, None) => return None,
    };
    let close = match (cleaned.rfind('}'), cleaned.rfind(']')) {
        (Some(a), Some(b)) => a.max(b),
        (Some(a), None) => a,
        (None, Some(b)) => b,
        (None, None) => return None,
    };

    if close <= open {
        return None;
    }

    Some(cleaned[open..=close].trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fenced_array_with_prose_yields_exact_array() {
        let raw = "Sure! Here is the data you asked for:\n```json\n[{\"a\": 1}]\n```\nLet me know if you need more.";
        assert_eq!(extract_json(raw).as_deref(), Some("[{\"a\": 1}]"));
    }

    #[test]
    fn bare_fences_are_stripped() {
        let raw = "```\n{\"ok\": true}\n```";
        assert_eq!(extract_json(raw).as_deref(), Some("{\"ok\": true}"));
    }

    #[test]
    fn no_brackets_is_none() {
        assert_eq!(extract_json("the page was blank, nothing to extract"), None);
        assert_eq!(extract_json(""), None);
    }

    #[test]
    fn close_before_open_is_none() {
        assert_eq!(extract_json("] oops ["), None);
        assert_eq!(extract_json("} {"), None);
    }

    #[test]
    fn close_equal_open_is_impossible_but_adjacent_is_kept() {
        // "[]" spans two characters; open < close, so it survives.
        assert_eq!(extract_json("rows: []").as_deref(), Some("[]"));
    }

    #[test]
    fn earliest_open_latest_close_win() {
        let raw = "x {\"a\": [1, 2]} trailing ] noise";
        // The span runs from the first '{' to the LAST ']', unbalanced and
        // all; the downstream parse is what rejects it.
        assert_eq!(extract_json(raw).as_deref(), Some("{\"a\": [1, 2]} trailing ]"));
    }

    #[test]
    fn object_inside_prose() {
        let raw = "result = {\"brand_name\": \"Acme\"}";
        assert_eq!(
            extract_json(raw).as_deref(),
            Some("{\"brand_name\": \"Acme\"}")
        );
    }
}
