//! Schema-validated decoding of provider output.
//!
//! Providers wrap JSON in code fences or surround it with prose, so the
//! outermost `{...}` span is extracted before parsing. The decode is
//! strict on the top-level fields; individual inline suggestions are
//! normalized leniently, dropping entries that lack a path, a body or a
//! positive integer line without discarding the whole result.

use serde::Deserialize;

use solvebot_core::{Error, ReviewResult, Suggestion};

#[derive(Debug, Deserialize)]
struct RawReview {
    summary_markdown: String,
    time_complexity: String,
    space_complexity: String,
    answer_code: String,
    #[serde(default)]
    inline_suggestions: Vec<serde_json::Value>,
}

/// Decode raw provider text into a [`ReviewResult`].
pub fn decode_review(raw: &str) -> Result<ReviewResult, Error> {
    let span = extract_json(raw)
        .ok_or_else(|| Error::Decode("no JSON object in provider output".into()))?;

    let parsed: RawReview =
        serde_json::from_str(span).map_err(|e| Error::Decode(e.to_string()))?;

    Ok(ReviewResult {
        summary_markdown: parsed.summary_markdown,
        time_complexity: parsed.time_complexity,
        space_complexity: parsed.space_complexity,
        answer_code: parsed.answer_code,
        inline_suggestions: normalize_suggestions(&parsed.inline_suggestions),
    })
}

/// Decode the answer-code-only follow-up response.
pub fn decode_answer_code(raw: &str) -> Option<String> {
    let span = extract_json(raw)?;
    let value: serde_json::Value = serde_json::from_str(span).ok()?;
    value["answer_code"].as_str().map(String::from)
}

/// Extract the outermost `{...}` span, tolerating code fences and
/// leading/trailing prose.
fn extract_json(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    if end < start {
        return None;
    }
    Some(&raw[start..=end])
}

fn normalize_suggestions(entries: &[serde_json::Value]) -> Vec<Suggestion> {
    entries
        .iter()
        .filter_map(|entry| {
            let path = entry["path"].as_str()?.trim();
            let body = entry["body"].as_str()?.trim();
            let line = entry["line"].as_u64()?;
            if path.is_empty() || body.is_empty() || line == 0 || line > u32::MAX as u64 {
                return None;
            }
            Some(Suggestion {
                path: path.to_string(),
                line: line as u32,
                body: body.to_string(),
            })
        })
        .collect()
}
