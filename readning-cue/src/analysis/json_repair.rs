//! Cleanup of free-form model output before JSON parsing
//!
//! Chat models wrap JSON in code fences, use typographic quotes, emit raw
//! control characters inside strings and leave trailing commas. Each of those
//! is repaired here; anything still unparseable is an invalid response.

use super::DetectionResponse;
use crate::error::DetectorError;
use once_cell::sync::Lazy;
use regex::Regex;

static CODE_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"```(?:json)?\s*([\s\S]*?)\s*```").unwrap());
static TRAILING_COMMA: Lazy<Regex> = Lazy::new(|| Regex::new(r",\s*([}\]])").unwrap());

/// Repair common defects in model output and return the JSON candidate
pub fn clean_json(raw: &str) -> String {
    let mut text = match CODE_FENCE.captures(raw).and_then(|c| c.get(1)) {
        Some(inner) => inner.as_str().to_string(),
        None => raw.to_string(),
    };

    // Keep only the outermost object when prose surrounds it
    if let (Some(start), Some(end)) = (text.find('{'), text.rfind('}')) {
        if start < end {
            text = text[start..=end].to_string();
        }
    }

    let text: String = text
        .chars()
        .map(|c| match c {
            // Apostrophes, so quoted dialogue cannot end a JSON string
            '\u{201C}' | '\u{201D}' | '\u{201E}' | '\u{201F}' | '\u{2018}' | '\u{2019}' | '\u{201A}'
            | '\u{201B}' => '\'',
            '\t' | '\r' | '\n' => ' ',
            other => other,
        })
        .filter(|c| !c.is_control())
        .collect();

    TRAILING_COMMA
        .replace_all(&text, "$1")
        .replace("```", "")
        .trim()
        .to_string()
}

/// Parse free-form model output into a phase list
pub fn parse_detection(raw: &str) -> Result<DetectionResponse, DetectorError> {
    let cleaned = clean_json(raw);
    if cleaned.is_empty() {
        return Err(DetectorError::InvalidResponse("empty model output".to_string()));
    }

    serde_json::from_str(&cleaned).map_err(|e| {
        DetectorError::InvalidResponse(format!("free-form output did not parse: {}", e))
    })
}
