//! Splitting a provider's raw text into rationale and improved code.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    /// A fenced block; whatever follows the opening fence on its line is the info string.
    static ref CODE_FENCE: Regex = Regex::new(r"(?s)```[^`\n]*\r?\n(.*?)```").unwrap();
}

/// Rationale and code extracted from a response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedSuggestion {
    pub rationale_text: String,
    /// Empty when the response has no recognizable code block.
    pub improved_code: String,
}

/// Parse a raw response.
///
/// The first fenced block is the improved code; everything else is rationale.
/// Without a code block the whole text becomes the rationale.
pub fn parse(raw: &str) -> ParsedSuggestion {
    let Some(caps) = CODE_FENCE.captures(raw) else {
        return ParsedSuggestion {
            rationale_text: raw.trim().to_string(),
            improved_code: String::new(),
        };
    };

    let (Some(block), Some(code)) = (caps.get(0), caps.get(1)) else {
        return ParsedSuggestion {
            rationale_text: raw.trim().to_string(),
            improved_code: String::new(),
        };
    };

    let before = raw[..block.start()].trim();
    let after = raw[block.end()..].trim();
    let rationale_text = match (before.is_empty(), after.is_empty()) {
        (false, false) => format!("{}\n\n{}", before, after),
        (false, true) => before.to_string(),
        (true, false) => after.to_string(),
        (true, true) => String::new(),
    };

    ParsedSuggestion {
        rationale_text,
        improved_code: code.as_str().trim_end().to_string(),
    }
}
