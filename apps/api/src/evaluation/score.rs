//! Score Extractor: pulls the `NN/100` verdict out of a single-candidate report.

use std::sync::LazyLock;

use regex::Regex;

/// An integer 0–100 directly followed by `/100`, bounded on both sides by
/// word boundaries. `123/100` and `87/1000` do not match.
static SCORE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b([1-9]?\d|100)/100\b").expect("score pattern is valid"));

/// Returns the first score found in `text`, or `None`.
pub fn extract_score(text: &str) -> Option<u8> {
    SCORE_PATTERN
        .captures(text)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}
