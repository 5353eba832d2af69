use std::collections::BTreeSet;

/// Fixed reply when the filings do not support an answer.
pub const FALLBACK_ANSWER: &str = "Insufficient information found in the selected SEC filings.";

/// Substring that marks a model reply as the fallback, however it was phrased
/// around it.
pub const FALLBACK_MARKER: &str = "insufficient information";

pub fn is_fallback_answer(answer: &str) -> bool {
    answer.to_lowercase().contains(FALLBACK_MARKER)
}

/// Sources reported with an answer: none for a fallback reply, otherwise the
/// chunks that put text into the context, in id order.
pub fn grounded_sources(answer: &str, contributed: BTreeSet<String>) -> Vec<String> {
    if is_fallback_answer(answer) {
        return Vec::new();
    }
    contributed.into_iter().collect()
}
