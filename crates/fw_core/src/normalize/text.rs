/// Normalize filing text before chunking.
///
/// Smart quotes become ASCII quotes. The replacement character left behind by
/// lossy decoding and non-whitespace control characters are dropped. Line
/// endings are left alone; chunking splits on whitespace anyway.
pub fn clean_filing_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '\u{201C}' | '\u{201D}' => out.push('"'),
            '\u{2018}' | '\u{2019}' => out.push('\''),
            '\u{FFFD}' => {}
            c if c.is_control() && !c.is_whitespace() => {}
            c => out.push(c),
        }
    }
    out
}

/// Collapse every whitespace run to a single space and trim the ends.
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Cut `text` to at most `max_bytes`, backing off to a char boundary.
pub fn truncate_on_char_boundary(text: &str, max_bytes: usize) -> &str {
    if text.len() <= max_bytes {
        return text;
    }
    let mut end = max_bytes;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn replaces_smart_quotes_and_drops_garbage() {
        let raw = "\u{201C}Revenue\u{201D} rose \u{2018}materially\u{2019}\u{FFFD}\u{0007}.";
        assert_eq!(clean_filing_text(raw), "\"Revenue\" rose 'materially'.");
    }

    #[test]
    fn keeps_whitespace_controls() {
        assert_eq!(clean_filing_text("a\tb\nc\r\n"), "a\tb\nc\r\n");
    }

    #[test]
    fn collapses_whitespace() {
        assert_eq!(collapse_whitespace("  Item 1A.\n\n  Risk\tFactors  "), "Item 1A. Risk Factors");
    }

    #[test]
    fn truncation_respects_utf8() {
        let s = "ab\u{00E9}cd";
        assert_eq!(truncate_on_char_boundary(s, 3), "ab");
        assert_eq!(truncate_on_char_boundary(s, 4), "ab\u{00E9}");
        assert_eq!(truncate_on_char_boundary(s, 100), s);
    }
}
