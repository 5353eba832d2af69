//! Plain-text extraction for filing documents.

use scraper::{Html, Node};

use crate::normalize::text::{collapse_whitespace, truncate_on_char_boundary};

const SKIPPED_ELEMENTS: [&str; 4] = ["script", "style", "noscript", "template"];

/// Extract the visible text of an HTML document.
///
/// Text inside `script`, `style`, `noscript` and `template` elements is
/// dropped. Text nodes are joined with spaces and all whitespace runs are
/// collapsed, so the result is a single line.
pub fn extract_text_from_html(html: &str) -> String {
    let document = Html::parse_document(html);

    let mut parts: Vec<&str> = Vec::new();
    for node in document.tree.root().descendants() {
        let Node::Text(text) = node.value() else {
            continue;
        };
        let hidden = node.ancestors().any(|a| {
            a.value()
                .as_element()
                .map(|el| SKIPPED_ELEMENTS.contains(&el.name()))
                .unwrap_or(false)
        });
        if !hidden {
            parts.push(&**text);
        }
    }

    collapse_whitespace(&parts.join(" "))
}

/// Heuristic used by the fetcher: EDGAR serves both HTML and plain-text
/// submissions.
pub fn looks_like_html(body: &str) -> bool {
    let head = body.trim_start();
    let head = truncate_on_char_boundary(head, 1024);
    let lower = head.to_ascii_lowercase();
    lower.starts_with("<!doctype html")
        || lower.starts_with("<html")
        || lower.contains("<body")
        || lower.contains("<div")
        || lower.contains("<p>")
}
