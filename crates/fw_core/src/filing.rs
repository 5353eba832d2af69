use serde::{Deserialize, Serialize};

/// Placeholder for filename segments that are absent.
pub const UNKNOWN: &str = "unknown";

/// Metadata recovered from a filing text file name
/// (`TICKER_FORMTYPE_FILEDATE.txt`).
///
/// `filed_year` holds the filing-date token as written in the file name; it is
/// part of every chunk identifier, so it is never reformatted here.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct FilingMeta {
    pub ticker: String,
    pub form_type: String,
    pub filed_year: String,
    pub source_file: String,
}

impl FilingMeta {
    /// Prefix shared by all chunk identifiers of this filing.
    pub fn chunk_id_prefix(&self) -> String {
        format!("{}_{}_{}", self.ticker, self.form_type, self.filed_year)
    }
}

pub fn parse_filing_filename(file_name: &str) -> FilingMeta {
    let stem = file_name.strip_suffix(".txt").unwrap_or(file_name);
    let mut parts = stem.split('_');
    let mut next = || {
        parts
            .next()
            .filter(|p| !p.is_empty())
            .unwrap_or(UNKNOWN)
            .to_string()
    };
    let ticker = next();
    let form_type = next();
    let filed_year = next();

    FilingMeta {
        ticker,
        form_type,
        filed_year,
        source_file: file_name.to_string(),
    }
}

/// Build the on-disk name for a filing. Segments are sanitized so that the
/// name parses back into the same three parts.
pub fn filing_file_name(ticker: &str, form_type: &str, filed: &str) -> String {
    format!(
        "{}_{}_{}.txt",
        sanitize_segment(ticker),
        sanitize_segment(form_type),
        sanitize_segment(filed)
    )
}

pub(crate) fn sanitize_segment(raw: &str) -> String {
    let s: String = raw
        .trim()
        .chars()
        .map(|c| match c {
            '_' | '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '-',
            c if c.is_whitespace() => '-',
            c => c,
        })
        .collect();
    if s.is_empty() {
        UNKNOWN.to_string()
    } else {
        s
    }
}
