use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::AppError;

pub const COL_TICKER: &str = "Ticker";
pub const COL_FORM_TYPE: &str = "Form Type";
pub const COL_FILING_URL: &str = "Filing URL";
pub const COL_FILED_AT: &str = "Filed At";

/// One filing row of the CSV manifest.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ManifestEntry {
    pub ticker: String,
    pub form_type: String,
    pub filing_url: String,
    pub filed_at: Option<String>,
}

/// Which manifest rows get downloaded.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ManifestSelection {
    pub form_types: Vec<String>,
    /// First N distinct tickers, in manifest order.
    pub max_companies: usize,
    pub max_filings_per_company: usize,
}

impl Default for ManifestSelection {
    fn default() -> Self {
        Self {
            form_types: vec!["10-K".to_string(), "10-Q".to_string()],
            max_companies: 3,
            max_filings_per_company: 2,
        }
    }
}

pub fn read_manifest(path: &Path) -> Result<Vec<ManifestEntry>, AppError> {
    if !path.is_file() {
        return Err(AppError::new("MANIFEST_NOT_FOUND", "Filing manifest CSV not found")
            .with_details(format!("path={}", path.display())));
    }
    let raw = fs::read(path)
        .map_err(|e| AppError::io("MANIFEST_READ_FAILED", "Failed to read filing manifest", path, &e))?;
    parse_manifest(&String::from_utf8_lossy(&raw))
}

pub fn parse_manifest(csv_text: &str) -> Result<Vec<ManifestEntry>, AppError> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(csv_text.as_bytes());

    let headers = rdr
        .headers()
        .map_err(|e| {
            AppError::new("MANIFEST_HEADERS_INVALID", "Failed to read manifest headers")
                .with_details(e.to_string())
        })?
        .clone();

    let position = |name: &str| headers.iter().position(|h| h.trim() == name);
    let (Some(ticker_idx), Some(form_idx), Some(url_idx)) =
        (position(COL_TICKER), position(COL_FORM_TYPE), position(COL_FILING_URL))
    else {
        return Err(AppError::new(
            "MANIFEST_HEADERS_INVALID",
            "Manifest must have Ticker, Form Type and Filing URL columns",
        )
        .with_details(format!("headers={}", headers.iter().collect::<Vec<_>>().join(","))));
    };
    let filed_idx = position(COL_FILED_AT);

    let cell = |row: &csv::StringRecord, idx: usize| {
        row.get(idx)
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    };

    let mut out = Vec::new();
    for (i, result) in rdr.records().enumerate() {
        let row = result.map_err(|e| {
            AppError::new("MANIFEST_PARSE_FAILED", "Failed to parse manifest row")
                .with_details(format!("row={}; err={}", i + 1, e))
        })?;

        let (Some(ticker), Some(form_type), Some(filing_url)) =
            (cell(&row, ticker_idx), cell(&row, form_idx), cell(&row, url_idx))
        else {
            warn!(row = i + 1, "manifest row missing ticker, form type or URL; skipped");
            continue;
        };

        out.push(ManifestEntry {
            ticker,
            form_type,
            filing_url,
            filed_at: filed_idx.and_then(|idx| cell(&row, idx)),
        });
    }

    Ok(out)
}

/// Keep allowed form types, then the first `max_companies` tickers and the
/// first `max_filings_per_company` rows of each, preserving manifest order.
pub fn select_filings(entries: &[ManifestEntry], sel: &ManifestSelection) -> Vec<ManifestEntry> {
    let allowed: HashSet<&str> = sel.form_types.iter().map(String::as_str).collect();
    let eligible = entries
        .iter()
        .filter(|e| allowed.is_empty() || allowed.contains(e.form_type.as_str()));

    let mut tickers: Vec<&str> = Vec::new();
    let mut per_ticker: BTreeMap<&str, usize> = BTreeMap::new();
    let mut out = Vec::new();

    for entry in eligible {
        let ticker = entry.ticker.as_str();
        if !tickers.contains(&ticker) {
            if tickers.len() >= sel.max_companies {
                continue;
            }
            tickers.push(ticker);
        }
        let taken = per_ticker.entry(ticker).or_insert(0);
        if *taken >= sel.max_filings_per_company {
            continue;
        }
        *taken += 1;
        out.push(entry.clone());
    }

    out
}
