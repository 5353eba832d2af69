use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::html::{extract_text_from_html, looks_like_html};
use super::manifest::{read_manifest, select_filings, ManifestEntry, ManifestSelection};
use crate::error::AppError;
use crate::filing::filing_file_name;
use crate::fsutil::write_atomic;
use crate::normalize::dates::normalize_filed_at;
use crate::normalize::text::collapse_whitespace;

/// EDGAR rejects anonymous clients; requests must identify the caller.
pub const DEFAULT_USER_AGENT: &str = "FinWiser (SEC filings research; contact: ops@finwiser.invalid)";

/// Full-text 10-K submissions can run to tens of megabytes.
pub const DEFAULT_MAX_BODY_BYTES: u64 = 64 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct FetchOptions {
    pub output_dir: PathBuf,
    pub user_agent: String,
    pub timeout: Duration,
    /// Pause after each successful download.
    pub polite_delay: Duration,
    /// Larger bodies fail with `FETCH_BODY_TOO_LARGE` instead of being cut.
    pub max_body_bytes: u64,
}

impl FetchOptions {
    pub fn new(output_dir: PathBuf) -> Self {
        Self {
            output_dir,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout: Duration::from_secs(30),
            polite_delay: Duration::from_secs(1),
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FetchFailure {
    pub file_name: String,
    pub url: String,
    pub error: AppError,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct FetchSummary {
    pub written: Vec<String>,
    pub skipped_existing: Vec<String>,
    pub failures: Vec<FetchFailure>,
}

#[derive(Debug, Clone)]
pub struct FilingFetcher {
    agent: ureq::Agent,
    opts: FetchOptions,
}

impl FilingFetcher {
    pub fn new(opts: FetchOptions) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(opts.timeout)
            .user_agent(&opts.user_agent)
            .build();
        Self { agent, opts }
    }

    pub fn output_dir(&self) -> &Path {
        &self.opts.output_dir
    }

    /// Download one filing and return its plain text.
    pub fn fetch_text(&self, url: &str) -> Result<String, AppError> {
        let resp = match self.agent.get(url).call() {
            Ok(r) => r,
            Err(ureq::Error::Status(code, _)) => {
                return Err(AppError::new("FETCH_HTTP_STATUS", "Filing request was rejected")
                    .with_details(format!("url={url}; status={code}"))
                    .with_retryable(code == 429 || code >= 500));
            }
            Err(e) => {
                return Err(AppError::new("FETCH_HTTP_FAILED", "Failed to download filing")
                    .with_details(format!("url={url}; err={e}"))
                    .with_retryable(true));
            }
        };

        let limit = self.opts.max_body_bytes;
        let mut body = Vec::new();
        resp.into_reader()
            .take(limit.saturating_add(1))
            .read_to_end(&mut body)
            .map_err(|e| {
                AppError::new("FETCH_HTTP_FAILED", "Failed to read filing body")
                    .with_details(format!("url={url}; err={e}"))
                    .with_retryable(true)
            })?;
        if body.len() as u64 > limit {
            return Err(AppError::new("FETCH_BODY_TOO_LARGE", "Filing body exceeds the download limit")
                .with_details(format!("url={url}; limit_bytes={limit}")));
        }

        let body = String::from_utf8_lossy(&body);
        let text = if looks_like_html(&body) {
            extract_text_from_html(&body)
        } else {
            collapse_whitespace(&body)
        };
        if text.is_empty() {
            return Err(AppError::new("FETCH_EMPTY_DOCUMENT", "Filing contained no text")
                .with_details(format!("url={url}")));
        }
        Ok(text)
    }

    /// Download every entry not already on disk.
    ///
    /// Only failing to create the output directory aborts the run; a failed
    /// filing is logged, recorded in the summary and skipped.
    pub fn fetch_all(&self, entries: &[ManifestEntry]) -> Result<FetchSummary, AppError> {
        let dir = &self.opts.output_dir;
        fs::create_dir_all(dir)
            .map_err(|e| AppError::io("FETCH_OUTPUT_DIR_FAILED", "Failed to create filings directory", dir, &e))?;

        let mut summary = FetchSummary::default();
        for entry in entries {
            let filed = normalize_filed_at(entry.filed_at.as_deref());
            let file_name = filing_file_name(&entry.ticker, &entry.form_type, &filed);
            let path = dir.join(&file_name);

            if path.exists() {
                summary.skipped_existing.push(file_name);
                continue;
            }

            info!(url = %entry.filing_url, file = %file_name, "downloading filing");
            match self.fetch_text(&entry.filing_url).and_then(|text| write_atomic(&path, text.as_bytes(), "FETCH_WRITE_FAILED", "filing text")) {
                Ok(()) => {
                    summary.written.push(file_name);
                    if !self.opts.polite_delay.is_zero() {
                        thread::sleep(self.opts.polite_delay);
                    }
                }
                Err(error) => {
                    warn!(url = %entry.filing_url, %error, "failed to fetch filing; skipped");
                    summary.failures.push(FetchFailure {
                        file_name,
                        url: entry.filing_url.clone(),
                        error,
                    });
                }
            }
        }

        info!(
            written = summary.written.len(),
            skipped = summary.skipped_existing.len(),
            failed = summary.failures.len(),
            "fetch finished"
        );
        Ok(summary)
    }
}

/// Read the manifest, apply the selection and download the chosen filings.
pub fn fetch_and_save_filings(
    manifest_path: &Path,
    selection: &ManifestSelection,
    opts: FetchOptions,
) -> Result<FetchSummary, AppError> {
    let entries = read_manifest(manifest_path)?;
    let selected = select_filings(&entries, selection);
    let tickers = selected
        .iter()
        .map(|e| e.ticker.as_str())
        .fold(Vec::<&str>::new(), |mut acc, t| {
            if !acc.contains(&t) {
                acc.push(t);
            }
            acc
        });
    info!(companies = ?tickers, filings = selected.len(), "selected filings from manifest");

    FilingFetcher::new(opts).fetch_all(&selected)
}
