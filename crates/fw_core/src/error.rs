use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Structured error shared by the library crates and returned over HTTP.
///
/// `code` is a stable SCREAMING_SNAKE identifier grouped by area
/// (`MANIFEST_*`, `FETCH_*`, `VECTOR_*`, ...). `retryable` marks failures
/// caused by an unreachable or flaky upstream service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AppError {
    pub code: String,
    pub message: String,
    pub details: Option<String>,
    pub retryable: bool,
}

impl AppError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: None,
            retryable: false,
        }
    }

    /// Filesystem failure tied to a path; details carry both.
    pub fn io(
        code: impl Into<String>,
        message: impl Into<String>,
        path: &Path,
        err: &std::io::Error,
    ) -> Self {
        Self::new(code, message).with_details(format!("path={}; err={}", path.display(), err))
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn with_retryable(mut self, retryable: bool) -> Self {
        self.retryable = retryable;
        self
    }

    pub fn is(&self, code: &str) -> bool {
        self.code == code
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)?;
        if let Some(details) = &self.details {
            write!(f, " ({details})")?;
        }
        Ok(())
    }
}

impl std::error::Error for AppError {}
