use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::AppError;

/// Sibling scratch path: the full file name with `.tmp` appended, so
/// `AAPL_10-Q_Q3.2020.txt` and `AAPL_10-Q_Q3.2021.txt` never share one.
pub fn tmp_path_for(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(OsString::from).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Write through a scratch file and rename it into place.
///
/// Errors carry `code`; `what` names the file in the message. A failed
/// rename removes the scratch file.
pub fn write_atomic(path: &Path, bytes: &[u8], code: &str, what: &str) -> Result<(), AppError> {
    let tmp = tmp_path_for(path);
    fs::write(&tmp, bytes).map_err(|e| AppError::io(code, format!("Failed to write {what}"), &tmp, &e))?;
    fs::rename(&tmp, path).map_err(|e| {
        let _ = fs::remove_file(&tmp);
        AppError::new(code, format!("Failed to finalize {what} write"))
            .with_details(format!("tmp={}; dest={}; err={}", tmp.display(), path.display(), e))
    })
}
