//! Input file validation and reading.

use crate::error::{GarimpoError, Result};
use std::path::Path;
use std::time::Duration;

const OPEN_RETRIES: u32 = 3;
const RETRY_BASE_DELAY_MS: u64 = 200;

/// Check that `path` points at a readable, non-empty `.pdf` file.
pub fn validate_pdf_file(path: &Path) -> Result<u64> {
    if !path.exists() {
        return Err(GarimpoError::validation(format!(
            "File does not exist: {}",
            path.display()
        )));
    }
    if !path.is_file() {
        return Err(GarimpoError::validation(format!(
            "Not a regular file: {}",
            path.display()
        )));
    }

    let is_pdf = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("pdf"));
    if !is_pdf {
        return Err(GarimpoError::validation(format!(
            "Not a PDF file: {}",
            path.display()
        )));
    }

    let size = std::fs::metadata(path)?.len();
    if size == 0 {
        return Err(GarimpoError::validation(format!(
            "File is empty: {}",
            path.display()
        )));
    }

    Ok(size)
}

/// Validate and read a PDF into memory.
///
/// Transient open failures (files still held by a scanner or sync agent) are
/// retried a few times with linear backoff before the IO error bubbles up.
pub async fn read_pdf_bytes(path: &Path) -> Result<Vec<u8>> {
    validate_pdf_file(path)?;

    let mut attempt = 0u32;
    loop {
        match tokio::fs::read(path).await {
            Ok(bytes) => return Ok(bytes),
            Err(err) => {
                attempt += 1;
                let transient = matches!(
                    err.kind(),
                    std::io::ErrorKind::PermissionDenied
                        | std::io::ErrorKind::WouldBlock
                        | std::io::ErrorKind::Interrupted
                );
                if !transient || attempt >= OPEN_RETRIES {
                    return Err(err.into());
                }
                let delay = Duration::from_millis(RETRY_BASE_DELAY_MS * u64::from(attempt));
                tracing::warn!(
                    path = %path.display(),
                    attempt,
                    error = %err,
                    "transient read failure, retrying"
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}
