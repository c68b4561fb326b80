//! Tesseract OCR backend.
//!
//! Recognition shells out to the `tesseract` binary. PNG input goes through a
//! temp file (tesseract reads images by path) and recognized text comes back
//! on stdout.

use crate::config::OcrConfig;
use crate::error::{GarimpoError, Result};
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Mutex;
use tokio::process::Command;
use tokio::time::{Duration, timeout};

/// Per-page recognition timeout (120 seconds).
const TESSERACT_TIMEOUT_SECONDS: u64 = 120;

/// Probe outcome per binary path. Different configs may point at different
/// tesseract installs, so the cache is keyed by the command path.
static TESSERACT_PROBES: Lazy<Mutex<HashMap<PathBuf, std::result::Result<String, String>>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

pub struct TesseractBackend {
    command: PathBuf,
}

impl TesseractBackend {
    pub fn new(config: &OcrConfig) -> Self {
        let command = config
            .tesseract_cmd
            .clone()
            .unwrap_or_else(|| PathBuf::from("tesseract"));
        Self { command }
    }

    /// Probe the tesseract binary once per binary path.
    ///
    /// Returns the version line on success; the outcome is cached per command
    /// path, so backends pointing at different installs probe independently.
    pub async fn ensure_available(&self) -> Result<String> {
        if let Some(cached) = TESSERACT_PROBES.lock().unwrap().get(&self.command) {
            return cached.clone().map_err(GarimpoError::MissingDependency);
        }

        let probe = Command::new(&self.command)
            .arg("--version")
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped())
            .output()
            .await;

        let outcome = match probe {
            Ok(output) if output.status.success() => {
                // tesseract prints its version banner on stdout or stderr
                // depending on the release
                let banner = if output.stdout.is_empty() {
                    String::from_utf8_lossy(&output.stderr).into_owned()
                } else {
                    String::from_utf8_lossy(&output.stdout).into_owned()
                };
                Ok(banner.lines().next().unwrap_or("tesseract").to_string())
            }
            Ok(output) => Err(format!(
                "tesseract --version failed: {}",
                String::from_utf8_lossy(&output.stderr)
            )),
            Err(e) => Err(format!("tesseract not found ({}): {}", self.command.display(), e)),
        };

        TESSERACT_PROBES
            .lock()
            .unwrap()
            .insert(self.command.clone(), outcome.clone());
        outcome.map_err(GarimpoError::MissingDependency)
    }

    /// Recognize one rendered page.
    pub async fn recognize_png(&self, png_bytes: &[u8], config: &OcrConfig) -> Result<String> {
        // tesseract reads images by path; `input` keeps the temp file alive
        // until the subprocess finishes.
        let mut input = tempfile::Builder::new()
            .prefix("garimpo-ocr-")
            .suffix(".png")
            .tempfile()?;
        input.write_all(png_bytes)?;
        input.flush()?;

        let child = Command::new(&self.command)
            .arg(input.path())
            // "stdout" as the output base makes tesseract write text to stdout
            .arg("stdout")
            .arg("-l")
            .arg(&config.language)
            .arg("--psm")
            .arg(config.psm.to_string())
            .arg("--dpi")
            .arg(config.dpi.to_string())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped())
            .spawn()
            .map_err(|e| std::io::Error::other(format!("Failed to execute tesseract: {}", e)))?;

        let output = match timeout(Duration::from_secs(TESSERACT_TIMEOUT_SECONDS), child.wait_with_output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                return Err(std::io::Error::other(format!("Failed to wait for tesseract: {}", e)).into());
            }
            Err(_) => {
                return Err(GarimpoError::ocr(format!(
                    "Tesseract recognition timed out after {} seconds",
                    TESSERACT_TIMEOUT_SECONDS
                )));
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);

            let stderr_lower = stderr.to_lowercase();
            if stderr_lower.contains("failed loading language")
                || stderr_lower.contains("tessdata")
                || stderr_lower.contains("error")
            {
                return Err(GarimpoError::ocr(format!("Tesseract recognition error: {}", stderr)));
            }

            return Err(std::io::Error::other(format!("Tesseract system error: {}", stderr)).into());
        }

        let text = String::from_utf8(output.stdout)
            .map_err(|e| GarimpoError::ocr(format!("Failed to decode tesseract output: {}", e)))?;

        Ok(text)
    }
}
