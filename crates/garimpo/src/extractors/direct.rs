//! Native text-layer extraction with parser fallback.

use super::{Extractor, ExtractorKind};
use crate::config::ExtractionConfig;
use crate::core::io::read_pdf_bytes;
use crate::error::{GarimpoError, Result};
use crate::pdf::{PdfTextExtractor, extract_pages_lopdf};
use crate::types::{ExtractionMethod, ExtractionResult, PageText};
use async_trait::async_trait;
use std::path::Path;
use std::time::Instant;

pub struct DirectExtractor;

impl DirectExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl Default for DirectExtractor {
    fn default() -> Self {
        Self::new()
    }
}

/// Pages extracted by one of the native parsers, plus which one succeeded.
struct ParsedPages {
    raw_pages: Vec<String>,
    method: ExtractionMethod,
}

/// Run pdfium first; when it yields no non-empty page or fails outright,
/// retry with lopdf.
fn parse_native(bytes: &[u8]) -> Result<ParsedPages> {
    let pdfium_result = PdfTextExtractor::new().and_then(|extractor| extractor.extract_pages(bytes));

    match pdfium_result {
        Ok(pages) if pages.iter().any(|p| !p.trim().is_empty()) => Ok(ParsedPages {
            raw_pages: pages,
            method: ExtractionMethod::Pdfium,
        }),
        Ok(pages) => {
            tracing::debug!("pdfium produced no text, trying lopdf");
            match extract_pages_lopdf(bytes) {
                Ok(fallback) if fallback.iter().any(|p| !p.trim().is_empty()) => Ok(ParsedPages {
                    raw_pages: fallback,
                    method: ExtractionMethod::Lopdf,
                }),
                // Neither parser found text; keep the pdfium page count.
                _ => Ok(ParsedPages {
                    raw_pages: pages,
                    method: ExtractionMethod::Pdfium,
                }),
            }
        }
        Err(pdfium_err) => {
            tracing::debug!(error = %pdfium_err, "pdfium failed, trying lopdf");
            let fallback = extract_pages_lopdf(bytes).map_err(|_| GarimpoError::from(pdfium_err))?;
            Ok(ParsedPages {
                raw_pages: fallback,
                method: ExtractionMethod::Lopdf,
            })
        }
    }
}

/// Build a result from raw per-page text, keeping only non-empty pages.
pub(super) fn result_from_pages(
    path: &Path,
    raw_pages: Vec<String>,
    method: ExtractionMethod,
) -> ExtractionResult {
    let mut result = ExtractionResult::new(path.to_path_buf(), method);
    result.total_pages = raw_pages.len();
    for (idx, text) in raw_pages.into_iter().enumerate() {
        if !text.trim().is_empty() {
            result.pages.push(PageText::new(idx + 1, text));
        }
    }
    result.pages_processed = result.pages.len();
    result
}

#[async_trait]
impl Extractor for DirectExtractor {
    fn name(&self) -> &'static str {
        "direct"
    }

    fn kind(&self) -> ExtractorKind {
        ExtractorKind::Direct
    }

    async fn extract(&self, path: &Path, _config: &ExtractionConfig) -> Result<ExtractionResult> {
        let started = Instant::now();
        let bytes = read_pdf_bytes(path).await?;
        let file_size = bytes.len() as u64;

        // Pdfium text extraction is CPU-bound; keep it off the async workers.
        let parsed = tokio::task::spawn_blocking(move || parse_native(&bytes))
            .await
            .map_err(|e| GarimpoError::Other(format!("Extraction task panicked: {}", e)))?;

        let mut result = match parsed {
            Ok(parsed) => result_from_pages(path, parsed.raw_pages, parsed.method),
            Err(err) => {
                if matches!(err, GarimpoError::Io(_)) {
                    return Err(err);
                }
                let mut failed = ExtractionResult::new(path.to_path_buf(), ExtractionMethod::Pdfium);
                failed.error = Some(err.to_string());
                failed
            }
        };

        result.file_size = file_size;
        result.processing_time = started.elapsed().as_secs_f64();

        tracing::debug!(
            path = %path.display(),
            method = %result.method,
            pages = result.pages_processed,
            total = result.total_pages,
            "direct extraction finished"
        );

        Ok(result)
    }
}
