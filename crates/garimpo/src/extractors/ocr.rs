//! Rasterize-and-recognize extraction via Tesseract.

use super::{Extractor, ExtractorKind};
use crate::config::ExtractionConfig;
use crate::core::io::read_pdf_bytes;
use crate::error::{GarimpoError, Result};
use crate::ocr::TesseractBackend;
use crate::pdf::{PageRenderOptions, PdfRenderer, encode_png};
use crate::types::{ExtractionMethod, ExtractionResult, PageText};
use async_trait::async_trait;
use std::path::Path;
use std::time::Instant;

pub struct OcrExtractor;

impl OcrExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl Default for OcrExtractor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Extractor for OcrExtractor {
    fn name(&self) -> &'static str {
        "ocr"
    }

    fn kind(&self) -> ExtractorKind {
        ExtractorKind::Ocr
    }

    async fn extract(&self, path: &Path, config: &ExtractionConfig) -> Result<ExtractionResult> {
        let ocr_config = config
            .ocr
            .clone()
            .ok_or_else(|| GarimpoError::validation("OCR extraction requires an [ocr] section"))?;

        let backend = TesseractBackend::new(&ocr_config);
        backend.ensure_available().await?;

        let started = Instant::now();
        let bytes = read_pdf_bytes(path).await?;
        let file_size = bytes.len() as u64;

        let render_options = PageRenderOptions::with_dpi(ocr_config.dpi);
        let rendered = tokio::task::spawn_blocking(move || {
            let renderer = PdfRenderer::new()?;
            let images = renderer.render_all_pages(&bytes, &render_options)?;
            images.iter().map(encode_png).collect::<std::result::Result<Vec<_>, _>>()
        })
        .await
        .map_err(|e| GarimpoError::Other(format!("Rendering task panicked: {}", e)))?;

        let mut result = ExtractionResult::new(path.to_path_buf(), ExtractionMethod::TesseractOcr);
        result.file_size = file_size;

        let page_images = match rendered {
            Ok(images) => images,
            Err(err) => {
                result.error = Some(err.to_string());
                result.processing_time = started.elapsed().as_secs_f64();
                return Ok(result);
            }
        };

        result.total_pages = page_images.len();
        let limit = ocr_config.max_pages.unwrap_or(usize::MAX);

        for (idx, png) in page_images.iter().enumerate() {
            let page_number = idx + 1;
            if idx >= limit {
                result.pages.push(PageText::new(
                    page_number,
                    format!(
                        "[OCR interrompido: limite de {} páginas atingido, {} páginas restantes]",
                        limit,
                        page_images.len() - limit
                    ),
                ));
                break;
            }

            match backend.recognize_png(png, &ocr_config).await {
                Ok(text) if !text.trim().is_empty() => {
                    result.pages.push(PageText::new(page_number, text));
                    result.pages_processed += 1;
                }
                Ok(_) => {
                    tracing::debug!(page = page_number, "OCR produced no text for page");
                }
                // A page that fails recognition is skipped; the rest of the
                // document is still worth reading.
                Err(GarimpoError::Io(err)) => return Err(err.into()),
                Err(err) => {
                    tracing::warn!(page = page_number, error = %err, "OCR failed for page, skipping");
                }
            }
        }

        if result.pages.is_empty() {
            result.error = Some("OCR produced no text for any page".to_string());
        }
        result.processing_time = started.elapsed().as_secs_f64();

        tracing::debug!(
            path = %path.display(),
            pages = result.pages_processed,
            total = result.total_pages,
            "OCR extraction finished"
        );

        Ok(result)
    }
}
