//! Vision-model extraction.
//!
//! Pages are rendered, PNG-encoded and transcribed by concurrent chat
//! completion calls bounded by a semaphore. A failed page becomes an inline
//! error marker instead of failing the document; page order is restored
//! before the result is assembled.

use super::{Extractor, ExtractorKind};
use crate::config::{ExtractionConfig, VisionConfig};
use crate::core::io::read_pdf_bytes;
use crate::error::{GarimpoError, Result};
use crate::pdf::{PageRenderOptions, PdfRenderer, encode_png};
use crate::types::{ExtractionMethod, ExtractionResult, PageText};
use crate::vision::{VisionClient, parse_consolidated_json};
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

pub struct VisionExtractor {
    client: Arc<VisionClient>,
    max_concurrent_calls: usize,
    dpi: i32,
    consolidate: bool,
}

impl VisionExtractor {
    pub fn new(config: &VisionConfig) -> Result<Self> {
        Ok(Self {
            client: Arc::new(VisionClient::new(config)?),
            max_concurrent_calls: config.max_concurrent_calls,
            dpi: config.dpi,
            consolidate: config.consolidate,
        })
    }

    async fn transcribe_pages(&self, page_images: Vec<Vec<u8>>) -> Result<Vec<PageText>> {
        let total_pages = page_images.len();
        let semaphore = Arc::new(Semaphore::new(self.max_concurrent_calls));
        let mut join_set = JoinSet::new();

        for (idx, png) in page_images.into_iter().enumerate() {
            let client = Arc::clone(&self.client);
            let semaphore = Arc::clone(&semaphore);

            join_set.spawn(async move {
                let _permit = semaphore.acquire().await.expect("semaphore closed");
                let page_number = idx + 1;
                let text = match client.describe_page(&png, page_number, total_pages).await {
                    Ok(text) => text,
                    Err(err) => {
                        tracing::warn!(page = page_number, error = %err, "vision call failed for page");
                        format!("[ERRO NA API OPENAI: {}]", err)
                    }
                };
                (idx, text)
            });
        }

        let mut pages: Vec<Option<PageText>> = (0..total_pages).map(|_| None).collect();
        while let Some(joined) = join_set.join_next().await {
            let (idx, text) = joined.map_err(|e| GarimpoError::Other(format!("Vision task panicked: {}", e)))?;
            pages[idx] = Some(PageText::new(idx + 1, text));
        }

        Ok(pages.into_iter().flatten().collect())
    }
}

#[async_trait]
impl Extractor for VisionExtractor {
    fn name(&self) -> &'static str {
        "vision"
    }

    fn kind(&self) -> ExtractorKind {
        ExtractorKind::Vision
    }

    async fn extract(&self, path: &Path, _config: &ExtractionConfig) -> Result<ExtractionResult> {
        let started = Instant::now();
        let bytes = read_pdf_bytes(path).await?;
        let file_size = bytes.len() as u64;

        let render_options = PageRenderOptions::with_dpi(self.dpi);
        let rendered = tokio::task::spawn_blocking(move || {
            let renderer = PdfRenderer::new()?;
            let images = renderer.render_all_pages(&bytes, &render_options)?;
            images.iter().map(encode_png).collect::<std::result::Result<Vec<_>, _>>()
        })
        .await
        .map_err(|e| GarimpoError::Other(format!("Rendering task panicked: {}", e)))?;

        let mut result = ExtractionResult::new(path.to_path_buf(), ExtractionMethod::OpenAiVision);
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
        result.pages = self.transcribe_pages(page_images).await?;
        result.pages_processed = result
            .pages
            .iter()
            .filter(|p| !p.text.starts_with("[ERRO NA API OPENAI:"))
            .count();

        if self.consolidate && result.pages_processed > 0 {
            match self.client.consolidate(&result.full_text()).await {
                Ok(content) => match parse_consolidated_json(&content) {
                    Ok(_) => result.consolidated_json = Some(content),
                    Err(err) => {
                        tracing::warn!(error = %err, "consolidation response was not valid JSON, discarding");
                    }
                },
                Err(err) => {
                    tracing::warn!(error = %err, "consolidation call failed");
                }
            }
        }

        if result.pages_processed == 0 {
            result.error = Some("Vision API failed for all pages".to_string());
        }
        result.processing_time = started.elapsed().as_secs_f64();

        tracing::debug!(
            path = %path.display(),
            pages = result.pages_processed,
            total = result.total_pages,
            consolidated = result.consolidated_json.is_some(),
            "vision extraction finished"
        );

        Ok(result)
    }
}
