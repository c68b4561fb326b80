//! Direct-first extraction with rasterizing fallback.

use super::{DirectExtractor, Extractor, ExtractorKind, OcrExtractor, VisionExtractor};
use crate::config::{ExtractionConfig, FallbackBackend};
use crate::error::{GarimpoError, Result};
use crate::types::{ExtractionMethod, ExtractionResult};
use async_trait::async_trait;
use std::path::Path;
use std::time::Instant;

pub struct HybridExtractor {
    direct: DirectExtractor,
    fallback: Option<Box<dyn Extractor>>,
}

impl HybridExtractor {
    pub fn new(config: &ExtractionConfig) -> Result<Self> {
        let fallback: Option<Box<dyn Extractor>> = match config.fallback {
            FallbackBackend::Ocr => {
                if config.ocr.is_none() {
                    return Err(GarimpoError::validation(
                        "Hybrid OCR fallback requires an [ocr] section",
                    ));
                }
                Some(Box::new(OcrExtractor::new()))
            }
            FallbackBackend::Vision => {
                let vision = config.vision.as_ref().ok_or_else(|| {
                    GarimpoError::validation("Hybrid vision fallback requires a [vision] section")
                })?;
                Some(Box::new(VisionExtractor::new(vision)?))
            }
            FallbackBackend::None => None,
        };

        Ok(Self {
            direct: DirectExtractor::new(),
            fallback,
        })
    }

    /// A direct pass resolves the document when it produced pages and the
    /// trimmed text reaches the configured minimum length.
    fn direct_is_sufficient(result: &ExtractionResult, min_text_length: usize) -> bool {
        result.success()
            && result.pages_processed > 0
            && result.full_text().trim().len() >= min_text_length
    }

    /// Pick the result to report after the fallback pass ran.
    ///
    /// A successful fallback wins. A failed fallback falls back to the
    /// partial direct text when there is any; with nothing extracted at all,
    /// the fallback's error is carried so the failure has a reason.
    fn resolve_fallback(direct_result: ExtractionResult, fallback_result: ExtractionResult) -> ExtractionResult {
        if fallback_result.success() {
            let mut result = fallback_result;
            result.method = match result.method {
                ExtractionMethod::OpenAiVision => ExtractionMethod::HybridVision,
                _ => ExtractionMethod::HybridOcr,
            };
            result
        } else if direct_result.characters_extracted() > 0 {
            let mut result = direct_result;
            result.method = ExtractionMethod::HybridDirect;
            result
        } else {
            let mut result = direct_result;
            result.error = match (result.error.take(), fallback_result.error) {
                (Some(direct_err), Some(fallback_err)) => {
                    Some(format!("{}; fallback: {}", direct_err, fallback_err))
                }
                (direct_err, fallback_err) => fallback_err.or(direct_err),
            };
            result
        }
    }
}

#[async_trait]
impl Extractor for HybridExtractor {
    fn name(&self) -> &'static str {
        "hybrid"
    }

    fn kind(&self) -> ExtractorKind {
        ExtractorKind::Hybrid
    }

    async fn extract(&self, path: &Path, config: &ExtractionConfig) -> Result<ExtractionResult> {
        let started = Instant::now();
        let direct_result = self.direct.extract(path, config).await?;

        if Self::direct_is_sufficient(&direct_result, config.min_text_length) {
            let mut result = direct_result;
            result.method = ExtractionMethod::HybridDirect;
            result.processing_time = started.elapsed().as_secs_f64();
            return Ok(result);
        }

        let Some(fallback) = &self.fallback else {
            return Ok(direct_result);
        };

        tracing::info!(
            path = %path.display(),
            direct_chars = direct_result.characters_extracted(),
            threshold = config.min_text_length,
            fallback = fallback.name(),
            "direct pass below threshold, falling back"
        );

        let fallback_result = fallback.extract(path, config).await?;

        let mut result = Self::resolve_fallback(direct_result, fallback_result);
        result.processing_time = started.elapsed().as_secs_f64();
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PageText;
    use std::path::PathBuf;

    fn result_with_text(text: &str) -> ExtractionResult {
        let mut result = ExtractionResult::new(PathBuf::from("doc.pdf"), ExtractionMethod::Pdfium);
        result.pages = vec![PageText::new(1, text)];
        result.pages_processed = 1;
        result.total_pages = 1;
        result
    }

    #[test]
    fn test_sufficient_text_passes_threshold() {
        let result = result_with_text(&"a".repeat(50));
        assert!(HybridExtractor::direct_is_sufficient(&result, 50));
    }

    #[test]
    fn test_short_text_fails_threshold() {
        let result = result_with_text("curto");
        assert!(!HybridExtractor::direct_is_sufficient(&result, 50));
    }

    #[test]
    fn test_whitespace_does_not_count_toward_threshold() {
        let padded = format!("abc{}", " ".repeat(100));
        let result = result_with_text(&padded);
        assert!(!HybridExtractor::direct_is_sufficient(&result, 50));
    }

    #[test]
    fn test_errored_result_is_insufficient() {
        let mut result = result_with_text(&"a".repeat(100));
        result.error = Some("parse failed".to_string());
        assert!(!HybridExtractor::direct_is_sufficient(&result, 50));
    }

    fn errored_result(message: &str) -> ExtractionResult {
        let mut result = ExtractionResult::new(PathBuf::from("doc.pdf"), ExtractionMethod::TesseractOcr);
        result.error = Some(message.to_string());
        result
    }

    #[test]
    fn test_failed_fallback_keeps_partial_direct_text() {
        let direct = result_with_text("pouco texto");
        let resolved = HybridExtractor::resolve_fallback(direct, errored_result("sem tessdata"));
        assert_eq!(resolved.method, ExtractionMethod::HybridDirect);
        assert!(resolved.success());
        assert_eq!(resolved.full_text(), "pouco texto");
    }

    #[test]
    fn test_failed_fallback_error_survives_empty_direct_pass() {
        let direct = ExtractionResult::new(PathBuf::from("doc.pdf"), ExtractionMethod::Pdfium);
        let resolved = HybridExtractor::resolve_fallback(direct, errored_result("sem tessdata"));
        assert!(!resolved.success());
        assert_eq!(resolved.error.as_deref(), Some("sem tessdata"));
    }

    #[test]
    fn test_failed_fallback_merges_both_errors() {
        let mut direct = ExtractionResult::new(PathBuf::from("doc.pdf"), ExtractionMethod::Pdfium);
        direct.error = Some("parse falhou".to_string());
        let resolved = HybridExtractor::resolve_fallback(direct, errored_result("sem tessdata"));
        assert!(!resolved.success());
        assert_eq!(resolved.error.as_deref(), Some("parse falhou; fallback: sem tessdata"));
    }

    #[test]
    fn test_successful_fallback_remaps_method() {
        let direct = ExtractionResult::new(PathBuf::from("doc.pdf"), ExtractionMethod::Pdfium);
        let mut fallback = result_with_text("texto reconhecido");
        fallback.method = ExtractionMethod::TesseractOcr;
        let resolved = HybridExtractor::resolve_fallback(direct, fallback);
        assert_eq!(resolved.method, ExtractionMethod::HybridOcr);
        assert!(resolved.success());
    }

    #[test]
    fn test_new_requires_fallback_section() {
        let config = ExtractionConfig {
            ocr: None,
            ..Default::default()
        };
        assert!(HybridExtractor::new(&config).is_err());

        let config = ExtractionConfig {
            fallback: FallbackBackend::Vision,
            ..Default::default()
        };
        assert!(HybridExtractor::new(&config).is_err());
    }

    #[test]
    fn test_new_without_fallback() {
        let config = ExtractionConfig {
            fallback: FallbackBackend::None,
            ..Default::default()
        };
        let extractor = HybridExtractor::new(&config).unwrap();
        assert!(extractor.fallback.is_none());
    }
}
