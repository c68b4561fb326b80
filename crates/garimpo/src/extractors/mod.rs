//! Extraction backends.
//!
//! Each backend implements [`Extractor`]; [`create`] resolves the requested
//! kind to a backend given the active configuration.

mod direct;
mod hybrid;
mod ocr;
mod vision;

pub use direct::DirectExtractor;
pub use hybrid::HybridExtractor;
pub use ocr::OcrExtractor;
pub use vision::VisionExtractor;

use crate::config::{ExtractionConfig, FallbackBackend};
use crate::error::{GarimpoError, Result};
use crate::types::ExtractionResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;

/// Requested extraction backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ExtractorKind {
    /// Resolve from configuration: hybrid when a fallback backend is
    /// configured, direct otherwise.
    #[default]
    Auto,
    Direct,
    Ocr,
    Vision,
    Hybrid,
}

impl FromStr for ExtractorKind {
    type Err = GarimpoError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "auto" => Ok(ExtractorKind::Auto),
            "direct" => Ok(ExtractorKind::Direct),
            "ocr" => Ok(ExtractorKind::Ocr),
            "vision" => Ok(ExtractorKind::Vision),
            "hybrid" => Ok(ExtractorKind::Hybrid),
            other => Err(GarimpoError::validation(format!(
                "Unknown extractor type '{}' (expected auto, direct, ocr, vision or hybrid)",
                other
            ))),
        }
    }
}

impl std::fmt::Display for ExtractorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ExtractorKind::Auto => "auto",
            ExtractorKind::Direct => "direct",
            ExtractorKind::Ocr => "ocr",
            ExtractorKind::Vision => "vision",
            ExtractorKind::Hybrid => "hybrid",
        };
        write!(f, "{}", name)
    }
}

/// A PDF text extraction backend.
#[async_trait]
pub trait Extractor: Send + Sync {
    fn name(&self) -> &'static str;

    fn kind(&self) -> ExtractorKind;

    /// Extract text from one PDF.
    ///
    /// Backend failures that leave partial output are recorded in the
    /// result's `error` field; only IO errors and configuration problems
    /// surface as `Err`.
    async fn extract(&self, path: &Path, config: &ExtractionConfig) -> Result<ExtractionResult>;
}

/// Resolve `kind` to a backend.
pub fn create(kind: ExtractorKind, config: &ExtractionConfig) -> Result<Box<dyn Extractor>> {
    let resolved = match kind {
        ExtractorKind::Auto => {
            if config.fallback == FallbackBackend::None {
                ExtractorKind::Direct
            } else {
                ExtractorKind::Hybrid
            }
        }
        other => other,
    };

    match resolved {
        ExtractorKind::Direct => Ok(Box::new(DirectExtractor::new())),
        ExtractorKind::Ocr => {
            if config.ocr.is_none() {
                return Err(GarimpoError::validation(
                    "OCR extraction requested but no [ocr] section is configured",
                ));
            }
            Ok(Box::new(OcrExtractor::new()))
        }
        ExtractorKind::Vision => {
            let vision = config
                .vision
                .as_ref()
                .ok_or_else(|| GarimpoError::validation("Vision extraction requested but no [vision] section is configured"))?;
            Ok(Box::new(VisionExtractor::new(vision)?))
        }
        ExtractorKind::Hybrid => Ok(Box::new(HybridExtractor::new(config)?)),
        ExtractorKind::Auto => unreachable!("Auto is resolved above"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_from_str() {
        assert_eq!("direct".parse::<ExtractorKind>().unwrap(), ExtractorKind::Direct);
        assert_eq!("HYBRID".parse::<ExtractorKind>().unwrap(), ExtractorKind::Hybrid);
        assert!("pdfminer".parse::<ExtractorKind>().is_err());
    }

    #[test]
    fn test_kind_display_round_trip() {
        for kind in [
            ExtractorKind::Auto,
            ExtractorKind::Direct,
            ExtractorKind::Ocr,
            ExtractorKind::Vision,
            ExtractorKind::Hybrid,
        ] {
            assert_eq!(kind.to_string().parse::<ExtractorKind>().unwrap(), kind);
        }
    }

    #[test]
    fn test_create_auto_resolves_to_hybrid_with_fallback() {
        let config = ExtractionConfig::default();
        let extractor = create(ExtractorKind::Auto, &config).unwrap();
        assert_eq!(extractor.kind(), ExtractorKind::Hybrid);
    }

    #[test]
    fn test_create_auto_resolves_to_direct_without_fallback() {
        let config = ExtractionConfig {
            fallback: FallbackBackend::None,
            ..Default::default()
        };
        let extractor = create(ExtractorKind::Auto, &config).unwrap();
        assert_eq!(extractor.kind(), ExtractorKind::Direct);
    }

    #[test]
    fn test_create_ocr_requires_config() {
        let config = ExtractionConfig {
            ocr: None,
            fallback: FallbackBackend::None,
            ..Default::default()
        };
        assert!(create(ExtractorKind::Ocr, &config).is_err());
    }

    #[test]
    fn test_create_vision_requires_config() {
        let config = ExtractionConfig::default();
        assert!(create(ExtractorKind::Vision, &config).is_err());
    }
}
