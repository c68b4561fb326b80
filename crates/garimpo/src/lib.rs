//! # garimpo
//!
//! Batch text extraction from PDFs for digitization pipelines.
//!
//! Three extraction backends, composable per run:
//!
//! - **direct** — the native text layer, via Pdfium with a lopdf fallback;
//! - **ocr** — page rasterization plus Tesseract;
//! - **vision** — page rasterization plus an OpenAI-compatible vision model;
//!
//! plus a **hybrid** mode that runs direct first and falls back to a
//! rasterizing backend when the text layer is too thin.
//!
//! Batch runs can be gated by a CSV [`ledger`](crate::ledger): every file is
//! keyed by `(project, file name, SHA-256)` and skipped when a `success` row
//! with an existing output already covers it, so interrupted batches resume
//! where they stopped.
//!
//! ```no_run
//! use garimpo::{ExtractionConfig, ExtractorKind, extract_file};
//! use std::path::Path;
//!
//! # async fn run() -> garimpo::Result<()> {
//! let config = ExtractionConfig::default();
//! let result = extract_file(Path::new("processo.pdf"), ExtractorKind::Hybrid, &config).await?;
//! println!("{} páginas, {} caracteres", result.pages_processed, result.characters_extracted());
//! # Ok(())
//! # }
//! ```

pub mod batch;
pub mod core;
pub mod error;
pub mod extractors;
pub mod ledger;
pub mod ocr;
pub mod output;
pub mod pdf;
pub mod types;
pub mod vision;

pub use crate::core::config;

pub use crate::config::{
    ExtractionConfig, FallbackBackend, OcrConfig, OutputFormat, PathsConfig, VisionConfig,
};
pub use crate::core::extractor::{
    batch_extract_files, batch_extract_files_sync, extract_file, extract_file_sync,
};
pub use crate::error::{GarimpoError, Result};
pub use crate::extractors::{Extractor, ExtractorKind};
pub use crate::ledger::{Ledger, LedgerEntry, LedgerStatus, hash_file};
pub use crate::types::{ExtractionMethod, ExtractionResult, FileOutcome, PageText, ProcessingStats};
