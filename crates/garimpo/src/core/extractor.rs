//! Top-level extraction entry points.
//!
//! The async functions are the primary API; the `_sync` variants run them on
//! a process-wide runtime for callers without one.

use crate::batch::BatchProcessor;
use crate::config::ExtractionConfig;
use crate::error::{GarimpoError, Result};
use crate::extractors::{ExtractorKind, create};
use crate::types::{ExtractionResult, FileOutcome, ProcessingStats};
use once_cell::sync::Lazy;
use std::path::{Path, PathBuf};

/// Shared runtime backing the sync wrappers.
static GLOBAL_RUNTIME: Lazy<tokio::runtime::Runtime> = Lazy::new(|| {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .expect("Failed to create global tokio runtime")
});

/// Extract one PDF with the requested backend.
pub async fn extract_file(path: &Path, kind: ExtractorKind, config: &ExtractionConfig) -> Result<ExtractionResult> {
    config.validate()?;
    let extractor = create(kind, config)?;
    extractor.extract(path, config).await
}

/// Extract many PDFs concurrently, writing artifacts into `output_dir`.
pub async fn batch_extract_files(
    files: Vec<PathBuf>,
    kind: ExtractorKind,
    config: &ExtractionConfig,
    output_dir: &Path,
) -> Result<(Vec<FileOutcome>, ProcessingStats)> {
    config.validate()?;
    let processor = BatchProcessor::new(config.clone());
    processor.process_files(files, kind, output_dir).await
}

/// Synchronous wrapper over [`extract_file`].
///
/// Must not be called from inside a tokio runtime; use the async API there.
pub fn extract_file_sync(path: &Path, kind: ExtractorKind, config: &ExtractionConfig) -> Result<ExtractionResult> {
    if tokio::runtime::Handle::try_current().is_ok() {
        return Err(GarimpoError::validation(
            "extract_file_sync called from within a tokio runtime; use extract_file instead",
        ));
    }
    GLOBAL_RUNTIME.block_on(extract_file(path, kind, config))
}

/// Synchronous wrapper over [`batch_extract_files`].
pub fn batch_extract_files_sync(
    files: Vec<PathBuf>,
    kind: ExtractorKind,
    config: &ExtractionConfig,
    output_dir: &Path,
) -> Result<(Vec<FileOutcome>, ProcessingStats)> {
    if tokio::runtime::Handle::try_current().is_ok() {
        return Err(GarimpoError::validation(
            "batch_extract_files_sync called from within a tokio runtime; use batch_extract_files instead",
        ));
    }
    GLOBAL_RUNTIME.block_on(batch_extract_files(files, kind, config, output_dir))
}
