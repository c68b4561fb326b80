//! Batch discovery and processing.

pub mod project;

use crate::config::ExtractionConfig;
use crate::error::{GarimpoError, Result};
use crate::extractors::{Extractor, ExtractorKind, create};
use crate::ledger::{Ledger, LedgerEntry, LedgerKey, LedgerStatus, hash_file};
use crate::output::write_outputs;
use crate::types::{ExtractionMethod, ExtractionResult, FileOutcome, ProcessingStats};
use serde_json::json;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// Find PDF files under `dir`, sorted by path for deterministic batches.
///
/// Files above the configured size cap are skipped with a warning.
pub fn discover_pdfs(dir: &Path, recursive: bool, config: &ExtractionConfig) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(GarimpoError::validation(format!(
            "Not a directory: {}",
            dir.display()
        )));
    }

    let max_depth = if recursive { usize::MAX } else { 1 };
    let size_cap = config.max_file_size_bytes();
    let mut files = Vec::new();

    for entry in walkdir::WalkDir::new(dir).max_depth(max_depth) {
        let entry = entry.map_err(|e| {
            GarimpoError::validation_with_source(format!("Cannot walk directory '{}'", dir.display()), e)
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        let is_pdf = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("pdf"));
        if !is_pdf {
            continue;
        }

        if let Some(cap) = size_cap {
            let size = entry.metadata().map(|m| m.len()).unwrap_or(0);
            if size > cap {
                tracing::warn!(
                    path = %path.display(),
                    size_mb = size / (1024 * 1024),
                    cap_mb = cap / (1024 * 1024),
                    "skipping file above size cap"
                );
                continue;
            }
        }

        files.push(path.to_path_buf());
    }

    files.sort();
    Ok(files)
}

/// Shared ledger state for one batch run.
pub(crate) struct LedgerGate {
    ledger: Mutex<Ledger>,
    index: HashMap<LedgerKey, LedgerEntry>,
    project: String,
}

impl LedgerGate {
    pub(crate) fn open(config: &ExtractionConfig) -> Result<Option<Arc<Self>>> {
        let Some(path) = &config.paths.ledger else {
            return Ok(None);
        };
        let ledger = Ledger::new(path.clone());
        let index = ledger.load_index()?;
        let project = config
            .paths
            .current_project
            .clone()
            .unwrap_or_else(|| "default".to_string());
        Ok(Some(Arc::new(Self {
            ledger: Mutex::new(ledger),
            index,
            project,
        })))
    }

    pub(crate) fn key_for(&self, path: &Path) -> Result<LedgerKey> {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let hash = hash_file(path)?;
        Ok((self.project.clone(), file_name, hash))
    }

    pub(crate) fn already_processed(&self, key: &LedgerKey) -> bool {
        Ledger::is_processed(&self.index, key)
    }

    pub(crate) fn append(&self, key: &LedgerKey, status: LedgerStatus, output: &str) -> Result<()> {
        let entry = LedgerEntry::new(key.0.clone(), key.1.clone(), key.2.clone(), status, output);
        let ledger = self.ledger.lock().map_err(|e| GarimpoError::Other(format!("Ledger lock poisoned: {}", e)))?;
        ledger.append(&entry)
    }
}

pub struct BatchProcessor {
    config: Arc<ExtractionConfig>,
}

impl BatchProcessor {
    pub fn new(config: ExtractionConfig) -> Self {
        Self {
            config: Arc::new(config),
        }
    }

    pub fn config(&self) -> &ExtractionConfig {
        &self.config
    }

    /// Process `files` concurrently, writing artifacts into `output_dir`.
    ///
    /// Results come back in input order. Per-file extraction failures are
    /// captured in the corresponding result; an `Err` from this function
    /// means the batch itself could not run (IO failure, bad configuration).
    pub async fn process_files(
        &self,
        files: Vec<PathBuf>,
        kind: ExtractorKind,
        output_dir: &Path,
    ) -> Result<(Vec<FileOutcome>, ProcessingStats)> {
        let extractor: Arc<Box<dyn Extractor>> = Arc::new(create(kind, &self.config)?);
        let gate = LedgerGate::open(&self.config)?;
        let semaphore = Arc::new(Semaphore::new(self.config.concurrency_limit()));

        let mut stats = ProcessingStats::start(files.len());
        let mut join_set = JoinSet::new();

        for (index, path) in files.into_iter().enumerate() {
            let extractor = Arc::clone(&extractor);
            let config = Arc::clone(&self.config);
            let gate = gate.clone();
            let semaphore = Arc::clone(&semaphore);
            let output_dir = output_dir.to_path_buf();

            join_set.spawn(async move {
                let _permit = semaphore.acquire().await.expect("semaphore closed");
                let outcome = process_one(&path, extractor.as_ref().as_ref(), &config, gate.as_deref(), &output_dir).await;
                (index, outcome)
            });
        }

        let mut slots: Vec<Option<FileOutcome>> = (0..stats.total_files).map(|_| None).collect();
        while let Some(joined) = join_set.join_next().await {
            let (index, outcome) =
                joined.map_err(|e| GarimpoError::Other(format!("Batch task panicked: {}", e)))?;
            let outcome = outcome?;
            if outcome.skipped {
                stats.record_skipped();
            } else {
                stats.record(&outcome.result);
            }
            slots[index] = Some(outcome);
        }

        stats.finish();
        let outcomes = slots.into_iter().flatten().collect();
        Ok((outcomes, stats))
    }

    /// Discover and process every PDF under `dir`.
    pub async fn process_directory(
        &self,
        dir: &Path,
        kind: ExtractorKind,
        recursive: bool,
        output_dir: &Path,
    ) -> Result<(Vec<FileOutcome>, ProcessingStats)> {
        let files = discover_pdfs(dir, recursive, &self.config)?;
        tracing::info!(dir = %dir.display(), count = files.len(), "starting batch");
        self.process_files(files, kind, output_dir).await
    }
}

/// Process one file: ledger gate, extract, write artifacts, final ledger row.
async fn process_one(
    path: &Path,
    extractor: &dyn Extractor,
    config: &ExtractionConfig,
    gate: Option<&LedgerGate>,
    output_dir: &Path,
) -> Result<FileOutcome> {
    let key = match gate {
        Some(gate) => {
            let key = gate.key_for(path)?;
            if gate.already_processed(&key) {
                tracing::info!(path = %path.display(), "already in ledger with existing output, skipping");
                let result = ExtractionResult::new(path.to_path_buf(), ExtractionMethod::Pdfium);
                return Ok(FileOutcome {
                    path: path.to_path_buf(),
                    result,
                    outputs: Vec::new(),
                    skipped: true,
                });
            }
            gate.append(&key, LedgerStatus::Processing, "")?;
            Some(key)
        }
        None => None,
    };

    let result = match extractor.extract(path, config).await {
        Ok(result) => result,
        // IO errors abort the batch; anything else becomes a failed result.
        Err(GarimpoError::Io(err)) => return Err(err.into()),
        Err(err) => {
            let mut failed = ExtractionResult::new(path.to_path_buf(), ExtractionMethod::Pdfium);
            failed.error = Some(err.to_string());
            failed
        }
    };

    let outputs = if result.success() {
        write_outputs(&result, output_dir, config.output_format)?
    } else {
        Vec::new()
    };

    if let (Some(gate), Some(key)) = (gate, key) {
        let (status, output) = if result.success() {
            let first = outputs.first().map(|p| p.to_string_lossy().into_owned()).unwrap_or_default();
            (LedgerStatus::Success, first)
        } else {
            (LedgerStatus::Error, String::new())
        };
        gate.append(&key, status, &output)?;
    }

    Ok(FileOutcome {
        path: path.to_path_buf(),
        result,
        outputs,
        skipped: false,
    })
}

/// Write the batch report: run summary plus per-file detail and the list of
/// failed files.
pub fn write_report(outcomes: &[FileOutcome], stats: &ProcessingStats, path: &Path) -> Result<()> {
    let failed: Vec<_> = outcomes
        .iter()
        .filter(|o| !o.skipped && !o.result.success())
        .map(|o| {
            json!({
                "file": o.path,
                "error": o.result.error,
            })
        })
        .collect();

    let files: Vec<_> = outcomes
        .iter()
        .map(|o| {
            json!({
                "file": o.path,
                "skipped": o.skipped,
                "method": o.result.method,
                "pages_processed": o.result.pages_processed,
                "total_pages": o.result.total_pages,
                "characters": o.result.characters_extracted(),
                "processing_time": o.result.processing_time,
                "error": o.result.error,
                "outputs": o.outputs,
            })
        })
        .collect();

    let report = json!({
        "summary": {
            "total_files": stats.total_files,
            "processed": stats.processed,
            "succeeded": stats.succeeded,
            "failed": stats.failed,
            "skipped": stats.skipped,
            "total_characters": stats.total_characters,
            "elapsed_seconds": stats.elapsed_seconds(),
            "success_rate": stats.success_rate(),
            "files_per_second": stats.processing_speed(),
            "started_at": stats.started_at,
            "finished_at": stats.finished_at,
        },
        "files": files,
        "failed_files": failed,
    });

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, serde_json::to_string_pretty(&report)?)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FallbackBackend;
    use crate::types::PageText;

    fn no_fallback_config() -> ExtractionConfig {
        ExtractionConfig {
            fallback: FallbackBackend::None,
            ..Default::default()
        }
    }

    #[test]
    fn test_discover_rejects_missing_dir() {
        let result = discover_pdfs(Path::new("/nonexistent-dir"), true, &no_fallback_config());
        assert!(matches!(result, Err(GarimpoError::Validation { .. })));
    }

    #[test]
    fn test_discover_finds_pdfs_sorted() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.pdf"), b"%PDF").unwrap();
        std::fs::write(dir.path().join("a.PDF"), b"%PDF").unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"x").unwrap();

        let files = discover_pdfs(dir.path(), false, &no_fallback_config()).unwrap();
        assert_eq!(files.len(), 2);
        assert!(files[0].ends_with("a.PDF"));
        assert!(files[1].ends_with("b.pdf"));
    }

    #[test]
    fn test_discover_respects_recursion_flag() {
        let dir = tempfile::tempdir().unwrap();
        let sub = dir.path().join("sub");
        std::fs::create_dir(&sub).unwrap();
        std::fs::write(dir.path().join("top.pdf"), b"%PDF").unwrap();
        std::fs::write(sub.join("nested.pdf"), b"%PDF").unwrap();

        let config = no_fallback_config();
        assert_eq!(discover_pdfs(dir.path(), false, &config).unwrap().len(), 1);
        assert_eq!(discover_pdfs(dir.path(), true, &config).unwrap().len(), 2);
    }

    #[test]
    fn test_discover_applies_size_cap() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("small.pdf"), b"%PDF").unwrap();
        std::fs::write(dir.path().join("big.pdf"), vec![0u8; 2 * 1024 * 1024]).unwrap();

        let config = ExtractionConfig {
            max_file_size_mb: 1,
            fallback: FallbackBackend::None,
            ..Default::default()
        };
        let files = discover_pdfs(dir.path(), false, &config).unwrap();
        assert_eq!(files.len(), 1);
        assert!(files[0].ends_with("small.pdf"));
    }

    #[tokio::test]
    async fn test_process_files_captures_per_file_errors() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("broken.pdf"), b"not a real pdf").unwrap();

        let processor = BatchProcessor::new(no_fallback_config());
        let out_dir = dir.path().join("out");
        let (outcomes, stats) = processor
            .process_directory(dir.path(), ExtractorKind::Direct, false, &out_dir)
            .await
            .unwrap();

        assert_eq!(outcomes.len(), 1);
        assert_eq!(stats.failed, 1);
        assert!(!outcomes[0].result.success());
        assert!(outcomes[0].outputs.is_empty());
    }

    #[tokio::test]
    async fn test_ledger_gated_batch_skips_processed_files() {
        let dir = tempfile::tempdir().unwrap();
        let pdf = dir.path().join("doc.pdf");
        std::fs::write(&pdf, b"not a real pdf either").unwrap();

        let ledger_path = dir.path().join("controle.csv");
        let output = dir.path().join("doc.txt");
        std::fs::write(&output, "já extraído").unwrap();

        // Pre-seed a success row for the file's actual hash.
        let hash = hash_file(&pdf).unwrap();
        let ledger = Ledger::new(&ledger_path);
        ledger
            .append(&LedgerEntry::new(
                "proj",
                "doc.pdf",
                &hash,
                LedgerStatus::Success,
                output.to_string_lossy(),
            ))
            .unwrap();

        let config = ExtractionConfig {
            fallback: FallbackBackend::None,
            paths: crate::config::PathsConfig {
                ledger: Some(ledger_path.clone()),
                current_project: Some("proj".to_string()),
                ..Default::default()
            },
            ..Default::default()
        };

        let processor = BatchProcessor::new(config);
        let (outcomes, stats) = processor
            .process_files(vec![pdf], ExtractorKind::Direct, dir.path())
            .await
            .unwrap();

        assert!(outcomes[0].skipped);
        assert_eq!(stats.skipped, 1);
        assert_eq!(stats.failed, 0);
        // No new rows beyond the seeded one.
        assert_eq!(ledger.load_entries().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_ledger_gated_batch_records_error_rows() {
        let dir = tempfile::tempdir().unwrap();
        let pdf = dir.path().join("broken.pdf");
        std::fs::write(&pdf, b"garbage bytes").unwrap();
        let ledger_path = dir.path().join("controle.csv");

        let config = ExtractionConfig {
            fallback: FallbackBackend::None,
            paths: crate::config::PathsConfig {
                ledger: Some(ledger_path.clone()),
                current_project: Some("proj".to_string()),
                ..Default::default()
            },
            ..Default::default()
        };

        let processor = BatchProcessor::new(config);
        let (outcomes, _) = processor
            .process_files(vec![pdf], ExtractorKind::Direct, dir.path())
            .await
            .unwrap();
        assert!(!outcomes[0].result.success());

        let entries = Ledger::new(&ledger_path).load_entries().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].status, LedgerStatus::Processing);
        assert_eq!(entries[1].status, LedgerStatus::Error);
    }

    #[test]
    fn test_write_report() {
        let dir = tempfile::tempdir().unwrap();
        let mut result = ExtractionResult::new(PathBuf::from("a.pdf"), ExtractionMethod::Pdfium);
        result.pages = vec![PageText::new(1, "texto")];
        result.pages_processed = 1;
        result.total_pages = 1;

        let outcomes = vec![FileOutcome {
            path: PathBuf::from("a.pdf"),
            result,
            outputs: vec![PathBuf::from("a.txt")],
            skipped: false,
        }];
        let mut stats = ProcessingStats::start(1);
        stats.record(&outcomes[0].result);
        stats.finish();

        let report_path = dir.path().join("report.json");
        write_report(&outcomes, &stats, &report_path).unwrap();

        let parsed: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&report_path).unwrap()).unwrap();
        assert_eq!(parsed["summary"]["succeeded"], 1);
        assert_eq!(parsed["files"][0]["pages_processed"], 1);
        assert!(parsed["failed_files"].as_array().unwrap().is_empty());
    }
}
