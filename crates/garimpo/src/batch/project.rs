//! Ledger-driven project pipeline.
//!
//! A project is a subdirectory of PDFs under the configured `pdf_base`.
//! Results land under `{results_base}/{project}/{stem}/`; the ledger gates
//! reprocessing, and finished project inputs can be moved aside into
//! `Processados/`.

use super::LedgerGate;
use crate::config::{ExtractionConfig, OutputFormat};
use crate::error::{GarimpoError, Result};
use crate::extractors::{Extractor, ExtractorKind, create};
use crate::ledger::LedgerStatus;
use crate::output::{sanitize, write_json, write_txt};
use crate::types::{ExtractionMethod, ExtractionResult, FileOutcome, ProcessingStats};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Directory that receives finished project inputs.
const PROCESSED_DIR_NAME: &str = "Processados";

pub struct ProjectRunner {
    config: ExtractionConfig,
}

impl ProjectRunner {
    pub fn new(config: ExtractionConfig) -> Self {
        Self { config }
    }

    /// Process every PDF of `project`, oldest first.
    ///
    /// Files are handled one at a time; the vision backend already fans out
    /// its API calls per page, so file-level concurrency would multiply
    /// in-flight requests past the configured limit.
    pub async fn run(&self, project: &str, kind: ExtractorKind) -> Result<(Vec<FileOutcome>, ProcessingStats)> {
        let pdf_base = self
            .config
            .paths
            .pdf_base
            .as_ref()
            .ok_or_else(|| GarimpoError::validation("Project runs require paths.pdf_base (PDF_BASE_PATH)"))?;
        let results_base = self
            .config
            .paths
            .results_base
            .as_ref()
            .ok_or_else(|| GarimpoError::validation("Project runs require paths.results_base (RESULTS_BASE_PATH)"))?;

        let project_dir = pdf_base.join(project);
        if !project_dir.is_dir() {
            return Err(GarimpoError::validation(format!(
                "Project directory does not exist: {}",
                project_dir.display()
            )));
        }
        let results_dir = results_base.join(project);

        let mut config = self.config.clone();
        config.paths.current_project = Some(project.to_string());
        let extractor = create(kind, &config)?;
        let gate = LedgerGate::open(&config)?;

        let files = collect_project_pdfs(&project_dir)?;
        tracing::info!(project, count = files.len(), "starting project run");

        let mut stats = ProcessingStats::start(files.len());
        let mut outcomes = Vec::with_capacity(files.len());

        for path in files {
            let outcome = self
                .process_project_file(&path, extractor.as_ref(), &config, gate.as_deref(), &results_dir)
                .await?;
            if outcome.skipped {
                stats.record_skipped();
            } else {
                stats.record(&outcome.result);
            }
            outcomes.push(outcome);
        }

        stats.finish();

        if self.config.paths.move_processed && stats.failed == 0 {
            move_to_processed(pdf_base, &project_dir, project)?;
        }

        tracing::info!(
            project,
            succeeded = stats.succeeded,
            failed = stats.failed,
            skipped = stats.skipped,
            "project run finished"
        );
        Ok((outcomes, stats))
    }

    async fn process_project_file(
        &self,
        path: &Path,
        extractor: &dyn Extractor,
        config: &ExtractionConfig,
        gate: Option<&LedgerGate>,
        results_dir: &Path,
    ) -> Result<FileOutcome> {
        let key = match gate {
            Some(gate) => {
                let key = gate.key_for(path)?;
                if gate.already_processed(&key) {
                    tracing::info!(path = %path.display(), "already processed, skipping");
                    return Ok(FileOutcome {
                        path: path.to_path_buf(),
                        result: ExtractionResult::new(path.to_path_buf(), ExtractionMethod::Pdfium),
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
            Err(GarimpoError::Io(err)) => return Err(err.into()),
            Err(err) => {
                let mut failed = ExtractionResult::new(path.to_path_buf(), ExtractionMethod::Pdfium);
                failed.error = Some(err.to_string());
                failed
            }
        };

        let outputs = if result.success() {
            write_project_outputs(&result, results_dir, config.output_format)?
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
}

/// Project PDFs sorted by modification time, oldest first, so interrupted
/// runs resume in arrival order.
fn collect_project_pdfs(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files: Vec<(SystemTime, PathBuf)> = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let is_pdf = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("pdf"));
        if !is_pdf {
            continue;
        }
        let modified = entry.metadata()?.modified().unwrap_or(SystemTime::UNIX_EPOCH);
        files.push((modified, path));
    }
    files.sort();
    Ok(files.into_iter().map(|(_, path)| path).collect())
}

/// Write the per-file result tree: `{results_dir}/{stem}/…`.
///
/// Vision results use the `openai_vision_*` naming consumed by the review
/// tooling: the consolidated model output goes to both
/// `openai_vision_{stem}.json` and `openai_json_{stem}.txt` (the reconcile
/// tooling globs the former). Without a consolidated payload the `.json`
/// artifact falls back to the full result mirror. Other backends write plain
/// `{stem}.txt` / `{stem}.json` per the configured format.
pub(crate) fn write_project_outputs(
    result: &ExtractionResult,
    results_dir: &Path,
    format: OutputFormat,
) -> Result<Vec<PathBuf>> {
    let stem = result
        .file_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());
    let file_dir = results_dir.join(&stem);
    std::fs::create_dir_all(&file_dir)?;

    let vision = matches!(
        result.method,
        ExtractionMethod::OpenAiVision | ExtractionMethod::HybridVision
    );

    let mut written = Vec::new();
    if vision {
        let txt_path = file_dir.join(format!("openai_vision_{}.txt", stem));
        write_txt(result, &txt_path)?;
        written.push(txt_path);

        let json_path = file_dir.join(format!("openai_vision_{}.json", stem));
        if let Some(consolidated) = &result.consolidated_json {
            std::fs::write(&json_path, sanitize(consolidated))?;
            written.push(json_path);

            let consolidated_path = file_dir.join(format!("openai_json_{}.txt", stem));
            std::fs::write(&consolidated_path, sanitize(consolidated))?;
            written.push(consolidated_path);
        } else {
            write_json(result, &json_path)?;
            written.push(json_path);
        }
    } else {
        if matches!(format, OutputFormat::Txt | OutputFormat::Both) {
            let txt_path = file_dir.join(format!("{}.txt", stem));
            write_txt(result, &txt_path)?;
            written.push(txt_path);
        }
        if matches!(format, OutputFormat::Json | OutputFormat::Both) {
            let json_path = file_dir.join(format!("{}.json", stem));
            write_json(result, &json_path)?;
            written.push(json_path);
        }
    }

    Ok(written)
}

/// Move a finished project's input directory under `Processados/`.
fn move_to_processed(pdf_base: &Path, project_dir: &Path, project: &str) -> Result<()> {
    let processed_root = pdf_base.join(PROCESSED_DIR_NAME);
    std::fs::create_dir_all(&processed_root)?;
    let target = processed_root.join(project);
    if target.exists() {
        return Err(GarimpoError::validation(format!(
            "Cannot archive project, target already exists: {}",
            target.display()
        )));
    }
    std::fs::rename(project_dir, &target)?;
    tracing::info!(project, target = %target.display(), "project inputs archived");
    Ok(())
}
