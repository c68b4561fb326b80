use crate::cli::ExtractionArgs;
use anyhow::{Context, Result, bail};
use garimpo::ExtractionConfig;
use garimpo::batch::{BatchProcessor, discover_pdfs, write_report};
use std::path::Path;

#[allow(clippy::too_many_arguments)]
pub async fn run(
    directory: &Path,
    args: &ExtractionArgs,
    workers: Option<usize>,
    max_file_size: Option<u64>,
    recursive: bool,
    discover_only: bool,
    report: Option<&Path>,
    mut config: ExtractionConfig,
) -> Result<()> {
    super::apply_extraction_args(&mut config, args);
    if let Some(workers) = workers {
        config.max_concurrent_extractions = Some(workers);
    }
    if let Some(cap) = max_file_size {
        config.max_file_size_mb = cap;
    }

    if discover_only {
        let files = discover_pdfs(directory, recursive, &config)?;
        for file in &files {
            println!("{}", file.display());
        }
        println!("{} arquivos", files.len());
        return Ok(());
    }

    let processor = BatchProcessor::new(config);
    let (outcomes, stats) = processor
        .process_directory(directory, args.kind.into(), recursive, &args.output)
        .await
        .with_context(|| format!("batch failed for {}", directory.display()))?;

    println!(
        "{} arquivos: {} extraídos, {} com erro, {} pulados ({:.1}s, {:.1}% de sucesso)",
        stats.processed,
        stats.succeeded,
        stats.failed,
        stats.skipped,
        stats.elapsed_seconds(),
        stats.success_rate(),
    );

    for outcome in outcomes.iter().filter(|o| !o.skipped && !o.result.success()) {
        eprintln!(
            "  erro: {} ({})",
            outcome.path.display(),
            outcome.result.error.as_deref().unwrap_or("sem texto")
        );
    }

    if let Some(report_path) = report {
        write_report(&outcomes, &stats, report_path)?;
        println!("relatório: {}", report_path.display());
    }

    if stats.failed > 0 && stats.succeeded == 0 && stats.skipped == 0 {
        bail!("all files failed");
    }
    Ok(())
}
