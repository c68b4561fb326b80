use crate::cli::ExtractionArgs;
use anyhow::{Context, Result, bail};
use garimpo::{ExtractionConfig, extract_file, output};
use std::path::Path;

pub async fn run(file: &Path, args: &ExtractionArgs, mut config: ExtractionConfig) -> Result<()> {
    super::apply_extraction_args(&mut config, args);

    let result = extract_file(file, args.kind.into(), &config)
        .await
        .with_context(|| format!("extraction failed for {}", file.display()))?;

    if !result.success() {
        bail!(
            "no text extracted from {}: {}",
            file.display(),
            result.error.as_deref().unwrap_or("document produced no text")
        );
    }

    let written = output::write_outputs(&result, &args.output, config.output_format)?;

    println!(
        "{}: {} de {} páginas, {} caracteres ({}, {:.1}s)",
        file.display(),
        result.pages_processed,
        result.total_pages,
        result.characters_extracted(),
        result.method,
        result.processing_time,
    );
    for path in written {
        println!("  -> {}", path.display());
    }

    Ok(())
}
