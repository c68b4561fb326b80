use crate::cli::KindArg;
use anyhow::{Context, Result, bail};
use garimpo::ExtractionConfig;
use garimpo::batch::project::ProjectRunner;

pub async fn run(name: Option<&str>, kind: KindArg, config: ExtractionConfig) -> Result<()> {
    let project = match name {
        Some(name) => name.to_string(),
        None => config
            .paths
            .current_project
            .clone()
            .context("no project name given and CURRENT_PROJECT is not set")?,
    };

    let runner = ProjectRunner::new(config);
    let (outcomes, stats) = runner
        .run(&project, kind.into())
        .await
        .with_context(|| format!("project run failed for '{}'", project))?;

    println!(
        "projeto {}: {} arquivos, {} extraídos, {} com erro, {} pulados ({:.1}s)",
        project,
        stats.processed,
        stats.succeeded,
        stats.failed,
        stats.skipped,
        stats.elapsed_seconds(),
    );

    for outcome in outcomes.iter().filter(|o| !o.skipped && !o.result.success()) {
        eprintln!(
            "  erro: {} ({})",
            outcome.path.display(),
            outcome.result.error.as_deref().unwrap_or("sem texto")
        );
    }

    if stats.failed > 0 && stats.succeeded == 0 && stats.skipped == 0 {
        bail!("all files failed");
    }
    Ok(())
}
