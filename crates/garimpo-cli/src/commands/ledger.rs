use crate::cli::LedgerCommand;
use anyhow::{Context, Result};
use garimpo::{ExtractionConfig, Ledger};

pub fn run(command: &LedgerCommand, config: ExtractionConfig) -> Result<()> {
    let ledger_path = config
        .paths
        .ledger
        .clone()
        .context("no ledger configured (set paths.ledger or CSV_CTRL_PATH)")?;
    let ledger = Ledger::new(ledger_path);

    match command {
        LedgerCommand::Reconcile {
            directory,
            output,
            project,
        } => {
            let project = project
                .clone()
                .or_else(|| config.paths.current_project.clone())
                .unwrap_or_else(|| "default".to_string());
            let output = output.clone();

            let appended = ledger.reconcile(&project, directory, |pdf| {
                let stem = pdf
                    .file_stem()
                    .map(|s| s.to_string_lossy().into_owned())
                    .unwrap_or_default();
                output.join(&stem).join(format!("{}.txt", stem))
            })?;
            println!("{} linhas adicionadas ao ledger", appended);
        }
        LedgerCommand::Status => {
            let counts = ledger.status_counts()?;
            if counts.is_empty() {
                println!("ledger vazio: {}", ledger.path().display());
                return Ok(());
            }
            let mut rows: Vec<_> = counts.into_iter().collect();
            rows.sort_by_key(|(status, _)| status.to_string());
            for (status, count) in rows {
                println!("{:>8}  {}", count, status);
            }
        }
    }

    Ok(())
}
