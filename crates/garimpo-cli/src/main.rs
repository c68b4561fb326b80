mod cli;
mod commands;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Command};
use garimpo::ExtractionConfig;
use tracing_subscriber::EnvFilter;

fn init_logging(verbose: u8, quiet: bool) {
    let default_level = if quiet {
        "error"
    } else {
        match verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("garimpo={0},garimpo_cli={0}", default_level)));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(cli: &Cli) -> Result<ExtractionConfig> {
    let mut config = match &cli.config {
        Some(path) => ExtractionConfig::from_file(path)?,
        None => ExtractionConfig::discover()?.unwrap_or_default(),
    };
    config.apply_env();
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);
    let config = load_config(&cli)?;

    match cli.command {
        Command::Extract { ref file, ref extraction } => {
            commands::extract::run(file, extraction, config).await
        }
        Command::Batch {
            ref directory,
            ref extraction,
            workers,
            max_file_size,
            no_recursive,
            discover_only,
            ref report,
        } => {
            commands::batch::run(
                directory,
                extraction,
                workers,
                max_file_size,
                !no_recursive,
                discover_only,
                report.as_deref(),
                config,
            )
            .await
        }
        Command::Project { ref name, kind } => commands::project::run(name.as_deref(), kind, config).await,
        Command::Ledger { ref command } => commands::ledger::run(command, config),
    }
}
