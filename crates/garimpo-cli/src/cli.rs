use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(
    name = "garimpo",
    version,
    about = "Batch PDF text extraction: native text layer, Tesseract OCR and vision-model backends with a resumable CSV ledger"
)]
pub struct Cli {
    /// Config file (garimpo.toml or .json); discovered from the current
    /// directory upward when omitted.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Verbose logging (-v debug, -vv trace).
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Only log errors.
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum KindArg {
    Auto,
    Direct,
    Ocr,
    Vision,
    Hybrid,
}

impl From<KindArg> for garimpo::ExtractorKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Auto => garimpo::ExtractorKind::Auto,
            KindArg::Direct => garimpo::ExtractorKind::Direct,
            KindArg::Ocr => garimpo::ExtractorKind::Ocr,
            KindArg::Vision => garimpo::ExtractorKind::Vision,
            KindArg::Hybrid => garimpo::ExtractorKind::Hybrid,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum FormatArg {
    Txt,
    Json,
    Both,
}

impl From<FormatArg> for garimpo::OutputFormat {
    fn from(format: FormatArg) -> Self {
        match format {
            FormatArg::Txt => garimpo::OutputFormat::Txt,
            FormatArg::Json => garimpo::OutputFormat::Json,
            FormatArg::Both => garimpo::OutputFormat::Both,
        }
    }
}

/// Extraction flags shared by `extract` and `batch`.
#[derive(Debug, Args)]
pub struct ExtractionArgs {
    /// Extraction backend.
    #[arg(short = 't', long = "type", value_enum, default_value = "auto")]
    pub kind: KindArg,

    /// Output directory.
    #[arg(short, long, default_value = "resultados")]
    pub output: PathBuf,

    /// Output artifacts to write.
    #[arg(short, long, value_enum)]
    pub format: Option<FormatArg>,

    /// Tesseract language code.
    #[arg(long)]
    pub ocr_lang: Option<String>,

    /// Rasterization DPI for OCR.
    #[arg(long)]
    pub ocr_dpi: Option<i32>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Extract text from a single PDF.
    Extract {
        /// PDF file to extract.
        file: PathBuf,

        #[command(flatten)]
        extraction: ExtractionArgs,
    },

    /// Process a directory of PDFs.
    Batch {
        /// Directory containing PDFs.
        directory: PathBuf,

        #[command(flatten)]
        extraction: ExtractionArgs,

        /// Concurrent extractions (default: 2x CPU count).
        #[arg(short, long)]
        workers: Option<usize>,

        /// Skip files larger than this many megabytes.
        #[arg(long)]
        max_file_size: Option<u64>,

        /// Do not descend into subdirectories.
        #[arg(long)]
        no_recursive: bool,

        /// List the files that would be processed, then exit.
        #[arg(long)]
        discover_only: bool,

        /// Write a JSON run report to this path.
        #[arg(long)]
        report: Option<PathBuf>,
    },

    /// Run the ledger-gated project pipeline.
    Project {
        /// Project name (defaults to CURRENT_PROJECT / paths.current_project).
        name: Option<String>,

        /// Extraction backend.
        #[arg(short = 't', long = "type", value_enum, default_value = "auto")]
        kind: KindArg,
    },

    /// Inspect and repair the processing ledger.
    Ledger {
        #[command(subcommand)]
        command: LedgerCommand,
    },
}

#[derive(Debug, Subcommand)]
pub enum LedgerCommand {
    /// Register PDFs under a directory that have no ledger row.
    Reconcile {
        /// Directory of PDFs to reconcile against the ledger.
        directory: PathBuf,

        /// Directory holding the expected outputs.
        #[arg(short, long)]
        output: PathBuf,

        /// Project name for the new rows.
        #[arg(short, long)]
        project: Option<String>,
    },

    /// Show row counts per status.
    Status,
}
