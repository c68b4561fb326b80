//! Pipeline configuration.
//!
//! Configuration is loaded from `garimpo.toml` (or JSON), discovered by
//! walking parent directories, then overridden by environment variables for
//! the deployment-specific values (API key, base paths, current project).

use crate::error::{GarimpoError, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

/// Environment variables honored by [`ExtractionConfig::apply_env`].
pub const ENV_OPENAI_API_KEY: &str = "OPENAI_API_KEY";
pub const ENV_PDF_BASE_PATH: &str = "PDF_BASE_PATH";
pub const ENV_RESULTS_BASE_PATH: &str = "RESULTS_BASE_PATH";
pub const ENV_CURRENT_PROJECT: &str = "CURRENT_PROJECT";
pub const ENV_MAX_CONCURRENT_API_CALLS: &str = "MAX_CONCURRENT_API_CALLS";
pub const ENV_CSV_CTRL_PATH: &str = "CSV_CTRL_PATH";

const CONFIG_FILE_NAME: &str = "garimpo.toml";

/// Backend used when a hybrid run falls below the text threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum FallbackBackend {
    #[default]
    Ocr,
    Vision,
    None,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrConfig {
    /// Tesseract language code.
    pub language: String,
    /// Rasterization DPI for OCR input.
    pub dpi: i32,
    /// Tesseract page segmentation mode.
    pub psm: u8,
    /// Cap on OCR'd pages per document; remaining pages are noted, not read.
    pub max_pages: Option<usize>,
    /// Explicit tesseract binary, when not on PATH.
    pub tesseract_cmd: Option<PathBuf>,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            language: "por".to_string(),
            dpi: 300,
            psm: 1,
            max_pages: None,
            tesseract_cmd: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VisionConfig {
    pub model: String,
    pub base_url: String,
    /// Set from the environment only, never serialized back out.
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    /// Concurrent chat-completion calls per document.
    pub max_concurrent_calls: usize,
    pub temperature: f64,
    /// Rasterization DPI for vision input.
    pub dpi: i32,
    /// Run the second completion that consolidates page texts into JSON.
    pub consolidate: bool,
}

impl Default for VisionConfig {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".to_string(),
            base_url: "https://api.openai.com/v1".to_string(),
            api_key: None,
            max_concurrent_calls: 50,
            temperature: 0.1,
            dpi: 300,
            consolidate: true,
        }
    }
}

/// Filesystem layout for project runs and the processing ledger.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Root directory containing one subdirectory of PDFs per project.
    pub pdf_base: Option<PathBuf>,
    /// Root directory receiving per-project result trees.
    pub results_base: Option<PathBuf>,
    pub current_project: Option<String>,
    /// CSV processing ledger; batch runs skip ledger bookkeeping when unset.
    pub ledger: Option<PathBuf>,
    /// Move finished project inputs into `Processados/` after a run.
    pub move_processed: bool,
}

/// Output artifact selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Txt,
    Json,
    Both,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Minimum trimmed text length for a direct pass to count as successful
    /// in hybrid mode.
    pub min_text_length: usize,
    /// Try the native text layer before any rasterizing backend.
    pub prefer_direct: bool,
    pub fallback: FallbackBackend,
    /// Files larger than this are skipped during discovery. Zero disables
    /// the cap.
    pub max_file_size_mb: u64,
    /// Concurrent file extractions; defaults to `2 * num_cpus`.
    pub max_concurrent_extractions: Option<usize>,
    pub output_format: OutputFormat,
    pub ocr: Option<OcrConfig>,
    pub vision: Option<VisionConfig>,
    pub paths: PathsConfig,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            min_text_length: 50,
            prefer_direct: true,
            fallback: FallbackBackend::Ocr,
            max_file_size_mb: 0,
            max_concurrent_extractions: None,
            output_format: OutputFormat::Txt,
            ocr: Some(OcrConfig::default()),
            vision: None,
            paths: PathsConfig::default(),
        }
    }
}

impl ExtractionConfig {
    pub fn from_toml_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content).map_err(|e| {
            GarimpoError::validation_with_source(format!("Invalid config file '{}'", path.display()), e)
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content).map_err(|e| {
            GarimpoError::validation_with_source(format!("Invalid config file '{}'", path.display()), e)
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Load a config file by extension (`.toml` or `.json`).
    pub fn from_file(path: &Path) -> Result<Self> {
        match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => Self::from_toml_file(path),
            Some("json") => Self::from_json_file(path),
            _ => Err(GarimpoError::validation(format!(
                "Unsupported config format: {}",
                path.display()
            ))),
        }
    }

    /// Walk from the current directory upward looking for `garimpo.toml`.
    ///
    /// Returns `None` when no config file exists anywhere up the tree.
    pub fn discover() -> Result<Option<Self>> {
        let start = env::current_dir()?;
        let mut dir: Option<&Path> = Some(start.as_path());

        while let Some(current) = dir {
            let candidate = current.join(CONFIG_FILE_NAME);
            if candidate.is_file() {
                return Self::from_toml_file(&candidate).map(Some);
            }
            dir = current.parent();
        }

        Ok(None)
    }

    /// Apply environment overrides on top of file-based configuration.
    pub fn apply_env(&mut self) {
        if let Ok(key) = env::var(ENV_OPENAI_API_KEY)
            && !key.is_empty()
        {
            self.vision.get_or_insert_with(VisionConfig::default).api_key = Some(key);
        }
        if let Ok(path) = env::var(ENV_PDF_BASE_PATH)
            && !path.is_empty()
        {
            self.paths.pdf_base = Some(PathBuf::from(path));
        }
        if let Ok(path) = env::var(ENV_RESULTS_BASE_PATH)
            && !path.is_empty()
        {
            self.paths.results_base = Some(PathBuf::from(path));
        }
        if let Ok(project) = env::var(ENV_CURRENT_PROJECT)
            && !project.is_empty()
        {
            self.paths.current_project = Some(project);
        }
        if let Ok(path) = env::var(ENV_CSV_CTRL_PATH)
            && !path.is_empty()
        {
            self.paths.ledger = Some(PathBuf::from(path));
        }
        if let Ok(raw) = env::var(ENV_MAX_CONCURRENT_API_CALLS)
            && let Ok(limit) = raw.parse::<usize>()
            && limit > 0
        {
            self.vision
                .get_or_insert_with(VisionConfig::default)
                .max_concurrent_calls = limit;
        }
    }

    /// Effective concurrent-extraction limit.
    pub fn concurrency_limit(&self) -> usize {
        self.max_concurrent_extractions
            .filter(|n| *n > 0)
            .unwrap_or_else(|| num_cpus::get() * 2)
    }

    /// Max file size cap in bytes, `None` when unlimited.
    pub fn max_file_size_bytes(&self) -> Option<u64> {
        if self.max_file_size_mb == 0 {
            None
        } else {
            Some(self.max_file_size_mb * 1024 * 1024)
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.min_text_length == 0 {
            return Err(GarimpoError::validation("min_text_length must be at least 1"));
        }
        if let Some(ocr) = &self.ocr {
            if ocr.dpi <= 0 {
                return Err(GarimpoError::validation("ocr.dpi must be positive"));
            }
            if ocr.language.is_empty() {
                return Err(GarimpoError::validation("ocr.language must not be empty"));
            }
        }
        if let Some(vision) = &self.vision {
            if vision.max_concurrent_calls == 0 {
                return Err(GarimpoError::validation(
                    "vision.max_concurrent_calls must be at least 1",
                ));
            }
            if !(0.0..=2.0).contains(&vision.temperature) {
                return Err(GarimpoError::validation(
                    "vision.temperature must be between 0.0 and 2.0",
                ));
            }
        }
        if self.fallback == FallbackBackend::Ocr && self.ocr.is_none() {
            return Err(GarimpoError::validation(
                "fallback is 'ocr' but no [ocr] section is configured",
            ));
        }
        if self.fallback == FallbackBackend::Vision && self.vision.is_none() {
            return Err(GarimpoError::validation(
                "fallback is 'vision' but no [vision] section is configured",
            ));
        }
        Ok(())
    }
}
