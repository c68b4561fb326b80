//! Core data types shared across the extraction pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Text extracted from a single PDF page.
///
/// Page numbers are 1-indexed. Pages that yielded only whitespace are not
/// materialized as `PageText` entries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageText {
    pub number: usize,
    pub text: String,
}

impl PageText {
    pub fn new(number: usize, text: impl Into<String>) -> Self {
        Self {
            number,
            text: text.into(),
        }
    }
}

/// Which backend produced the text of an extraction result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionMethod {
    /// Native text layer via Pdfium.
    Pdfium,
    /// Native text layer via the lopdf fallback parser.
    Lopdf,
    /// Rasterized pages recognized by Tesseract.
    TesseractOcr,
    /// Rasterized pages described by a vision model.
    OpenAiVision,
    /// Hybrid run resolved by the direct pass.
    HybridDirect,
    /// Hybrid run that fell back to OCR.
    HybridOcr,
    /// Hybrid run that fell back to the vision model.
    HybridVision,
}

impl fmt::Display for ExtractionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ExtractionMethod::Pdfium => "pdfium",
            ExtractionMethod::Lopdf => "lopdf",
            ExtractionMethod::TesseractOcr => "tesseract_ocr",
            ExtractionMethod::OpenAiVision => "openai_vision",
            ExtractionMethod::HybridDirect => "hybrid_direct",
            ExtractionMethod::HybridOcr => "hybrid_ocr",
            ExtractionMethod::HybridVision => "hybrid_vision",
        };
        write!(f, "{}", name)
    }
}

/// Result of extracting one PDF file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionResult {
    pub file_path: PathBuf,
    pub pages: Vec<PageText>,
    pub method: ExtractionMethod,
    /// Pages that produced non-empty text.
    pub pages_processed: usize,
    /// Pages in the document.
    pub total_pages: usize,
    /// Wall-clock extraction time in seconds.
    pub processing_time: f64,
    /// Input file size in bytes.
    pub file_size: u64,
    /// Terminal error for this file, when extraction did not succeed.
    pub error: Option<String>,
    /// Consolidated JSON document produced by the vision backend, when
    /// consolidation is enabled.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub consolidated_json: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl ExtractionResult {
    pub fn new(file_path: PathBuf, method: ExtractionMethod) -> Self {
        Self {
            file_path,
            pages: Vec::new(),
            method,
            pages_processed: 0,
            total_pages: 0,
            processing_time: 0.0,
            file_size: 0,
            error: None,
            consolidated_json: None,
            timestamp: Utc::now(),
        }
    }

    /// An extraction counts as successful when it produced text and carries
    /// no terminal error.
    pub fn success(&self) -> bool {
        self.error.is_none() && !self.pages.is_empty()
    }

    pub fn characters_extracted(&self) -> usize {
        self.pages.iter().map(|p| p.text.len()).sum()
    }

    /// Fraction of pages that produced text, in `[0.0, 1.0]`.
    pub fn extraction_rate(&self) -> f64 {
        if self.total_pages == 0 {
            0.0
        } else {
            self.pages_processed as f64 / self.total_pages as f64
        }
    }

    /// Concatenated page text, in page order, separated by blank lines.
    pub fn full_text(&self) -> String {
        let mut out = String::new();
        for (idx, page) in self.pages.iter().enumerate() {
            if idx > 0 {
                out.push_str("\n\n");
            }
            out.push_str(&page.text);
        }
        out
    }
}

/// Aggregate statistics for a batch run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingStats {
    pub total_files: usize,
    pub processed: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
    pub total_characters: usize,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl ProcessingStats {
    pub fn start(total_files: usize) -> Self {
        Self {
            total_files,
            processed: 0,
            succeeded: 0,
            failed: 0,
            skipped: 0,
            total_characters: 0,
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    pub fn record(&mut self, result: &ExtractionResult) {
        self.processed += 1;
        if result.success() {
            self.succeeded += 1;
            self.total_characters += result.characters_extracted();
        } else {
            self.failed += 1;
        }
    }

    pub fn record_skipped(&mut self) {
        self.processed += 1;
        self.skipped += 1;
    }

    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    pub fn elapsed_seconds(&self) -> f64 {
        let end = self.finished_at.unwrap_or_else(Utc::now);
        (end - self.started_at).num_milliseconds() as f64 / 1000.0
    }

    pub fn success_rate(&self) -> f64 {
        let attempted = self.succeeded + self.failed;
        if attempted == 0 {
            0.0
        } else {
            self.succeeded as f64 / attempted as f64 * 100.0
        }
    }

    pub fn average_processing_time(&self) -> f64 {
        if self.processed == 0 {
            0.0
        } else {
            self.elapsed_seconds() / self.processed as f64
        }
    }

    /// Files per second over the whole run.
    pub fn processing_speed(&self) -> f64 {
        let secs = self.elapsed_seconds();
        if secs <= 0.0 {
            0.0
        } else {
            self.processed as f64 / secs
        }
    }
}

/// A processed file together with the artifacts written for it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileOutcome {
    pub path: PathBuf,
    pub result: ExtractionResult,
    /// Output files written (txt/json), empty when the file was skipped.
    pub outputs: Vec<PathBuf>,
    /// True when the ledger marked this file as already processed.
    pub skipped: bool,
}
