//! Output artifact formatting and writing.
//!
//! TXT output uses the `=== PÁGINA {n} ===` page delimiter expected by the
//! downstream review tooling; JSON output mirrors the full
//! [`ExtractionResult`].

use crate::config::OutputFormat;
use crate::error::Result;
use crate::types::ExtractionResult;
use std::path::{Path, PathBuf};

/// Strip characters that break downstream text consumers.
///
/// Removes NUL bytes and BOMs and normalizes CRLF/CR line endings to LF.
pub fn sanitize(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\u{0}' | '\u{feff}' => {}
            '\r' => {
                if chars.peek() == Some(&'\n') {
                    chars.next();
                }
                out.push('\n');
            }
            _ => out.push(c),
        }
    }
    out
}

/// Render a result as the page-delimited TXT artifact.
pub fn format_txt(result: &ExtractionResult) -> String {
    let file_name = result
        .file_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| result.file_path.display().to_string());

    let mut out = String::new();
    out.push_str(&format!("ARQUIVO: {}\n", file_name));
    out.push_str(&format!("DATA: {}\n", result.timestamp.to_rfc3339()));
    out.push_str(&format!("MÉTODO: {}\n", result.method));
    out.push_str(&format!(
        "PÁGINAS: {}/{}\n",
        result.pages_processed, result.total_pages
    ));
    out.push('\n');

    for page in &result.pages {
        out.push_str(&format!("=== PÁGINA {} ===\n", page.number));
        out.push_str(sanitize(&page.text).trim_end());
        out.push_str("\n\n");
    }

    if let Some(error) = &result.error {
        out.push_str(&format!("ERRO: {}\n", error));
    }

    out
}

/// Write the TXT artifact, creating parent directories.
pub fn write_txt(result: &ExtractionResult, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, format_txt(result))?;
    Ok(())
}

/// Write the JSON mirror of the result, creating parent directories.
pub fn write_json(result: &ExtractionResult, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(result)?;
    std::fs::write(path, json)?;
    Ok(())
}

/// Write the artifacts selected by `format` into `dir`, named after the
/// input file's stem. Returns the paths written.
pub fn write_outputs(result: &ExtractionResult, dir: &Path, format: OutputFormat) -> Result<Vec<PathBuf>> {
    let stem = result
        .file_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());

    let mut written = Vec::new();
    if matches!(format, OutputFormat::Txt | OutputFormat::Both) {
        let path = dir.join(format!("{}.txt", stem));
        write_txt(result, &path)?;
        written.push(path);
    }
    if matches!(format, OutputFormat::Json | OutputFormat::Both) {
        let path = dir.join(format!("{}.json", stem));
        write_json(result, &path)?;
        written.push(path);
    }
    Ok(written)
}
