//! CSV processing ledger.
//!
//! One append-only CSV file records every processing attempt. Rows are keyed
//! by `(projeto, arquivo_pdf, hash_pdf)`; the last row for a key wins. A file
//! counts as already processed only when its key has a `success` row **and**
//! the recorded output file still exists, so deleting an output forces
//! reprocessing.

use crate::error::{GarimpoError, Result};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Duration;

const HASH_CHUNK_SIZE: usize = 8192;
const APPEND_RETRIES: u32 = 3;
const RETRY_BASE_DELAY_MS: u64 = 200;

/// Lifecycle state of a ledger row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LedgerStatus {
    /// Row written before extraction starts; marks an interrupted run when
    /// it is the last row for a key.
    Processing,
    Success,
    Error,
    /// Output exists on disk but no row was ever written; produced by
    /// [`Ledger::reconcile`].
    MissingInCsv,
}

impl std::fmt::Display for LedgerStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            LedgerStatus::Processing => "processing",
            LedgerStatus::Success => "success",
            LedgerStatus::Error => "error",
            LedgerStatus::MissingInCsv => "missing_in_csv",
        };
        write!(f, "{}", name)
    }
}

/// One row of the ledger. Column names are the CSV contract consumed by the
/// downstream review spreadsheets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    #[serde(rename = "projeto")]
    pub project: String,
    #[serde(rename = "arquivo_pdf")]
    pub pdf_file: String,
    #[serde(rename = "hash_pdf")]
    pub pdf_hash: String,
    #[serde(rename = "data_processamento")]
    pub processed_at: String,
    pub status: LedgerStatus,
    pub output_path: String,
}

impl LedgerEntry {
    pub fn new(
        project: impl Into<String>,
        pdf_file: impl Into<String>,
        pdf_hash: impl Into<String>,
        status: LedgerStatus,
        output_path: impl Into<String>,
    ) -> Self {
        Self {
            project: project.into(),
            pdf_file: pdf_file.into(),
            pdf_hash: pdf_hash.into(),
            processed_at: Utc::now().to_rfc3339(),
            status,
            output_path: output_path.into(),
        }
    }

    pub fn key(&self) -> LedgerKey {
        (self.project.clone(), self.pdf_file.clone(), self.pdf_hash.clone())
    }
}

pub type LedgerKey = (String, String, String);

/// Streaming SHA-256 of a file, hex-encoded.
pub fn hash_file(path: &Path) -> Result<String> {
    let mut file = std::fs::File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; HASH_CHUNK_SIZE];

    loop {
        let read = file.read(&mut buffer)?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }

    Ok(hex::encode(hasher.finalize()))
}

pub struct Ledger {
    path: PathBuf,
}

impl Ledger {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All rows, in file order. A missing ledger file is an empty ledger.
    pub fn load_entries(&self) -> Result<Vec<LedgerEntry>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let mut reader = csv::Reader::from_path(&self.path)
            .map_err(|e| GarimpoError::ledger_with_source(format!("Cannot read ledger '{}'", self.path.display()), e))?;

        let mut entries = Vec::new();
        for row in reader.deserialize() {
            match row {
                Ok(entry) => entries.push(entry),
                // One mangled row must not brick the whole batch.
                Err(err) => tracing::warn!(ledger = %self.path.display(), error = %err, "skipping malformed ledger row"),
            }
        }
        Ok(entries)
    }

    /// Last-row-wins index over the ledger.
    pub fn load_index(&self) -> Result<HashMap<LedgerKey, LedgerEntry>> {
        let mut index = HashMap::new();
        for entry in self.load_entries()? {
            index.insert(entry.key(), entry);
        }
        Ok(index)
    }

    /// Whether `key` was successfully processed and its output still exists.
    pub fn is_processed(index: &HashMap<LedgerKey, LedgerEntry>, key: &LedgerKey) -> bool {
        index
            .get(key)
            .is_some_and(|entry| entry.status == LedgerStatus::Success && Path::new(&entry.output_path).is_file())
    }

    /// Append one row, writing the header when the file is new.
    ///
    /// A row identical to an existing one in all six columns is dropped.
    /// Transient write failures are retried; if the ledger stays unwritable
    /// the row goes to a backup ledger in the temp directory so the record
    /// is never lost.
    pub fn append(&self, entry: &LedgerEntry) -> Result<()> {
        if self.path.exists() && self.load_entries()?.iter().any(|existing| existing == entry) {
            tracing::debug!(file = %entry.pdf_file, "duplicate ledger row, skipping append");
            return Ok(());
        }

        let mut attempt = 0u32;
        let last_err = loop {
            attempt += 1;
            match self.append_to(&self.path, entry) {
                Ok(()) => return Ok(()),
                Err(err) if attempt < APPEND_RETRIES => {
                    tracing::warn!(attempt, error = %err, "ledger append failed, retrying");
                    std::thread::sleep(Duration::from_millis(RETRY_BASE_DELAY_MS * u64::from(attempt)));
                }
                Err(err) => break err,
            }
        };

        let backup = self.backup_path();
        tracing::error!(
            ledger = %self.path.display(),
            backup = %backup.display(),
            error = %last_err,
            "ledger unwritable, appending to backup ledger"
        );
        self.append_to(&backup, entry)
    }

    fn append_to(&self, path: &Path, entry: &LedgerEntry) -> Result<()> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }

        let write_header = !path.exists() || std::fs::metadata(path)?.len() == 0;
        let file = std::fs::OpenOptions::new().create(true).append(true).open(path)?;
        let mut writer = csv::WriterBuilder::new().has_headers(write_header).from_writer(file);
        writer.serialize(entry)?;
        writer.flush()?;
        Ok(())
    }

    fn backup_path(&self) -> PathBuf {
        let name = self
            .path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "ledger".to_string());
        std::env::temp_dir().join(format!("{}.backup.csv", name))
    }

    /// Register PDFs under `dir` that have no ledger row.
    ///
    /// A file whose expected output exists gets a `success` row; otherwise a
    /// `missing_in_csv` row flags it for reprocessing review. Returns the
    /// number of rows appended.
    pub fn reconcile(
        &self,
        project: &str,
        dir: &Path,
        expected_output: impl Fn(&Path) -> PathBuf,
    ) -> Result<usize> {
        let index = self.load_index()?;
        let mut appended = 0;

        for entry in walkdir::WalkDir::new(dir).into_iter().filter_map(|e| e.ok()) {
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path();
            let is_pdf = path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e.eq_ignore_ascii_case("pdf"));
            if !is_pdf {
                continue;
            }

            let file_name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            let hash = hash_file(path)?;
            let key = (project.to_string(), file_name.clone(), hash.clone());
            if index.contains_key(&key) {
                continue;
            }

            let output = expected_output(path);
            let row = if output.is_file() {
                LedgerEntry::new(project, &file_name, &hash, LedgerStatus::Success, output.to_string_lossy())
            } else {
                LedgerEntry::new(project, &file_name, &hash, LedgerStatus::MissingInCsv, "")
            };
            self.append(&row)?;
            appended += 1;
        }

        tracing::info!(project, dir = %dir.display(), appended, "ledger reconciliation finished");
        Ok(appended)
    }

    /// Row counts per status, last row per key.
    pub fn status_counts(&self) -> Result<HashMap<LedgerStatus, usize>> {
        let mut counts = HashMap::new();
        for entry in self.load_index()?.into_values() {
            *counts.entry(entry.status).or_insert(0) += 1;
        }
        Ok(counts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_pdf(dir: &Path, name: &str, content: &[u8]) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_hash_file_known_value() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"abc").unwrap();
        let hash = hash_file(file.path()).unwrap();
        assert_eq!(
            hash,
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_hash_file_streams_large_input() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        // Larger than one hash chunk so the loop runs more than once.
        file.write_all(&vec![0x41u8; HASH_CHUNK_SIZE * 3 + 17]).unwrap();
        let hash = hash_file(file.path()).unwrap();
        assert_eq!(hash.len(), 64);
    }

    #[test]
    fn test_missing_ledger_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = Ledger::new(dir.path().join("controle.csv"));
        assert!(ledger.load_entries().unwrap().is_empty());
        assert!(ledger.load_index().unwrap().is_empty());
    }

    #[test]
    fn test_append_writes_header_once() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = Ledger::new(dir.path().join("controle.csv"));

        ledger
            .append(&LedgerEntry::new("proj", "a.pdf", "hash-a", LedgerStatus::Processing, ""))
            .unwrap();
        ledger
            .append(&LedgerEntry::new("proj", "a.pdf", "hash-a", LedgerStatus::Success, "/out/a.txt"))
            .unwrap();

        let content = std::fs::read_to_string(ledger.path()).unwrap();
        assert!(content.starts_with("projeto,arquivo_pdf,hash_pdf,data_processamento,status,output_path"));
        assert_eq!(content.matches("projeto,arquivo_pdf").count(), 1);
        assert_eq!(ledger.load_entries().unwrap().len(), 2);
    }

    #[test]
    fn test_append_drops_exact_duplicates() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = Ledger::new(dir.path().join("controle.csv"));
        let entry = LedgerEntry::new("proj", "a.pdf", "hash-a", LedgerStatus::Success, "/out/a.txt");

        ledger.append(&entry).unwrap();
        ledger.append(&entry).unwrap();

        assert_eq!(ledger.load_entries().unwrap().len(), 1);
    }

    #[test]
    fn test_last_row_wins_in_index() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = Ledger::new(dir.path().join("controle.csv"));

        ledger
            .append(&LedgerEntry::new("proj", "a.pdf", "hash-a", LedgerStatus::Processing, ""))
            .unwrap();
        ledger
            .append(&LedgerEntry::new("proj", "a.pdf", "hash-a", LedgerStatus::Error, ""))
            .unwrap();

        let index = ledger.load_index().unwrap();
        let key = ("proj".to_string(), "a.pdf".to_string(), "hash-a".to_string());
        assert_eq!(index.get(&key).unwrap().status, LedgerStatus::Error);
    }

    #[test]
    fn test_is_processed_requires_existing_output() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = Ledger::new(dir.path().join("controle.csv"));
        let output = dir.path().join("a.txt");
        std::fs::write(&output, "texto").unwrap();

        ledger
            .append(&LedgerEntry::new(
                "proj",
                "a.pdf",
                "hash-a",
                LedgerStatus::Success,
                output.to_string_lossy(),
            ))
            .unwrap();

        let key = ("proj".to_string(), "a.pdf".to_string(), "hash-a".to_string());
        let index = ledger.load_index().unwrap();
        assert!(Ledger::is_processed(&index, &key));

        // Deleting the output invalidates the success row.
        std::fs::remove_file(&output).unwrap();
        assert!(!Ledger::is_processed(&index, &key));
    }

    #[test]
    fn test_is_processed_ignores_error_rows() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = Ledger::new(dir.path().join("controle.csv"));
        ledger
            .append(&LedgerEntry::new("proj", "a.pdf", "hash-a", LedgerStatus::Error, ""))
            .unwrap();

        let key = ("proj".to_string(), "a.pdf".to_string(), "hash-a".to_string());
        let index = ledger.load_index().unwrap();
        assert!(!Ledger::is_processed(&index, &key));
    }

    #[test]
    fn test_changed_hash_is_not_processed() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = Ledger::new(dir.path().join("controle.csv"));
        let output = dir.path().join("a.txt");
        std::fs::write(&output, "texto").unwrap();

        ledger
            .append(&LedgerEntry::new(
                "proj",
                "a.pdf",
                "hash-old",
                LedgerStatus::Success,
                output.to_string_lossy(),
            ))
            .unwrap();

        let index = ledger.load_index().unwrap();
        let new_key = ("proj".to_string(), "a.pdf".to_string(), "hash-new".to_string());
        assert!(!Ledger::is_processed(&index, &new_key));
    }

    #[test]
    fn test_reconcile_registers_unledgered_files() {
        let dir = tempfile::tempdir().unwrap();
        let pdf_dir = dir.path().join("projeto");
        std::fs::create_dir_all(&pdf_dir).unwrap();
        write_pdf(&pdf_dir, "com_saida.pdf", b"%PDF-1.4 um");
        write_pdf(&pdf_dir, "sem_saida.pdf", b"%PDF-1.4 dois");

        let out_dir = dir.path().join("resultados");
        std::fs::create_dir_all(&out_dir).unwrap();
        std::fs::write(out_dir.join("com_saida.txt"), "ok").unwrap();

        let ledger = Ledger::new(dir.path().join("controle.csv"));
        let appended = ledger
            .reconcile("proj", &pdf_dir, |pdf| {
                out_dir.join(format!(
                    "{}.txt",
                    pdf.file_stem().unwrap().to_string_lossy()
                ))
            })
            .unwrap();

        assert_eq!(appended, 2);
        let entries = ledger.load_entries().unwrap();
        let by_name: HashMap<_, _> = entries.iter().map(|e| (e.pdf_file.clone(), e.status)).collect();
        assert_eq!(by_name["com_saida.pdf"], LedgerStatus::Success);
        assert_eq!(by_name["sem_saida.pdf"], LedgerStatus::MissingInCsv);

        // Second pass is a no-op.
        let again = ledger
            .reconcile("proj", &pdf_dir, |pdf| {
                out_dir.join(format!(
                    "{}.txt",
                    pdf.file_stem().unwrap().to_string_lossy()
                ))
            })
            .unwrap();
        assert_eq!(again, 0);
    }

    #[test]
    fn test_status_counts() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = Ledger::new(dir.path().join("controle.csv"));
        ledger
            .append(&LedgerEntry::new("p", "a.pdf", "h1", LedgerStatus::Success, "/out/a.txt"))
            .unwrap();
        ledger
            .append(&LedgerEntry::new("p", "b.pdf", "h2", LedgerStatus::Error, ""))
            .unwrap();
        ledger
            .append(&LedgerEntry::new("p", "c.pdf", "h3", LedgerStatus::Error, ""))
            .unwrap();

        let counts = ledger.status_counts().unwrap();
        assert_eq!(counts.get(&LedgerStatus::Success), Some(&1));
        assert_eq!(counts.get(&LedgerStatus::Error), Some(&2));
    }
}
