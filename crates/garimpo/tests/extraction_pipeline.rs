//! End-to-end pipeline tests over synthesized PDF fixtures.

use garimpo::batch::BatchProcessor;
use garimpo::{
    ExtractionConfig, ExtractionMethod, ExtractorKind, FallbackBackend, Ledger, LedgerStatus,
    OcrConfig, OutputFormat, PathsConfig, extract_file,
};
use lopdf::content::{Content, Operation};
use lopdf::{Document, Object, Stream, dictionary};
use std::path::{Path, PathBuf};

/// Build a one-page PDF whose text layer contains `text`.
fn build_pdf(text: &str) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });
    let content = Content {
        operations: vec![
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec!["F1".into(), 12.into()]),
            Operation::new("Td", vec![50.into(), 700.into()]),
            Operation::new("Tj", vec![Object::string_literal(text)]),
            Operation::new("ET", vec![]),
        ],
    };
    let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "Contents" => content_id,
        "Resources" => resources_id,
        "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
    });
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![page_id.into()],
            "Count" => 1,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).unwrap();
    bytes
}

fn write_fixture(dir: &Path, name: &str, text: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, build_pdf(text)).unwrap();
    path
}

const LONG_TEXT: &str = "Processo administrativo numero 4021 da comarca, \
autuado em 12 de marco, contendo relatorio completo da diligencia realizada.";

fn direct_only_config() -> ExtractionConfig {
    ExtractionConfig {
        fallback: FallbackBackend::None,
        ..Default::default()
    }
}

#[tokio::test]
async fn direct_extraction_reads_text_layer() {
    let dir = tempfile::tempdir().unwrap();
    let pdf = write_fixture(dir.path(), "doc.pdf", LONG_TEXT);

    let result = extract_file(&pdf, ExtractorKind::Direct, &direct_only_config())
        .await
        .unwrap();

    assert!(result.success(), "error: {:?}", result.error);
    assert_eq!(result.total_pages, 1);
    assert_eq!(result.pages_processed, 1);
    assert!(result.full_text().contains("Processo administrativo"));
}

#[tokio::test]
async fn hybrid_does_not_invoke_fallback_when_direct_suffices() {
    let dir = tempfile::tempdir().unwrap();
    let pdf = write_fixture(dir.path(), "doc.pdf", LONG_TEXT);

    // The fallback is OCR with a tesseract binary that cannot exist. If the
    // hybrid run touched the fallback, it would fail with MissingDependency
    // instead of succeeding.
    let config = ExtractionConfig {
        fallback: FallbackBackend::Ocr,
        ocr: Some(OcrConfig {
            tesseract_cmd: Some(PathBuf::from("/nonexistent/bin/tesseract")),
            ..Default::default()
        }),
        ..Default::default()
    };

    let result = extract_file(&pdf, ExtractorKind::Hybrid, &config).await.unwrap();
    assert!(result.success(), "error: {:?}", result.error);
    assert_eq!(result.method, ExtractionMethod::HybridDirect);
}

#[tokio::test]
async fn batch_writes_page_delimited_txt() {
    let dir = tempfile::tempdir().unwrap();
    write_fixture(dir.path(), "doc.pdf", LONG_TEXT);
    let out_dir = dir.path().join("out");

    let processor = BatchProcessor::new(ExtractionConfig {
        output_format: OutputFormat::Both,
        ..direct_only_config()
    });
    let (outcomes, stats) = processor
        .process_directory(dir.path(), ExtractorKind::Direct, false, &out_dir)
        .await
        .unwrap();

    assert_eq!(stats.succeeded, 1);
    assert_eq!(outcomes[0].outputs.len(), 2);

    let txt = std::fs::read_to_string(out_dir.join("doc.txt")).unwrap();
    assert!(txt.contains("=== PÁGINA 1 ==="));
    assert!(!txt.contains('\r'));
}

#[tokio::test]
async fn ledger_gated_batch_resumes_without_reprocessing() {
    let dir = tempfile::tempdir().unwrap();
    let pdf = write_fixture(dir.path(), "doc.pdf", LONG_TEXT);
    let out_dir = dir.path().join("out");
    let ledger_path = dir.path().join("controle.csv");

    let config = ExtractionConfig {
        paths: PathsConfig {
            ledger: Some(ledger_path.clone()),
            current_project: Some("lote_1".to_string()),
            ..Default::default()
        },
        ..direct_only_config()
    };

    let processor = BatchProcessor::new(config);
    let (_, first) = processor
        .process_files(vec![pdf.clone()], ExtractorKind::Direct, &out_dir)
        .await
        .unwrap();
    assert_eq!(first.succeeded, 1);

    let ledger = Ledger::new(&ledger_path);
    let entries = ledger.load_entries().unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].status, LedgerStatus::Processing);
    assert_eq!(entries[1].status, LedgerStatus::Success);
    assert!(Path::new(&entries[1].output_path).is_file());

    // Second run: same hash, success row, output present -> skipped.
    let (outcomes, second) = processor
        .process_files(vec![pdf.clone()], ExtractorKind::Direct, &out_dir)
        .await
        .unwrap();
    assert_eq!(second.skipped, 1);
    assert_eq!(second.succeeded, 0);
    assert!(outcomes[0].skipped);
    assert_eq!(ledger.load_entries().unwrap().len(), 2);

    // Deleting the output invalidates the success row and forces a rerun.
    std::fs::remove_file(&entries[1].output_path).unwrap();
    let (outcomes, third) = processor
        .process_files(vec![pdf], ExtractorKind::Direct, &out_dir)
        .await
        .unwrap();
    assert!(!outcomes[0].skipped);
    assert_eq!(third.succeeded, 1);
}

#[tokio::test]
async fn modified_file_gets_a_new_ledger_key() {
    let dir = tempfile::tempdir().unwrap();
    let pdf = write_fixture(dir.path(), "doc.pdf", LONG_TEXT);
    let out_dir = dir.path().join("out");
    let ledger_path = dir.path().join("controle.csv");

    let config = ExtractionConfig {
        paths: PathsConfig {
            ledger: Some(ledger_path.clone()),
            current_project: Some("lote_1".to_string()),
            ..Default::default()
        },
        ..direct_only_config()
    };

    let processor = BatchProcessor::new(config);
    processor
        .process_files(vec![pdf.clone()], ExtractorKind::Direct, &out_dir)
        .await
        .unwrap();

    // Rewrite the PDF with different content; the hash changes, so the old
    // success row no longer covers it.
    std::fs::write(&pdf, build_pdf("Conteudo substituido apos digitalizacao refeita do processo.")).unwrap();
    let (outcomes, stats) = processor
        .process_files(vec![pdf], ExtractorKind::Direct, &out_dir)
        .await
        .unwrap();

    assert!(!outcomes[0].skipped);
    assert_eq!(stats.succeeded, 1);
}
