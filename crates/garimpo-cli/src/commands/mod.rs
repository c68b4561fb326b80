pub mod batch;
pub mod extract;
pub mod ledger;
pub mod project;

use crate::cli::ExtractionArgs;
use garimpo::{ExtractionConfig, OcrConfig};

/// Fold command-line extraction flags into the loaded configuration.
pub fn apply_extraction_args(config: &mut ExtractionConfig, args: &ExtractionArgs) {
    if let Some(format) = args.format {
        config.output_format = format.into();
    }
    if let Some(lang) = &args.ocr_lang {
        config.ocr.get_or_insert_with(OcrConfig::default).language = lang.clone();
    }
    if let Some(dpi) = args.ocr_dpi {
        config.ocr.get_or_insert_with(OcrConfig::default).dpi = dpi;
    }
}
