//! Native text-layer extraction.
//!
//! The primary backend is pdfium; [`extract_pages_lopdf`] is the secondary
//! parser used when pdfium produces nothing usable for a document.

use super::bindings::bind_pdfium;
use super::error::{PdfError, Result};
use pdfium_render::prelude::*;

pub struct PdfTextExtractor {
    pdfium: Pdfium,
}

impl PdfTextExtractor {
    pub fn new() -> Result<Self> {
        let binding = bind_pdfium(PdfError::TextExtractionFailed, "text extraction")?;

        let pdfium = Pdfium::new(binding);
        Ok(Self { pdfium })
    }

    /// Extract the text layer of every page, in page order.
    ///
    /// The returned vector has one entry per document page; pages without a
    /// text layer yield an empty string. A page whose text object cannot be
    /// read fails the whole document.
    pub fn extract_pages(&self, pdf_bytes: &[u8]) -> Result<Vec<String>> {
        let document = self.load_document(pdf_bytes)?;
        let page_count = document.pages().len() as usize;
        let mut pages = Vec::with_capacity(page_count);

        for page in document.pages().iter() {
            let text = page
                .text()
                .map_err(|e| PdfError::TextExtractionFailed(format!("Page text extraction failed: {}", e)))?;
            pages.push(text.all());
        }

        Ok(pages)
    }

    pub fn page_count(&self, pdf_bytes: &[u8]) -> Result<usize> {
        let document = self.load_document(pdf_bytes)?;
        Ok(document.pages().len() as usize)
    }

    fn load_document<'a>(&'a self, pdf_bytes: &'a [u8]) -> Result<PdfDocument<'a>> {
        self.pdfium.load_pdf_from_byte_slice(pdf_bytes, None).map_err(|e| {
            let err_msg = e.to_string();
            if err_msg.contains("password") || err_msg.contains("Password") {
                PdfError::PasswordRequired
            } else {
                PdfError::InvalidPdf(err_msg)
            }
        })
    }
}

/// Extract per-page text with lopdf.
///
/// Used as the fallback parser when pdfium yields no non-empty page. Pages
/// whose content streams fail to decode become empty strings rather than
/// failing the document; lopdf is the last resort before OCR and a partial
/// read is still useful.
pub fn extract_pages_lopdf(pdf_bytes: &[u8]) -> Result<Vec<String>> {
    let document = lopdf::Document::load_mem(pdf_bytes)?;
    let page_numbers: Vec<u32> = document.get_pages().keys().copied().collect();
    let mut pages = Vec::with_capacity(page_numbers.len());

    for number in page_numbers {
        match document.extract_text(&[number]) {
            Ok(text) => pages.push(text),
            Err(err) => {
                tracing::debug!(page = number, error = %err, "lopdf page decode failed, emitting empty page");
                pages.push(String::new());
            }
        }
    }

    Ok(pages)
}
