//! PDF parsing and rasterization backends.

pub mod error;

mod bindings;
pub mod rendering;
pub mod text;

pub use error::PdfError;
pub use rendering::{PageRenderOptions, PdfRenderer, encode_png};
pub use text::{PdfTextExtractor, extract_pages_lopdf};
