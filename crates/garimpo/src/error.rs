//! Error types for garimpo.
//!
//! All fallible operations in the library return [`Result`], built on
//! [`GarimpoError`]. The error handling policy:
//!
//! - **System errors bubble up unchanged.** `GarimpoError::Io` wraps
//!   `std::io::Error` via `#[from]` and is never re-wrapped or suppressed;
//!   an IO failure aborts the operation that hit it.
//! - **Application errors carry context.** Parsing, OCR, vision and ledger
//!   failures wrap a message plus the underlying source error so callers can
//!   log the full chain.
use thiserror::Error;

/// Result type alias using `GarimpoError`.
pub type Result<T> = std::result::Result<T, GarimpoError>;

/// Main error type for all garimpo operations.
#[derive(Debug, Error)]
pub enum GarimpoError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("PDF error: {message}")]
    Pdf {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("OCR error: {message}")]
    Ocr {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Vision API error: {message}")]
    Vision {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Ledger error: {message}")]
    Ledger {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Validation error: {message}")]
    Validation {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Serialization error: {message}")]
    Serialization {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Missing dependency: {0}")]
    MissingDependency(String),

    #[error("{0}")]
    Other(String),
}

impl From<serde_json::Error> for GarimpoError {
    fn from(err: serde_json::Error) -> Self {
        GarimpoError::Serialization {
            message: err.to_string(),
            source: Some(Box::new(err)),
        }
    }
}

impl From<csv::Error> for GarimpoError {
    fn from(err: csv::Error) -> Self {
        GarimpoError::Ledger {
            message: err.to_string(),
            source: Some(Box::new(err)),
        }
    }
}

impl From<crate::pdf::error::PdfError> for GarimpoError {
    fn from(err: crate::pdf::error::PdfError) -> Self {
        GarimpoError::Pdf {
            message: err.to_string(),
            source: Some(Box::new(err)),
        }
    }
}

macro_rules! error_constructor {
    ($name:ident, $name_with_source:ident, $variant:ident) => {
        pub fn $name<S: Into<String>>(message: S) -> Self {
            Self::$variant {
                message: message.into(),
                source: None,
            }
        }

        pub fn $name_with_source<S: Into<String>, E: std::error::Error + Send + Sync + 'static>(
            message: S,
            source: E,
        ) -> Self {
            Self::$variant {
                message: message.into(),
                source: Some(Box::new(source)),
            }
        }
    };
}

impl GarimpoError {
    error_constructor!(pdf, pdf_with_source, Pdf);
    error_constructor!(ocr, ocr_with_source, Ocr);
    error_constructor!(vision, vision_with_source, Vision);
    error_constructor!(ledger, ledger_with_source, Ledger);
    error_constructor!(validation, validation_with_source, Validation);
    error_constructor!(serialization, serialization_with_source, Serialization);

    /// Whether this error indicates a transient condition worth retrying.
    pub fn is_transient(&self) -> bool {
        match self {
            GarimpoError::Io(err) => matches!(
                err.kind(),
                std::io::ErrorKind::PermissionDenied
                    | std::io::ErrorKind::WouldBlock
                    | std::io::ErrorKind::TimedOut
                    | std::io::ErrorKind::Interrupted
            ),
            GarimpoError::Vision { .. } => true,
            _ => false,
        }
    }
}
