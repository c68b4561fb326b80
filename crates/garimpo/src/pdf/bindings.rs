//! Lazy, process-wide Pdfium initialization.

use super::error::PdfError;
use once_cell::sync::Lazy;
use pdfium_render::prelude::*;
use std::sync::Mutex;

/// Cached outcome of the first binding attempt.
///
/// Binding probes the working directory first (a pdfium shared library next
/// to the binary), then falls back to the system library. Only the outcome is
/// cached: bindings themselves are created fresh per call because
/// `Box<dyn PdfiumLibraryBindings>` is not `Clone`.
enum InitializationState {
    Uninitialized,
    Initialized,
    Failed(String),
}

/// Initialization is protected by a `Mutex` so only one thread performs the
/// first probe while others wait for the cached state.
static PDFIUM_STATE: Lazy<Mutex<InitializationState>> =
    Lazy::new(|| Mutex::new(InitializationState::Uninitialized));

fn bind_pdfium_impl() -> std::result::Result<Box<dyn PdfiumLibraryBindings>, String> {
    Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
        .or_else(|_| Pdfium::bind_to_system_library())
        .map_err(|e| format!("Failed to initialize Pdfium: {}", e))
}

/// Get Pdfium bindings, initializing on first use.
///
/// `map_err` maps failure strings to the caller's `PdfError` variant so text
/// extraction and rendering report initialization failures in their own terms.
pub(crate) fn bind_pdfium(
    map_err: fn(String) -> PdfError,
    context: &'static str,
) -> std::result::Result<Box<dyn PdfiumLibraryBindings>, PdfError> {
    let mut state = PDFIUM_STATE
        .lock()
        .map_err(|e| map_err(format!("Failed to acquire lock on Pdfium state ({}): {}", context, e)))?;

    match &*state {
        InitializationState::Uninitialized => match bind_pdfium_impl() {
            Ok(bindings) => {
                *state = InitializationState::Initialized;
                return Ok(bindings);
            }
            Err(err) => {
                *state = InitializationState::Failed(err.clone());
                return Err(map_err(format!(
                    "Pdfium initialization failed ({}): {}",
                    context, err
                )));
            }
        },
        InitializationState::Failed(err) => {
            return Err(map_err(format!(
                "Pdfium initialization previously failed ({}): {}",
                context, err
            )));
        }
        InitializationState::Initialized => {}
    }

    bind_pdfium_impl().map_err(|e| map_err(format!("Failed to create Pdfium bindings ({}): {}", context, e)))
}
