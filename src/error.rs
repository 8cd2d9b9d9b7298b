//! Error types for the catalog2rows library.
//!
//! Only *fatal* failures surface as [`ExtractError`]: the run cannot produce
//! a meaningful result (bad input file, zero pages, unconfigured provider,
//! transport failure mid-call). Transient generation failures (empty model
//! output, JSON that never repairs) are absorbed where they happen: the
//! affected batch contributes no rows and the run continues. Those are
//! visible through `tracing` and the progress sink, never as `Err`.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the catalog2rows library.
#[derive(Debug, Error)]
pub enum ExtractError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("PDF file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'")]
    PermissionDenied { path: PathBuf },

    /// The input string is not a valid file path or URL.
    #[error("Invalid input '{input}': not a file path or a valid HTTP/HTTPS URL")]
    InvalidInput { input: String },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'")]
    DownloadTimeout { url: String, secs: u64 },

    /// The file exists and was read, but is not a PDF.
    #[error("File is not a valid PDF: '{path}'\nFirst bytes: {magic:?}")]
    NotAPdf { path: PathBuf, magic: [u8; 4] },

    // ── Rasterization errors ──────────────────────────────────────────────
    /// The external rasterizer failed to produce page images.
    #[error("Rasterization failed: {detail}\nIs poppler (pdftoppm) installed and on PATH?")]
    RasterizationFailed { detail: String },

    /// The document rasterized to zero pages.
    #[error("Document '{path}' produced no pages")]
    EmptyDocument { path: PathBuf },

    /// A rendered page image could not be read back from disk.
    ///
    /// This aborts the run: a batch with a missing image would silently
    /// misattribute rows to the wrong pages.
    #[error("Failed to read rendered image for page {page}: {source}")]
    ImageReadFailed {
        page: u32,
        #[source]
        source: std::io::Error,
    },

    // ── Model gateway errors ──────────────────────────────────────────────
    /// No model gateway could be resolved (missing API key etc.).
    #[error("Model provider '{provider}' is not configured.\n{hint}")]
    GatewayNotConfigured { provider: String, hint: String },

    /// The model API failed at the transport level.
    ///
    /// "No output" is not a transport failure; gateways report it as an
    /// empty response and the pipeline degrades that batch to no data.
    #[error("Model gateway error: {message}")]
    Gateway { message: String },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_a_pdf_display_includes_magic() {
        let e = ExtractError::NotAPdf {
            path: PathBuf::from("x.bin"),
            magic: *b"PK\x03\x04",
        };
        assert!(e.to_string().contains("x.bin"));
    }

    #[test]
    fn gateway_error_display() {
        let e = ExtractError::Gateway {
            message: "connection reset".into(),
        };
        assert!(e.to_string().contains("connection reset"));
    }

    #[test]
    fn image_read_failed_carries_page() {
        let e = ExtractError::ImageReadFailed {
            page: 7,
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        };
        assert!(e.to_string().contains("page 7"));
    }
}
