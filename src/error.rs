//! Error types for the slugsaver library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`DealsError`] — **Fatal**: the run cannot proceed or cannot produce
//!   output (no extractor configured, bad configuration, nothing extracted,
//!   output directory not writable). Returned as `Err(DealsError)` from the
//!   top-level `extract*` and `write_outputs` functions.
//!
//! * [`FileError`] — **Non-fatal**: a single flyer failed (missing file,
//!   rejected API key, unparseable model output) but every other flyer is
//!   processed normally. Stored inside [`crate::output::FileReport`] so the
//!   caller sees exactly which inputs were skipped or failed.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the slugsaver library.
///
/// Per-file failures use [`FileError`] and are stored in
/// [`crate::output::FileReport`] rather than propagated here.
#[derive(Debug, Error)]
pub enum DealsError {
    // ── Setup errors ──────────────────────────────────────────────────────
    /// No extractor was supplied and no API key could be found.
    #[error("Extraction service is not configured.\n{hint}")]
    ExtractorNotConfigured { hint: String },

    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Result errors ─────────────────────────────────────────────────────
    /// Every input was skipped or failed, or every record lacked a price.
    #[error("No deals extracted ({failed} failed, {skipped} skipped)")]
    NoDeals { failed: usize, skipped: usize },

    // ── Output errors ─────────────────────────────────────────────────────
    /// Could not create the output directory.
    #[error("Failed to create output directory '{path}': {source}")]
    OutputDirFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Could not write one of the output files.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Deal records could not be serialised to JSON.
    #[error("Failed to serialise deals: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// A non-fatal error for a single input file.
///
/// Selection errors ([`FileError::is_selection`]) mean the file was skipped
/// before any request was made; everything else means the file was
/// attempted and failed. Either way the run continues with the next file.
#[derive(Debug, Clone, PartialEq, Error, serde::Serialize, serde::Deserialize)]
pub enum FileError {
    // ── Selection errors ──────────────────────────────────────────────────
    /// Path does not exist.
    #[error("'{path}' does not exist")]
    NotFound { path: PathBuf },

    /// Path does not carry a `.pdf` extension.
    #[error("'{path}' is not a .pdf file")]
    NotPdfExtension { path: PathBuf },

    /// Path is a directory or other non-regular file.
    #[error("'{path}' is not a regular file")]
    NotAFile { path: PathBuf },

    /// File has a `.pdf` extension but not the `%PDF` header.
    #[error("'{path}' is not a valid PDF (first bytes: {magic:?})")]
    NotAPdf { path: PathBuf, magic: [u8; 4] },

    // ── Encoding errors ───────────────────────────────────────────────────
    /// File could not be read into memory.
    #[error("Failed to read '{path}': {detail}")]
    ReadFailed { path: PathBuf, detail: String },

    // ── Service errors ────────────────────────────────────────────────────
    /// The service rejected the credential (HTTP 401/403).
    #[error("Authentication error from '{provider}': {detail}")]
    Auth { provider: String, detail: String },

    /// The service returned HTTP 429.
    #[error("Rate limit exceeded for '{provider}'{}", retry_hint(.retry_after_secs))]
    RateLimited {
        provider: String,
        retry_after_secs: Option<u64>,
    },

    /// The request did not complete within the configured timeout.
    #[error("Request to '{provider}' timed out after {secs}s")]
    Timeout { provider: String, secs: u64 },

    /// The service answered with a non-success status.
    #[error("API error from '{provider}' (HTTP {status}): {detail}")]
    Api {
        provider: String,
        status: u16,
        detail: String,
    },

    /// Connection, TLS or body-decoding failure.
    #[error("Transport error talking to '{provider}': {detail}")]
    Transport { provider: String, detail: String },

    /// The completion carried no text block.
    #[error("'{provider}' returned no text content")]
    EmptyCompletion { provider: String },

    // ── Output-parsing errors ─────────────────────────────────────────────
    /// Model output was not a JSON array even after repair.
    #[error("Model output is not a valid JSON array after repair: {detail}")]
    MalformedResponse { detail: String },
}

impl FileError {
    /// True for errors raised while selecting inputs, before any request.
    pub fn is_selection(&self) -> bool {
        matches!(
            self,
            FileError::NotFound { .. }
                | FileError::NotPdfExtension { .. }
                | FileError::NotAFile { .. }
                | FileError::NotAPdf { .. }
        )
    }
}

fn retry_hint(retry_after_secs: &Option<u64>) -> String {
    match retry_after_secs {
        Some(secs) => format!(" (retry after {secs}s)"),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_deals_display() {
        let e = DealsError::NoDeals {
            failed: 2,
            skipped: 1,
        };
        let msg = e.to_string();
        assert!(msg.contains("2 failed"), "got: {msg}");
        assert!(msg.contains("1 skipped"), "got: {msg}");
    }

    #[test]
    fn rate_limit_display_with_retry() {
        let e = FileError::RateLimited {
            provider: "anthropic".into(),
            retry_after_secs: Some(30),
        };
        let msg = e.to_string();
        assert!(msg.contains("anthropic"));
        assert!(msg.contains("retry after 30s"), "got: {msg}");
    }

    #[test]
    fn rate_limit_display_without_retry() {
        let e = FileError::RateLimited {
            provider: "anthropic".into(),
            retry_after_secs: None,
        };
        assert!(!e.to_string().contains("retry after"));
    }

    #[test]
    fn api_error_display() {
        let e = FileError::Api {
            provider: "anthropic".into(),
            status: 500,
            detail: "overloaded".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("HTTP 500"));
        assert!(msg.contains("overloaded"));
    }

    #[test]
    fn selection_errors_are_classified() {
        assert!(FileError::NotFound {
            path: "a.pdf".into()
        }
        .is_selection());
        assert!(FileError::NotPdfExtension {
            path: "a.txt".into()
        }
        .is_selection());
        assert!(!FileError::MalformedResponse {
            detail: "eof".into()
        }
        .is_selection());
        assert!(!FileError::Auth {
            provider: "anthropic".into(),
            detail: "invalid x-api-key".into()
        }
        .is_selection());
    }
}
