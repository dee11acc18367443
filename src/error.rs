//! Error types for the html2deck library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`Html2DeckError`] — **Fatal**: the run cannot proceed at all (output
//!   directory cannot be created, no browser to launch, image directory
//!   missing). Returned as `Err(Html2DeckError)` from the top-level
//!   functions in [`crate::convert`].
//!
//! * [`FileError`] — **Non-fatal**: a single HTML file failed to render
//!   (navigation timeout, browser crash) but every other file is fine.
//!   Stored inside [`crate::output::FileResult`] so callers can inspect
//!   partial success rather than losing the whole run to one bad report.
//!
//! Per-image decode failures during deck assembly are recorded as
//! [`crate::output::SkippedImage`] entries and never surface as errors.

use crate::pptx::PackageError;
use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the html2deck library.
#[derive(Debug, Error)]
pub enum Html2DeckError {
    // ── Output errors ─────────────────────────────────────────────────────
    /// An output directory could not be created.
    #[error("Cannot create output directory '{path}': {source}")]
    OutputDirCreate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The image directory does not exist, so there is nothing to assemble.
    #[error("Images directory not found: '{path}'\nRun the HTML to images stage first.")]
    ImagesDirNotFound { path: PathBuf },

    /// The image directory exists but could not be listed.
    #[error("Failed to read images directory '{path}': {source}")]
    ImagesDirUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A presentation package could not be written.
    #[error("Failed to write deck '{path}': {source}")]
    DeckWriteFailed {
        path: PathBuf,
        #[source]
        source: PackageError,
    },

    // ── Browser errors ────────────────────────────────────────────────────
    /// No Chrome/Chromium executable could be found or started.
    #[error(
        "Headless browser is unavailable: {detail}\n\n\
A local Chrome or Chromium installation is required for rendering.\n\
  • Install Chrome/Chromium and make sure it is on PATH, or\n\
  • Point CHROME at the executable, or pass --chrome /path/to/chrome.\n"
    )]
    BrowserUnavailable { detail: String },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal error for a single HTML file.
///
/// Stored alongside [`crate::output::FileResult`] when a file fails.
/// The run continues with the next file.
#[derive(Debug, Clone, Error, serde::Serialize, serde::Deserialize)]
pub enum FileError {
    /// The browser session could not be started for this file.
    #[error("browser launch failed: {detail}")]
    Launch { detail: String },

    /// The page did not finish loading within the navigation timeout.
    #[error("navigation timed out after {secs}s")]
    NavigationTimeout { secs: u64 },

    /// Navigation failed outright (bad URL, renderer crash).
    #[error("navigation failed: {detail}")]
    Navigation { detail: String },

    /// Querying or screenshotting a page-marker element failed.
    #[error("capture of page {page} failed: {detail}")]
    Capture { page: usize, detail: String },

    /// The captured PNG could not be written to disk.
    #[error("writing '{path}' failed: {detail}")]
    Write { path: PathBuf, detail: String },

    /// The render task died unexpectedly.
    #[error("render task aborted: {detail}")]
    Internal { detail: String },
}

/// A malformed or unreadable configuration file.
///
/// Never fatal: the caller logs it and continues with defaults.
#[derive(Debug, Error)]
pub enum ConfigFileError {
    #[error("cannot read config file '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed config file '{path}': {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn navigation_timeout_display() {
        let e = FileError::NavigationTimeout { secs: 60 };
        assert!(e.to_string().contains("60s"), "got: {e}");
    }

    #[test]
    fn capture_display_names_page() {
        let e = FileError::Capture {
            page: 3,
            detail: "node detached".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("page 3"));
        assert!(msg.contains("node detached"));
    }

    #[test]
    fn browser_unavailable_has_hint() {
        let e = Html2DeckError::BrowserUnavailable {
            detail: "no chrome on PATH".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("no chrome on PATH"));
        assert!(msg.contains("--chrome"));
    }

    #[test]
    fn images_dir_not_found_display() {
        let e = Html2DeckError::ImagesDirNotFound {
            path: PathBuf::from("output/images"),
        };
        assert!(e.to_string().contains("output/images"));
    }

    #[test]
    fn file_error_roundtrips_through_json() {
        let e = FileError::Write {
            path: PathBuf::from("out/a_page_01.png"),
            detail: "disk full".into(),
        };
        let json = serde_json::to_string(&e).unwrap();
        let back: FileError = serde_json::from_str(&json).unwrap();
        assert_eq!(back.to_string(), e.to_string());
    }
}
