//! Result types returned by both pipeline stages.
//!
//! Everything here derives `Serialize` so the CLI can emit it with `--json`.

use crate::error::FileError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Outcome of rendering a single HTML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileResult {
    /// Absolute path of the rendered HTML file.
    pub source: PathBuf,
    /// File stem used for image names.
    pub stem: String,
    /// Images written for this file, in page order.
    pub images: Vec<PathBuf>,
    /// Set when the file failed; images captured before the failure remain.
    pub error: Option<FileError>,
    pub duration_ms: u64,
}

impl FileResult {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Outcome of the render stage.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RenderReport {
    pub files: Vec<FileResult>,
    /// Patterns that failed during discovery, as `pattern: reason`.
    pub pattern_errors: Vec<String>,
    pub total_duration_ms: u64,
}

impl RenderReport {
    pub fn succeeded(&self) -> usize {
        self.files.iter().filter(|f| f.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.files.iter().filter(|f| !f.is_success()).count()
    }

    pub fn total_images(&self) -> usize {
        self.files.iter().map(|f| f.images.len()).sum()
    }
}

/// A deck written by the assembly stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeckResult {
    pub path: PathBuf,
    /// Group stem, or `combined_reports` for the combined deck.
    pub name: String,
    pub slides: usize,
    pub bytes: u64,
}

/// An image left out of every deck because it could not be decoded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkippedImage {
    pub path: PathBuf,
    pub reason: String,
}

/// Outcome of the deck assembly stage.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeckReport {
    /// Number of image groups found in the image directory.
    pub groups: usize,
    pub decks: Vec<DeckResult>,
    pub skipped_images: Vec<SkippedImage>,
    pub total_duration_ms: u64,
}

impl DeckReport {
    pub fn total_slides(&self) -> usize {
        self.decks.iter().map(|d| d.slides).sum()
    }
}

/// Both stages of a full run. Either side is `None` when its stage was not run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineSummary {
    pub render: Option<RenderReport>,
    pub decks: Option<DeckReport>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(images: usize, error: Option<FileError>) -> FileResult {
        FileResult {
            source: PathBuf::from("/r/a.html"),
            stem: "a".into(),
            images: (1..=images)
                .map(|i| PathBuf::from(format!("a_page_{i:02}.png")))
                .collect(),
            error,
            duration_ms: 0,
        }
    }

    #[test]
    fn render_report_tallies() {
        let report = RenderReport {
            files: vec![
                file(3, None),
                file(0, None),
                file(1, Some(FileError::NavigationTimeout { secs: 60 })),
            ],
            ..Default::default()
        };
        assert_eq!(report.succeeded(), 2);
        assert_eq!(report.failed(), 1);
        assert_eq!(report.total_images(), 4);
    }

    #[test]
    fn deck_report_total_slides() {
        let report = DeckReport {
            groups: 2,
            decks: vec![
                DeckResult {
                    path: "a.pptx".into(),
                    name: "a".into(),
                    slides: 3,
                    bytes: 10,
                },
                DeckResult {
                    path: "b.pptx".into(),
                    name: "b".into(),
                    slides: 2,
                    bytes: 10,
                },
            ],
            ..Default::default()
        };
        assert_eq!(report.total_slides(), 5);
    }
}
