//! # html2deck
//!
//! Render paginated HTML reports to high-resolution PNGs with headless Chrome,
//! then assemble the PNGs into PowerPoint decks.
//!
//! Reports are authored as styled HTML where every slide-sized block carries a
//! page-marker class (`.page` by default). Each marker becomes one image, and
//! each image becomes one full-bleed slide.
//!
//! ## Pipeline Overview
//!
//! ```text
//! *.html
//!  │
//!  ├─ 1. Discover  glob scan with exclude rules, sorted and deduplicated
//!  ├─ 2. Render    one Chrome per file (spawn_blocking, strictly sequential)
//!  │               └─ {images_dir}/{stem}_page_{NN}.png
//!  ├─ 3. Group     parse image names back into (stem, page)
//!  └─ 4. Assemble  {output_dir}/{stem}.pptx + combined_reports.pptx
//! ```
//!
//! The render and assemble stages share nothing but the image directory, so
//! [`render_images`] and [`build_decks`] can be run independently.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use html2deck::{convert, ConversionConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ConversionConfig::builder()
//!         .scan_root("reports")
//!         .output_dir("output")
//!         .build()?;
//!     let summary = convert(&config).await?;
//!     if let Some(render) = &summary.render {
//!         eprintln!("{} files rendered, {} failed", render.succeeded(), render.failed());
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `html2deck` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! html2deck = { version = "0.1", default-features = false }
//! ```
//!
//! ## Browser
//!
//! Rendering needs a local Chrome or Chromium. It is found through the
//! `CHROME` environment variable, then `PATH` and the usual install
//! locations, unless [`ConversionConfigBuilder::chrome_path`] names one.

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod convert;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod pptx;
pub mod progress;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ConfigFile, ConversionConfig, ConversionConfigBuilder, SlideSize, Viewport};
pub use convert::{build_decks, convert, convert_sync, convert_with, render_images, render_images_with, scan};
pub use error::{ConfigFileError, FileError, Html2DeckError};
pub use output::{DeckReport, DeckResult, FileResult, PipelineSummary, RenderReport, SkippedImage};
pub use pipeline::discover::Discovery;
pub use pipeline::session::{BrowserLauncher, ChromeLauncher, PageSession};
pub use progress::{ConversionProgressCallback, NoopProgressCallback, ProgressCallback};
