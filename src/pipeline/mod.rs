//! Pipeline stages for HTML-to-deck conversion.
//!
//! Each submodule implements exactly one step. The two heavy stages talk only
//! through files on disk, so either can run on its own.
//!
//! ## Data Flow
//!
//! ```text
//! discover ──▶ render ──────────▶ {images_dir}/*.png ──▶ deck ──▶ *.pptx
//! (globs)      (headless Chrome)   (naming convention)    (pptx writer)
//! ```
//!
//! 1. [`discover`] — expand scan globs and drop excluded paths
//! 2. [`render`]   — one browser session per file, one PNG per page marker;
//!    runs in `spawn_blocking` because `headless_chrome` blocks
//! 3. [`session`]  — the browser seam: [`session::ChromeLauncher`] in
//!    production, scripted fakes in tests
//! 4. [`naming`]   — `{stem}_page_{NN}.png`, written by render, parsed by deck
//! 5. [`deck`]     — group images by stem and place each one on a slide

pub mod deck;
pub mod discover;
pub mod naming;
pub mod render;
pub mod session;
