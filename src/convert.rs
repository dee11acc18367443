//! Top-level entry points: scan, render, assemble, or all three.
//!
//! The `_with` variants take an explicit [`BrowserLauncher`]; the plain ones
//! build a [`ChromeLauncher`] from the configuration.

use crate::config::ConversionConfig;
use crate::error::Html2DeckError;
use crate::output::{PipelineSummary, RenderReport};
use crate::pipeline::discover::{self, Discovery};
use crate::pipeline::render;
use crate::pipeline::session::{BrowserLauncher, ChromeLauncher};
use std::sync::Arc;
use tracing::{info, warn};

pub use crate::pipeline::deck::build_decks;

/// Discover the HTML files a run would render, without rendering them.
pub fn scan(config: &ConversionConfig) -> Discovery {
    discover::discover(&config.scan_patterns(), &config.exclude_patterns)
}

/// The production launcher for `config`.
pub fn chrome_launcher(config: &ConversionConfig) -> ChromeLauncher {
    ChromeLauncher::new(
        config.chrome_path.clone(),
        config.sandbox,
        config.navigation_timeout,
    )
}

/// Discover HTML files and render each one to PNGs with headless Chrome.
///
/// # Returns
/// `Ok(RenderReport)` even when some files failed; check
/// [`RenderReport::failed`].
///
/// # Errors
/// Returns `Err(Html2DeckError)` only for fatal errors:
/// - the image directory cannot be created
/// - no browser executable can be found
pub async fn render_images(config: &ConversionConfig) -> Result<RenderReport, Html2DeckError> {
    render_images_with(config, Arc::new(chrome_launcher(config))).await
}

/// [`render_images`] with a caller-supplied browser.
pub async fn render_images_with(
    config: &ConversionConfig,
    launcher: Arc<dyn BrowserLauncher>,
) -> Result<RenderReport, Html2DeckError> {
    info!("Scanning for HTML files");
    let discovery = scan(config);

    let mut report = render::render_all(&discovery.files, config, launcher).await?;
    report.pattern_errors = discovery
        .pattern_errors
        .iter()
        .map(ToString::to_string)
        .collect();

    if discovery.is_empty() {
        warn!("No HTML files to render");
    } else {
        info!(
            "Rendered {}/{} files ({} images) in {}ms",
            report.succeeded(),
            report.files.len(),
            report.total_images(),
            report.total_duration_ms
        );
    }
    Ok(report)
}

/// Run the full pipeline: render every HTML file, then assemble decks from
/// the image directory.
///
/// Per-file render failures do not stop deck assembly; images from the files
/// that did render still become decks.
pub async fn convert(config: &ConversionConfig) -> Result<PipelineSummary, Html2DeckError> {
    convert_with(config, Arc::new(chrome_launcher(config))).await
}

/// [`convert`] with a caller-supplied browser.
pub async fn convert_with(
    config: &ConversionConfig,
    launcher: Arc<dyn BrowserLauncher>,
) -> Result<PipelineSummary, Html2DeckError> {
    // ── Step 1: HTML → PNG ───────────────────────────────────────────────
    let render = render_images_with(config, launcher).await?;

    // ── Step 2: PNG → PPTX ───────────────────────────────────────────────
    let decks = build_decks(config).await?;

    Ok(PipelineSummary {
        render: Some(render),
        decks: Some(decks),
    })
}

/// Synchronous wrapper around [`convert`].
///
/// Creates a temporary tokio runtime internally.
pub fn convert_sync(config: &ConversionConfig) -> Result<PipelineSummary, Html2DeckError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| Html2DeckError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(convert(config))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::TempDir;

    #[test]
    fn scan_honours_root_and_excludes() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("output")).unwrap();
        std::fs::write(dir.path().join("a.html"), "<html></html>").unwrap();
        std::fs::write(dir.path().join("output/stale.html"), "<html></html>").unwrap();

        let config = ConversionConfig::builder()
            .scan_root(dir.path())
            .build()
            .unwrap();
        let found = scan(&config);
        assert_eq!(found.files.len(), 1);
        assert!(found.files[0].ends_with("a.html"));
    }

    #[test]
    fn chrome_launcher_mirrors_config() {
        let config = ConversionConfig::builder()
            .chrome_path("/opt/chrome")
            .sandbox(false)
            .navigation_timeout(Duration::from_secs(5))
            .build()
            .unwrap();
        let launcher = chrome_launcher(&config);
        assert_eq!(launcher.chrome_path.as_deref(), Some(std::path::Path::new("/opt/chrome")));
        assert!(!launcher.sandbox);
        assert_eq!(launcher.navigation_timeout, Duration::from_secs(5));
    }

    #[tokio::test]
    async fn empty_scan_still_assembles_existing_images() {
        let dir = TempDir::new().unwrap();
        let images = dir.path().join("out/images");
        std::fs::create_dir_all(&images).unwrap();

        let img = image::RgbImage::from_pixel(12, 8, image::Rgb([0, 0, 0]));
        img.save(images.join("prior_page_01.png")).unwrap();

        let config = ConversionConfig::builder()
            .scan_root(dir.path().join("empty"))
            .output_dir(dir.path().join("out"))
            .build()
            .unwrap();
        // An explicit missing browser must not matter when nothing is rendered.
        let launcher = ChromeLauncher::new(Some("/no/such/chrome".into()), true, Duration::from_secs(1));
        let summary = convert_with(&config, Arc::new(launcher)).await.unwrap();

        let render = summary.render.unwrap();
        assert!(render.files.is_empty());
        let decks = summary.decks.unwrap();
        assert_eq!(decks.decks.len(), 2);
        assert!(dir.path().join("out/prior.pptx").exists());
    }
}
