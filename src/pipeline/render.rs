//! HTML rasterisation: one isolated browser session per file, one PNG per
//! page-marker element.
//!
//! ## Why spawn_blocking, one file at a time?
//!
//! `headless_chrome` is a blocking API: every DevTools call parks the calling
//! thread until Chrome answers. Each file therefore runs inside
//! `tokio::task::spawn_blocking`, and the loop awaits it before launching the
//! next file. That keeps exactly one Chrome process alive at any moment, which
//! bounds peak memory and guarantees file N's session is torn down before
//! file N+1's starts.

use crate::config::{ConversionConfig, Viewport};
use crate::error::{FileError, Html2DeckError};
use crate::output::{FileResult, RenderReport};
use crate::pipeline::naming;
use crate::pipeline::session::BrowserLauncher;
use crate::progress::ProgressCallback;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// The subset of [`ConversionConfig`] a render task needs, detached so it
/// can move onto the blocking pool.
#[derive(Debug, Clone)]
pub struct RenderSettings {
    pub images_dir: PathBuf,
    pub viewport: Viewport,
    pub page_selector: String,
    pub navigation_timeout: Duration,
    pub settle_delay: Duration,
    pub capture_delay: Duration,
}

impl RenderSettings {
    pub fn from_config(config: &ConversionConfig) -> Self {
        Self {
            images_dir: config.resolved_images_dir(),
            viewport: config.viewport,
            page_selector: config.page_selector.clone(),
            navigation_timeout: config.navigation_timeout,
            settle_delay: config.settle_delay,
            capture_delay: config.capture_delay,
        }
    }
}

/// Render every file in order, continuing past per-file failures.
///
/// # Errors
/// Only fatal conditions: the image directory cannot be created, or the
/// launcher's preflight reports that no browser can be started.
pub async fn render_all(
    files: &[PathBuf],
    config: &ConversionConfig,
    launcher: Arc<dyn BrowserLauncher>,
) -> Result<RenderReport, Html2DeckError> {
    let started = Instant::now();
    let settings = RenderSettings::from_config(config);

    tokio::fs::create_dir_all(&settings.images_dir)
        .await
        .map_err(|source| Html2DeckError::OutputDirCreate {
            path: settings.images_dir.clone(),
            source,
        })?;

    if files.is_empty() {
        return Ok(RenderReport {
            total_duration_ms: started.elapsed().as_millis() as u64,
            ..Default::default()
        });
    }

    launcher.preflight()?;
    warn_on_stem_collisions(files);

    let total = files.len();
    let progress = config.progress_callback.clone();
    if let Some(ref cb) = progress {
        cb.on_render_start(total);
    }
    info!(
        "Rendering {} files at {}x{} @{}x",
        total,
        settings.viewport.width,
        settings.viewport.height,
        settings.viewport.device_scale_factor
    );

    let mut results = Vec::with_capacity(total);
    for (i, path) in files.iter().enumerate() {
        let index = i + 1;
        if let Some(ref cb) = progress {
            cb.on_file_start(index, total, path);
        }

        let result = render_file_task(path.clone(), settings.clone(), launcher.clone()).await;
        report_file(&result, index, total, progress.as_ref());
        results.push(result);
    }

    let report = RenderReport {
        files: results,
        pattern_errors: Vec::new(),
        total_duration_ms: started.elapsed().as_millis() as u64,
    };

    info!(
        "Rendered {} images from {}/{} files in {}ms",
        report.total_images(),
        report.succeeded(),
        total,
        report.total_duration_ms
    );
    if let Some(ref cb) = progress {
        cb.on_render_complete(total, report.succeeded());
    }

    Ok(report)
}

/// Run one file on the blocking pool; a panic inside it fails only that file.
async fn render_file_task(
    path: PathBuf,
    settings: RenderSettings,
    launcher: Arc<dyn BrowserLauncher>,
) -> FileResult {
    let fallback_source = path.clone();
    match tokio::task::spawn_blocking(move || render_file(&path, &settings, launcher.as_ref()))
        .await
    {
        Ok(result) => result,
        Err(e) => FileResult {
            stem: naming::stem_of(&fallback_source),
            source: fallback_source,
            images: Vec::new(),
            error: Some(FileError::Internal {
                detail: e.to_string(),
            }),
            duration_ms: 0,
        },
    }
}

fn report_file(result: &FileResult, index: usize, total: usize, progress: Option<&ProgressCallback>) {
    match result.error {
        None => {
            if let Some(cb) = progress {
                cb.on_file_complete(index, total, &result.source, result.images.len());
            }
        }
        Some(ref e) => {
            warn!("Failed to render {}: {}", result.source.display(), e);
            if let Some(cb) = progress {
                cb.on_file_error(index, total, &result.source, &e.to_string());
            }
        }
    }
}

/// Render a single HTML file in a fresh browser session.
///
/// Blocking. The session is dropped (browser killed) before this returns,
/// whether the file succeeded or not.
pub fn render_file(
    path: &Path,
    settings: &RenderSettings,
    launcher: &dyn BrowserLauncher,
) -> FileResult {
    let started = Instant::now();
    let stem = naming::stem_of(path);
    let mut images = Vec::new();

    let error = capture_into(path, &stem, settings, launcher, &mut images).err();

    FileResult {
        source: path.to_path_buf(),
        stem,
        images,
        error,
        duration_ms: started.elapsed().as_millis() as u64,
    }
}

fn capture_into(
    path: &Path,
    stem: &str,
    settings: &RenderSettings,
    launcher: &dyn BrowserLauncher,
    images: &mut Vec<PathBuf>,
) -> Result<(), FileError> {
    let url = file_url(path)?;

    let mut session = launcher.launch(&settings.viewport)?;
    debug!("Opening {}", url);
    session.open(&url, settings.navigation_timeout)?;

    std::thread::sleep(settings.settle_delay);

    let count = session.count_pages(&settings.page_selector)?;
    if count == 0 {
        warn!(
            "No '{}' elements in {}; no images produced",
            settings.page_selector,
            path.display()
        );
        return Ok(());
    }
    info!("{}: {} pages", path.display(), count);

    for i in 0..count {
        let page = i + 1;
        let png = session.capture_page(&settings.page_selector, i, settings.capture_delay)?;

        let out = settings.images_dir.join(naming::image_file_name(stem, page));
        std::fs::write(&out, &png).map_err(|e| FileError::Write {
            path: out.clone(),
            detail: e.to_string(),
        })?;
        debug!("Captured page {} → {} ({} bytes)", page, out.display(), png.len());
        images.push(out);
    }

    Ok(())
}

fn file_url(path: &Path) -> Result<String, FileError> {
    let abs = std::path::absolute(path).map_err(|e| FileError::Navigation {
        detail: format!("cannot resolve '{}': {e}", path.display()),
    })?;
    url::Url::from_file_path(&abs)
        .map(String::from)
        .map_err(|()| FileError::Navigation {
            detail: format!("cannot build file URL for '{}'", abs.display()),
        })
}

/// Two inputs with the same stem write to the same image names; the later
/// file overwrites the earlier one's pages.
fn warn_on_stem_collisions(files: &[PathBuf]) {
    let mut seen: HashMap<String, &Path> = HashMap::new();
    for f in files {
        let stem = naming::stem_of(f);
        if let Some(prev) = seen.insert(stem.clone(), f) {
            warn!(
                "'{}' and '{}' share the stem '{}'; later images overwrite earlier ones",
                prev.display(),
                f.display(),
                stem
            );
        }
    }
}
