//! Deck assembly: group rendered PNGs by stem and lay each one out on its
//! own slide.
//!
//! This stage only reads the image directory. It knows nothing about the
//! render run that produced it beyond the file-name convention in
//! [`crate::pipeline::naming`], so it can run long after rendering, or on
//! images produced elsewhere.

use crate::config::{ConversionConfig, SlideSize, COMBINED_DECK_NAME};
use crate::error::Html2DeckError;
use crate::output::{DeckReport, DeckResult, SkippedImage};
use crate::pipeline::naming;
use crate::pptx::{Placement, Presentation};
use crate::progress::ProgressCallback;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info, warn};

/// A PNG in the image directory whose name follows the convention.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageEntry {
    pub path: PathBuf,
    pub page: usize,
}

/// All images for one stem, ordered by page index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageGroup {
    pub stem: String,
    pub images: Vec<ImageEntry>,
}

/// A decoded image ready to be placed.
struct LoadedImage {
    png: Vec<u8>,
    width: u32,
    height: u32,
    name: String,
}

/// Group image paths by stem. Non-matching names are dropped.
///
/// Groups come back sorted by stem; pages within a group by index.
pub fn group_images(paths: impl IntoIterator<Item = PathBuf>) -> Vec<ImageGroup> {
    let mut groups: BTreeMap<String, Vec<ImageEntry>> = BTreeMap::new();

    for path in paths {
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        let Some((stem, page)) = naming::parse_image_file_name(name) else {
            debug!("Ignoring {}: not a page image", path.display());
            continue;
        };
        groups
            .entry(stem)
            .or_default()
            .push(ImageEntry { path, page });
    }

    groups
        .into_iter()
        .map(|(stem, mut images)| {
            images.sort_by(|a, b| a.page.cmp(&b.page).then_with(|| a.path.cmp(&b.path)));
            ImageGroup { stem, images }
        })
        .collect()
}

/// List the image directory and group its contents.
pub fn scan_images(dir: &Path) -> Result<Vec<ImageGroup>, Html2DeckError> {
    if !dir.is_dir() {
        return Err(Html2DeckError::ImagesDirNotFound {
            path: dir.to_path_buf(),
        });
    }

    let unreadable = |source| Html2DeckError::ImagesDirUnreadable {
        path: dir.to_path_buf(),
        source,
    };

    let mut paths = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(unreadable)? {
        let entry = entry.map_err(unreadable)?;
        let path = entry.path();
        if path.is_file() {
            paths.push(path);
        }
    }

    Ok(group_images(paths))
}

/// Scale an image to fit the canvas, preserving aspect ratio, and center it.
///
/// The result touches two opposite canvas edges and is letterboxed on the
/// other axis.
pub fn fit_to_canvas(image_width: u32, image_height: u32, canvas: SlideSize) -> Placement {
    if image_width == 0 || image_height == 0 {
        return Placement {
            x: 0,
            y: 0,
            width: canvas.width_emu,
            height: canvas.height_emu,
        };
    }

    let cw = canvas.width_emu as f64;
    let ch = canvas.height_emu as f64;
    let scale = (cw / image_width as f64).min(ch / image_height as f64);

    let width = ((image_width as f64 * scale).round() as i64).min(canvas.width_emu);
    let height = ((image_height as f64 * scale).round() as i64).min(canvas.height_emu);

    Placement {
        x: (canvas.width_emu - width) / 2,
        y: (canvas.height_emu - height) / 2,
        width,
        height,
    }
}

/// Build one deck per group and, if enabled, one combined deck.
///
/// # Errors
/// Fatal only: the image directory is missing or unreadable, the output
/// directory cannot be created, or a deck cannot be written.
pub async fn build_decks(config: &ConversionConfig) -> Result<DeckReport, Html2DeckError> {
    let images_dir = config.resolved_images_dir();
    let output_dir = config.output_dir.clone();
    let slide_size = config.slide_size;
    let separate = config.separate_decks;
    let combined = config.combined_deck;
    let progress = config.progress_callback.clone();

    tokio::task::spawn_blocking(move || {
        assemble(
            &images_dir,
            &output_dir,
            slide_size,
            separate,
            combined,
            progress.as_ref(),
        )
    })
    .await
    .map_err(|e| Html2DeckError::Internal(format!("deck task panicked: {e}")))?
}

fn assemble(
    images_dir: &Path,
    output_dir: &Path,
    slide_size: SlideSize,
    separate: bool,
    combined: bool,
    progress: Option<&ProgressCallback>,
) -> Result<DeckReport, Html2DeckError> {
    let started = Instant::now();
    let groups = scan_images(images_dir)?;

    let mut report = DeckReport {
        groups: groups.len(),
        ..Default::default()
    };

    if groups.is_empty() {
        info!("No image groups found in {}", images_dir.display());
        report.total_duration_ms = started.elapsed().as_millis() as u64;
        return Ok(report);
    }

    std::fs::create_dir_all(output_dir).map_err(|source| Html2DeckError::OutputDirCreate {
        path: output_dir.to_path_buf(),
        source,
    })?;

    info!("Assembling decks for {} image groups", groups.len());

    let mut combined_deck = combined.then(|| Presentation::new(COMBINED_DECK_NAME, slide_size));

    for group in &groups {
        let loaded = load_group(group, &mut report.skipped_images, progress);
        if loaded.is_empty() {
            warn!("No valid images for '{}'; skipping deck", group.stem);
            continue;
        }

        if let Some(deck) = combined_deck.as_mut() {
            add_slides(deck, &loaded);
        }

        if separate && combined && group.stem == COMBINED_DECK_NAME {
            warn!(
                "Images for '{}' share the combined deck's name; writing only the combined deck",
                group.stem
            );
        } else if separate {
            let mut deck = Presentation::new(group.stem.as_str(), slide_size);
            add_slides(&mut deck, &loaded);
            let path = output_dir.join(format!("{}.pptx", group.stem));
            report
                .decks
                .push(write_deck(&deck, &path, &group.stem, progress)?);
        }
    }

    if let Some(deck) = combined_deck {
        if deck.slide_count() > 0 {
            let path = output_dir.join(format!("{COMBINED_DECK_NAME}.pptx"));
            report
                .decks
                .push(write_deck(&deck, &path, COMBINED_DECK_NAME, progress)?);
        }
    }

    report.total_duration_ms = started.elapsed().as_millis() as u64;
    info!(
        "Wrote {} decks ({} slides, {} images skipped) in {}ms",
        report.decks.len(),
        report.total_slides(),
        report.skipped_images.len(),
        report.total_duration_ms
    );
    Ok(report)
}

/// Read and decode every image in a group, skipping the ones that fail.
fn load_group(
    group: &ImageGroup,
    skipped: &mut Vec<SkippedImage>,
    progress: Option<&ProgressCallback>,
) -> Vec<LoadedImage> {
    let mut loaded = Vec::with_capacity(group.images.len());

    for entry in &group.images {
        match load_image(&entry.path) {
            Ok(image) => loaded.push(image),
            Err(reason) => {
                warn!("Skipping image {}: {}", entry.path.display(), reason);
                if let Some(cb) = progress {
                    cb.on_image_skipped(&entry.path, &reason);
                }
                skipped.push(SkippedImage {
                    path: entry.path.clone(),
                    reason,
                });
            }
        }
    }

    loaded
}

fn load_image(path: &Path) -> Result<LoadedImage, String> {
    let png = std::fs::read(path).map_err(|e| format!("read failed: {e}"))?;
    // Full decode, so truncated files are caught here rather than in the viewer.
    let decoded = image::load_from_memory_with_format(&png, image::ImageFormat::Png)
        .map_err(|e| format!("decode failed: {e}"))?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    Ok(LoadedImage {
        width: decoded.width(),
        height: decoded.height(),
        png,
        name,
    })
}

fn add_slides(deck: &mut Presentation, images: &[LoadedImage]) {
    let canvas = deck.slide_size();
    for image in images {
        let placement = fit_to_canvas(image.width, image.height, canvas);
        deck.add_picture_slide(image.png.clone(), placement, image.name.as_str());
    }
}

fn write_deck(
    deck: &Presentation,
    path: &Path,
    name: &str,
    progress: Option<&ProgressCallback>,
) -> Result<DeckResult, Html2DeckError> {
    let bytes = deck
        .save_atomic(path)
        .map_err(|source| Html2DeckError::DeckWriteFailed {
            path: path.to_path_buf(),
            source,
        })?;

    info!(
        "Saved {} ({} slides, {})",
        path.display(),
        deck.slide_count(),
        human_size(bytes)
    );
    if let Some(cb) = progress {
        cb.on_deck_written(path, deck.slide_count());
    }

    Ok(DeckResult {
        path: path.to_path_buf(),
        name: name.to_string(),
        slides: deck.slide_count(),
        bytes,
    })
}

fn human_size(bytes: u64) -> String {
    const KB: f64 = 1024.0;
    let b = bytes as f64;
    if b >= KB * KB {
        format!("{:.1} MB", b / (KB * KB))
    } else {
        format!("{:.1} KB", b / KB)
    }
}
