//! Configuration types for HTML-to-deck conversion.
//!
//! All conversion behaviour is controlled through [`ConversionConfig`], built
//! via its [`ConversionConfigBuilder`]. The value is constructed once at
//! startup and passed by reference into both stages; nothing reads ambient
//! state after that.
//!
//! Values come from three layers, each overriding the previous one shallowly:
//! built-in defaults, an optional JSON [`ConfigFile`], and explicit builder
//! calls (the CLI flags).

use crate::error::{ConfigFileError, Html2DeckError};
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

/// EMUs per centimetre (OOXML drawing unit).
pub const EMU_PER_CM: f64 = 360_000.0;

/// File name of the deck that spans every image group.
pub const COMBINED_DECK_NAME: &str = "combined_reports";

/// Default exclude globs, matched against absolute paths.
pub const DEFAULT_EXCLUDES: &[&str] = &[
    "**/node_modules/**",
    "**/output/**",
    "**/.git/**",
    "**/dist/**",
    "**/build/**",
    "**/frontend/**",
];

/// Configuration for an HTML-to-deck conversion run.
///
/// Built via [`ConversionConfig::builder()`] or using
/// [`ConversionConfig::default()`].
///
/// # Example
/// ```rust
/// use html2deck::ConversionConfig;
///
/// let config = ConversionConfig::builder()
///     .output_dir("out")
///     .device_scale_factor(2)
///     .combined_deck(false)
///     .build()
///     .unwrap();
/// assert_eq!(config.resolved_images_dir(), std::path::Path::new("out/images"));
/// ```
#[derive(Clone)]
pub struct ConversionConfig {
    /// Directory decks are written to. Default: `output`.
    pub output_dir: PathBuf,

    /// Directory rendered PNGs are written to and read back from.
    /// `None` means `{output_dir}/images`.
    pub images_dir: Option<PathBuf>,

    /// Base directory the default scan patterns are anchored to. Default: `.`.
    pub scan_root: PathBuf,

    /// Scan globs. Empty means `{scan_root}/*.html` and `{scan_root}/**/*.html`.
    pub include_patterns: Vec<String>,

    /// Exclude globs. Default: [`DEFAULT_EXCLUDES`].
    pub exclude_patterns: Vec<String>,

    /// Browser viewport and device scale.
    pub viewport: Viewport,

    /// Output image format. Only PNG is produced.
    pub image_format: ImageFormat,

    /// Output image quality; ignored for lossless formats.
    pub image_quality: Option<u8>,

    /// Slide canvas size. Default: A4 landscape.
    pub slide_size: SlideSize,

    /// CSS selector of page-marker elements. Default: `.page`.
    pub page_selector: String,

    /// Upper bound for navigation plus network idle. Default: 60 s.
    pub navigation_timeout: Duration,

    /// Fixed wait after load for script-driven rendering. Default: 3 s.
    pub settle_delay: Duration,

    /// Fixed wait after scrolling each page into view. Default: 500 ms.
    pub capture_delay: Duration,

    /// Emit one deck per image group. Default: true.
    pub separate_decks: bool,

    /// Emit `combined_reports.pptx` spanning all groups. Default: true.
    pub combined_deck: bool,

    /// Explicit Chrome/Chromium executable. `None` auto-detects.
    pub chrome_path: Option<PathBuf>,

    /// Run Chrome with its sandbox enabled. Default: true.
    pub sandbox: bool,

    /// Optional observer for per-file and per-deck events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("output"),
            images_dir: None,
            scan_root: PathBuf::from("."),
            include_patterns: Vec::new(),
            exclude_patterns: DEFAULT_EXCLUDES.iter().map(|s| s.to_string()).collect(),
            viewport: Viewport::default(),
            image_format: ImageFormat::Png,
            image_quality: None,
            slide_size: SlideSize::a4_landscape(),
            page_selector: ".page".to_string(),
            navigation_timeout: Duration::from_secs(60),
            settle_delay: Duration::from_millis(3000),
            capture_delay: Duration::from_millis(500),
            separate_decks: true,
            combined_deck: true,
            chrome_path: None,
            sandbox: true,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ConversionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversionConfig")
            .field("output_dir", &self.output_dir)
            .field("images_dir", &self.images_dir)
            .field("scan_root", &self.scan_root)
            .field("include_patterns", &self.include_patterns)
            .field("exclude_patterns", &self.exclude_patterns)
            .field("viewport", &self.viewport)
            .field("image_format", &self.image_format)
            .field("image_quality", &self.image_quality)
            .field("slide_size", &self.slide_size)
            .field("page_selector", &self.page_selector)
            .field("navigation_timeout", &self.navigation_timeout)
            .field("settle_delay", &self.settle_delay)
            .field("capture_delay", &self.capture_delay)
            .field("separate_decks", &self.separate_decks)
            .field("combined_deck", &self.combined_deck)
            .field("chrome_path", &self.chrome_path)
            .field("sandbox", &self.sandbox)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn ConversionProgressCallback>"),
            )
            .finish()
    }
}

impl ConversionConfig {
    /// Create a new builder for `ConversionConfig`.
    pub fn builder() -> ConversionConfigBuilder {
        ConversionConfigBuilder {
            config: Self::default(),
        }
    }

    /// The image directory, falling back to `{output_dir}/images`.
    pub fn resolved_images_dir(&self) -> PathBuf {
        self.images_dir
            .clone()
            .unwrap_or_else(|| self.output_dir.join("images"))
    }

    /// The scan globs, falling back to the two patterns anchored at `scan_root`.
    pub fn scan_patterns(&self) -> Vec<String> {
        if !self.include_patterns.is_empty() {
            return self.include_patterns.clone();
        }
        let root = glob::Pattern::escape(&self.scan_root.to_string_lossy());
        let root = root.trim_end_matches(['/', '\\']);
        vec![format!("{root}/*.html"), format!("{root}/**/*.html")]
    }
}

/// Builder for [`ConversionConfig`].
#[derive(Debug)]
pub struct ConversionConfigBuilder {
    config: ConversionConfig,
}

impl ConversionConfigBuilder {
    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.output_dir = dir.into();
        self
    }

    pub fn images_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.images_dir = Some(dir.into());
        self
    }

    pub fn scan_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.config.scan_root = root.into();
        self
    }

    pub fn include_patterns(mut self, patterns: Vec<String>) -> Self {
        self.config.include_patterns = patterns;
        self
    }

    pub fn exclude_patterns(mut self, patterns: Vec<String>) -> Self {
        self.config.exclude_patterns = patterns;
        self
    }

    pub fn viewport(mut self, viewport: Viewport) -> Self {
        self.config.viewport = viewport;
        self
    }

    pub fn viewport_size(mut self, width: u32, height: u32) -> Self {
        self.config.viewport.width = width;
        self.config.viewport.height = height;
        self
    }

    pub fn viewport_width(mut self, width: u32) -> Self {
        self.config.viewport.width = width;
        self
    }

    pub fn viewport_height(mut self, height: u32) -> Self {
        self.config.viewport.height = height;
        self
    }

    pub fn device_scale_factor(mut self, scale: u32) -> Self {
        self.config.viewport.device_scale_factor = scale;
        self
    }

    pub fn image_quality(mut self, quality: u8) -> Self {
        self.config.image_quality = Some(quality.min(100));
        self
    }

    pub fn slide_size(mut self, size: SlideSize) -> Self {
        self.config.slide_size = size;
        self
    }

    pub fn page_selector(mut self, selector: impl Into<String>) -> Self {
        self.config.page_selector = selector.into();
        self
    }

    pub fn navigation_timeout(mut self, timeout: Duration) -> Self {
        self.config.navigation_timeout = timeout;
        self
    }

    pub fn settle_delay(mut self, delay: Duration) -> Self {
        self.config.settle_delay = delay;
        self
    }

    pub fn capture_delay(mut self, delay: Duration) -> Self {
        self.config.capture_delay = delay;
        self
    }

    pub fn separate_decks(mut self, v: bool) -> Self {
        self.config.separate_decks = v;
        self
    }

    pub fn combined_deck(mut self, v: bool) -> Self {
        self.config.combined_deck = v;
        self
    }

    pub fn chrome_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.chrome_path = Some(path.into());
        self
    }

    pub fn sandbox(mut self, v: bool) -> Self {
        self.config.sandbox = v;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Overlay every key present in a parsed config file.
    ///
    /// Keys absent from the file keep whatever the builder already holds, so
    /// call this before the explicit setters that should win over the file.
    pub fn apply_file(mut self, file: &ConfigFile) -> Self {
        // Out-of-range values are dropped with a warning; the current value stays.
        if let Some(ref vp) = file.viewport {
            if let Some(w) = vp.width.and_then(|v| positive_u32("viewport.width", v)) {
                self.config.viewport.width = w;
            }
            if let Some(h) = vp.height.and_then(|v| positive_u32("viewport.height", v)) {
                self.config.viewport.height = h;
            }
            if let Some(scale) = vp
                .device_scale_factor
                .and_then(|v| positive_u32("viewport.deviceScaleFactor", v))
            {
                self.config.viewport.device_scale_factor = scale;
            }
        }
        if let Some(ref format) = file.image_format {
            self.config.image_format = ImageFormat::from_name(format);
        }
        if let Some(q) = file.image_quality {
            if q.is_finite() && q >= 0.0 {
                self.config.image_quality = Some(q.round().min(100.0) as u8);
            } else {
                warn!("Ignoring imageQuality {} from config file", q);
            }
        }
        if let Some(ref dir) = file.output_dir {
            self.config.output_dir = dir.clone();
        }
        if let Some(ref dir) = file.images_dir {
            self.config.images_dir = Some(dir.clone());
        }
        if let Some(ref include) = file.include {
            self.config.include_patterns = include.clone();
        }
        if let Some(ref exclude) = file.exclude {
            self.config.exclude_patterns = exclude.clone();
        }
        if let Some(v) = file.separate_reports {
            self.config.separate_decks = v;
        }
        if let Some(v) = file.create_combined {
            self.config.combined_deck = v;
        }
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ConversionConfig, Html2DeckError> {
        let c = &self.config;
        if c.viewport.width == 0 || c.viewport.height == 0 {
            return Err(Html2DeckError::InvalidConfig(format!(
                "Viewport must be non-empty, got {}x{}",
                c.viewport.width, c.viewport.height
            )));
        }
        if c.viewport.device_scale_factor == 0 {
            return Err(Html2DeckError::InvalidConfig(
                "Device scale factor must be ≥ 1".into(),
            ));
        }
        if c.slide_size.width_emu <= 0 || c.slide_size.height_emu <= 0 {
            return Err(Html2DeckError::InvalidConfig(format!(
                "Slide size must be positive, got {}x{} EMU",
                c.slide_size.width_emu, c.slide_size.height_emu
            )));
        }
        if c.page_selector.trim().is_empty() {
            return Err(Html2DeckError::InvalidConfig(
                "Page selector must not be empty".into(),
            ));
        }
        if c.image_quality.is_some() && c.image_format.is_lossless() {
            debug!("image quality is ignored for {:?} output", c.image_format);
        }
        Ok(self.config)
    }
}

/// Round a config-file number to a positive integer, or warn and reject it.
fn positive_u32(key: &str, value: f64) -> Option<u32> {
    let rounded = value.round();
    if !value.is_finite() || rounded < 1.0 || rounded > u32::MAX as f64 {
        warn!("Ignoring {} = {} from config file: must be positive", key, value);
        return None;
    }
    if value.fract() != 0.0 {
        warn!("{} = {} is not an integer, rounding to {}", key, value, rounded);
    }
    Some(rounded as u32)
}

// ── Value types ──────────────────────────────────────────────────────────

/// Browser viewport in CSS pixels plus the device scale multiplier.
///
/// Captured images are `width × scale` by `height × scale` device pixels for
/// a page element that fills the viewport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
    pub device_scale_factor: u32,
}

impl Default for Viewport {
    /// A4 landscape at 96 CSS px/in, rendered at 3×.
    fn default() -> Self {
        Self {
            width: 1122,
            height: 794,
            device_scale_factor: 3,
        }
    }
}

impl Viewport {
    /// Device-pixel size of a capture covering the whole viewport.
    pub fn device_pixels(&self) -> (u32, u32) {
        (
            self.width * self.device_scale_factor,
            self.height * self.device_scale_factor,
        )
    }
}

/// Slide canvas size in EMU.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlideSize {
    pub width_emu: i64,
    pub height_emu: i64,
}

impl SlideSize {
    pub fn from_cm(width_cm: f64, height_cm: f64) -> Self {
        Self {
            width_emu: (width_cm * EMU_PER_CM).round() as i64,
            height_emu: (height_cm * EMU_PER_CM).round() as i64,
        }
    }

    /// 29.7 cm × 21.0 cm.
    pub fn a4_landscape() -> Self {
        Self::from_cm(29.7, 21.0)
    }
}

impl Default for SlideSize {
    fn default() -> Self {
        Self::a4_landscape()
    }
}

/// Output raster format.
///
/// Captures are always lossless; the enum exists so a configured format can
/// be recognised and reported rather than silently dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    #[default]
    Png,
}

impl ImageFormat {
    /// Map a configured name onto a supported format, warning on anything else.
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "png" => ImageFormat::Png,
            other => {
                warn!("image format '{}' is not supported, using png", other);
                ImageFormat::Png
            }
        }
    }

    pub fn is_lossless(&self) -> bool {
        matches!(self, ImageFormat::Png)
    }
}

// ── JSON config file ─────────────────────────────────────────────────────

/// The optional JSON configuration file.
///
/// Every key is optional; absent keys leave the defaults untouched.
///
/// ```json
/// {
///   "viewport": { "width": 1122, "height": 794, "deviceScaleFactor": 3 },
///   "imageFormat": "png",
///   "imageQuality": 100
/// }
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigFile {
    pub viewport: Option<ViewportOverride>,
    pub image_format: Option<String>,
    /// Accepted for compatibility; PNG output ignores it.
    pub image_quality: Option<f64>,
    pub output_dir: Option<PathBuf>,
    pub images_dir: Option<PathBuf>,
    pub include: Option<Vec<String>>,
    pub exclude: Option<Vec<String>>,
    pub separate_reports: Option<bool>,
    pub create_combined: Option<bool>,
}

/// Partial viewport section of [`ConfigFile`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewportOverride {
    pub width: Option<f64>,
    pub height: Option<f64>,
    pub device_scale_factor: Option<f64>,
}

impl ConfigFile {
    /// Parse a config file.
    pub fn load(path: &Path) -> Result<Self, ConfigFileError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigFileError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| ConfigFileError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Parse a config file, logging and falling back to an empty overlay on
    /// any error.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(file) => {
                debug!("Loaded config file {}", path.display());
                file
            }
            Err(e) => {
                warn!("{}; using defaults", e);
                Self::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_match_a4_landscape() {
        let c = ConversionConfig::default();
        assert_eq!(c.viewport.width, 1122);
        assert_eq!(c.viewport.height, 794);
        assert_eq!(c.viewport.device_scale_factor, 3);
        assert_eq!(c.slide_size.width_emu, 10_692_000);
        assert_eq!(c.slide_size.height_emu, 7_560_000);
        assert_eq!(c.page_selector, ".page");
        assert_eq!(c.navigation_timeout, Duration::from_secs(60));
        assert_eq!(c.resolved_images_dir(), PathBuf::from("output/images"));
    }

    #[test]
    fn device_pixels_scale_linearly() {
        let mut vp = Viewport::default();
        for scale in 1..=4 {
            vp.device_scale_factor = scale;
            assert_eq!(vp.device_pixels(), (1122 * scale, 794 * scale));
        }
    }

    #[test]
    fn builder_rejects_zero_scale() {
        let err = ConversionConfig::builder()
            .device_scale_factor(0)
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("scale"));
    }

    #[test]
    fn builder_rejects_empty_viewport() {
        assert!(ConversionConfig::builder()
            .viewport_size(0, 794)
            .build()
            .is_err());
    }

    #[test]
    fn default_scan_patterns_are_anchored_at_root() {
        let c = ConversionConfig::builder()
            .scan_root("/srv/reports/")
            .build()
            .unwrap();
        assert_eq!(
            c.scan_patterns(),
            vec![
                "/srv/reports/*.html".to_string(),
                "/srv/reports/**/*.html".to_string()
            ]
        );
    }

    #[test]
    fn explicit_include_patterns_win() {
        let c = ConversionConfig::builder()
            .include_patterns(vec!["docs/*.html".into()])
            .build()
            .unwrap();
        assert_eq!(c.scan_patterns(), vec!["docs/*.html".to_string()]);
    }

    #[test]
    fn file_overlay_is_shallow() {
        let file: ConfigFile = serde_json::from_str(
            r#"{ "viewport": { "deviceScaleFactor": 2 }, "imageQuality": 90 }"#,
        )
        .unwrap();
        let c = ConversionConfig::builder().apply_file(&file).build().unwrap();
        assert_eq!(c.viewport.device_scale_factor, 2);
        assert_eq!(c.viewport.width, 1122, "unset keys keep defaults");
        assert_eq!(c.image_quality, Some(90));
        assert_eq!(c.image_format, ImageFormat::Png);
    }

    #[test]
    fn out_of_range_viewport_values_keep_defaults() {
        let file: ConfigFile = serde_json::from_str(
            r#"{ "viewport": { "deviceScaleFactor": 0.4, "width": 0, "height": -20 } }"#,
        )
        .unwrap();
        let c = ConversionConfig::builder().apply_file(&file).build().unwrap();
        assert_eq!(c.viewport, Viewport::default());
    }

    #[test]
    fn fractional_viewport_values_are_rounded() {
        let file: ConfigFile = serde_json::from_str(
            r#"{ "viewport": { "width": 800.4, "deviceScaleFactor": 1.6 } }"#,
        )
        .unwrap();
        let c = ConversionConfig::builder().apply_file(&file).build().unwrap();
        assert_eq!(c.viewport.width, 800);
        assert_eq!(c.viewport.device_scale_factor, 2);
    }

    #[test]
    fn odd_image_quality_does_not_discard_other_keys() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(br#"{ "viewport": { "deviceScaleFactor": 2 }, "imageQuality": 300 }"#)
            .unwrap();
        let file = ConfigFile::load_or_default(f.path());
        let c = ConversionConfig::builder().apply_file(&file).build().unwrap();
        assert_eq!(c.viewport.device_scale_factor, 2);
        assert_eq!(c.image_quality, Some(100));

        let file: ConfigFile =
            serde_json::from_str(r#"{ "imageQuality": 92.5, "createCombined": false }"#).unwrap();
        let c = ConversionConfig::builder().apply_file(&file).build().unwrap();
        assert_eq!(c.image_quality, Some(93));
        assert!(!c.combined_deck);

        let file: ConfigFile = serde_json::from_str(r#"{ "imageQuality": -1 }"#).unwrap();
        let c = ConversionConfig::builder().apply_file(&file).build().unwrap();
        assert_eq!(c.image_quality, None);
    }

    #[test]
    fn single_axis_setters_are_validated() {
        let c = ConversionConfig::builder()
            .viewport_width(1280)
            .build()
            .unwrap();
        assert_eq!((c.viewport.width, c.viewport.height), (1280, 794));

        let err = ConversionConfig::builder()
            .viewport_height(0)
            .build()
            .unwrap_err();
        assert!(matches!(err, Html2DeckError::InvalidConfig(_)));
    }

    #[test]
    fn debug_lists_timing_and_sandbox() {
        let c = ConversionConfig::builder()
            .image_quality(80)
            .sandbox(false)
            .build()
            .unwrap();
        let dbg = format!("{c:?}");
        for field in [
            "image_quality: Some(80)",
            "navigation_timeout",
            "settle_delay",
            "capture_delay",
            "sandbox: false",
        ] {
            assert!(dbg.contains(field), "missing {field} in {dbg}");
        }
    }

    #[test]
    fn explicit_setters_override_file() {
        let file: ConfigFile =
            serde_json::from_str(r#"{ "viewport": { "width": 800 }, "createCombined": false }"#)
                .unwrap();
        let c = ConversionConfig::builder()
            .apply_file(&file)
            .viewport_size(1000, 700)
            .build()
            .unwrap();
        assert_eq!(c.viewport.width, 1000);
        assert!(!c.combined_deck);
    }

    #[test]
    fn unsupported_format_falls_back_to_png() {
        assert_eq!(ImageFormat::from_name("jpeg"), ImageFormat::Png);
        assert_eq!(ImageFormat::from_name("PNG"), ImageFormat::Png);
    }

    #[test]
    fn malformed_config_file_yields_defaults() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(b"{ not json").unwrap();
        assert!(matches!(
            ConfigFile::load(f.path()),
            Err(ConfigFileError::Parse { .. })
        ));
        let overlay = ConfigFile::load_or_default(f.path());
        assert!(overlay.viewport.is_none());
    }

    #[test]
    fn missing_config_file_is_read_error() {
        let err = ConfigFile::load(Path::new("/definitely/not/here.json")).unwrap_err();
        assert!(matches!(err, ConfigFileError::Read { .. }));
    }
}
