//! CLI binary for html2deck.
//!
//! A thin shim over the library crate that maps CLI flags and the optional
//! JSON config file to `ConversionConfig` and prints results.

use anyhow::{Context, Result};
use clap::Parser;
use html2deck::{
    build_decks, render_images, scan, ConfigFile, ConversionConfig, ConversionProgressCallback,
    DeckReport, PipelineSummary, ProgressCallback, RenderReport,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: one bar across all HTML files, plus a log
/// line per file and per deck printed above it.
struct CliProgressCallback {
    bar: ProgressBar,
    /// Start time of the file currently rendering.
    file_started: Mutex<Option<Instant>>,
    errors: AtomicUsize,
}

impl CliProgressCallback {
    /// Create a callback whose bar length is set by `on_render_start`.
    fn new_dynamic() -> Arc<Self> {
        let bar = ProgressBar::new(0);

        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);

        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Scanning for HTML files…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            file_started: Mutex::new(None),
            errors: AtomicUsize::new(0),
        })
    }

    fn activate_bar(&self, total: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} files  \
             ⏱ {elapsed_precise}  ETA {eta_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_length(total as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Rendering");
        self.bar.reset_eta();
    }

    fn take_elapsed(&self) -> f64 {
        self.file_started
            .lock()
            .ok()
            .and_then(|mut started| started.take())
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }

    fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl ConversionProgressCallback for CliProgressCallback {
    fn on_render_start(&self, total_files: usize) {
        self.activate_bar(total_files);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Rendering {total_files} HTML files…"))
        ));
    }

    fn on_file_start(&self, _index: usize, _total: usize, source: &Path) {
        if let Ok(mut started) = self.file_started.lock() {
            *started = Some(Instant::now());
        }
        self.bar.set_message(file_name(source));
    }

    fn on_file_complete(&self, index: usize, total: usize, source: &Path, images: usize) {
        let elapsed = self.take_elapsed();
        let pages = if images == 0 {
            yellow("no pages")
        } else {
            dim(&format!("{images:>3} pages"))
        };
        self.bar.println(format!(
            "  {} {:>3}/{:<3}  {:<40}  {}  {}",
            green("✓"),
            index,
            total,
            file_name(source),
            pages,
            dim(&format!("{elapsed:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_file_error(&self, index: usize, total: usize, source: &Path, error: &str) {
        let elapsed = self.take_elapsed();
        self.errors.fetch_add(1, Ordering::SeqCst);

        // Truncate very long error messages to keep output tidy.
        let msg = match error.char_indices().nth(79) {
            Some((cut, _)) => format!("{}\u{2026}", &error[..cut]),
            None => error.to_string(),
        };

        self.bar.println(format!(
            "  {} {:>3}/{:<3}  {:<40}  {}  {}",
            red("✗"),
            index,
            total,
            file_name(source),
            red(&msg),
            dim(&format!("{elapsed:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_render_complete(&self, total_files: usize, succeeded: usize) {
        let failed = self.errors.load(Ordering::SeqCst);
        self.bar.finish_and_clear();

        if failed == 0 {
            eprintln!(
                "{} {} files rendered successfully",
                green("✔"),
                bold(&succeeded.to_string())
            );
        } else {
            eprintln!(
                "{} {}/{} files rendered  ({} failed)",
                if failed == total_files {
                    red("✘")
                } else {
                    cyan("⚠")
                },
                bold(&succeeded.to_string()),
                total_files,
                red(&failed.to_string()),
            );
        }
    }

    fn on_image_skipped(&self, image: &Path, reason: &str) {
        eprintln!("  {} skipped {}  {}", yellow("⚠"), file_name(image), dim(reason));
    }

    fn on_deck_written(&self, deck: &Path, slides: usize) {
        eprintln!(
            "  {} {:<40}  {}",
            green("✓"),
            deck.display(),
            dim(&format!("{slides} slides"))
        );
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Render every report under the current directory, then build decks
  html2deck

  # Render only, at 2x, from a specific folder
  html2deck --images-only --root reports --scale 2

  # Rebuild decks from existing images, without the combined deck
  html2deck --decks-only --no-combined

  # See which files would be rendered
  html2deck --list --root reports --exclude '**/drafts/**'

  # Settings from a JSON file, overridden by flags
  html2deck --config html2deck.json --output-dir build/decks

CONFIG FILE (all keys optional):
  {
    "viewport": { "width": 1122, "height": 794, "deviceScaleFactor": 3 },
    "imageFormat": "png",
    "outputDir": "output",
    "imagesDir": "output/images",
    "include": ["reports/**/*.html"],
    "exclude": ["**/node_modules/**"],
    "separateReports": true,
    "createCombined": true
  }

OUTPUT:
  {images-dir}/{stem}_page_01.png …   one PNG per `.page` element
  {output-dir}/{stem}.pptx            one deck per HTML file
  {output-dir}/combined_reports.pptx  every slide from every deck

ENVIRONMENT VARIABLES:
  CHROME            Path to the Chrome/Chromium executable
  RUST_LOG          Log filter, e.g. html2deck=debug
  HTML2DECK_*       Any flag, e.g. HTML2DECK_OUTPUT_DIR, HTML2DECK_SCALE
"#;

/// Render paginated HTML reports to PNGs and assemble them into PowerPoint decks.
#[derive(Parser, Debug)]
#[command(
    name = "html2deck",
    version,
    about = "Render paginated HTML reports to PNGs and assemble them into PowerPoint decks",
    long_about = "Render every `.page` element of each HTML report to a high-resolution PNG \
with headless Chrome, then place each PNG on its own slide in a .pptx deck per report, \
plus an optional combined deck.",
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Only render HTML to images.
    #[arg(long, conflicts_with_all = ["decks_only", "list"])]
    images_only: bool,

    /// Only assemble decks from existing images.
    #[arg(long, conflicts_with = "list")]
    decks_only: bool,

    /// Print the HTML files that would be rendered, then exit.
    #[arg(long)]
    list: bool,

    /// JSON configuration file. Flags override its values.
    #[arg(long, env = "HTML2DECK_CONFIG")]
    config: Option<PathBuf>,

    /// Directory decks are written to [default: output].
    #[arg(short, long, env = "HTML2DECK_OUTPUT_DIR")]
    output_dir: Option<PathBuf>,

    /// Directory images are written to and read from [default: {output-dir}/images].
    #[arg(long, env = "HTML2DECK_IMAGES_DIR")]
    images_dir: Option<PathBuf>,

    /// Directory the default scan patterns start from [default: .].
    #[arg(long, env = "HTML2DECK_ROOT")]
    root: Option<PathBuf>,

    /// Scan glob; repeat for several. Replaces the default patterns.
    #[arg(long = "include", env = "HTML2DECK_INCLUDE", value_delimiter = ',')]
    include: Vec<String>,

    /// Exclude glob; repeat for several. Replaces the default excludes.
    #[arg(long = "exclude", env = "HTML2DECK_EXCLUDE", value_delimiter = ',')]
    exclude: Vec<String>,

    /// Viewport width in CSS pixels [default: 1122].
    #[arg(long, env = "HTML2DECK_WIDTH",
          value_parser = clap::value_parser!(u32).range(1..=16384))]
    width: Option<u32>,

    /// Viewport height in CSS pixels [default: 794].
    #[arg(long, env = "HTML2DECK_HEIGHT",
          value_parser = clap::value_parser!(u32).range(1..=16384))]
    height: Option<u32>,

    /// Device scale multiplier (1–8) [default: 3].
    #[arg(long, env = "HTML2DECK_SCALE",
          value_parser = clap::value_parser!(u32).range(1..=8))]
    scale: Option<u32>,

    /// CSS selector of page elements [default: .page].
    #[arg(long, env = "HTML2DECK_SELECTOR")]
    selector: Option<String>,

    /// Skip the per-report decks.
    #[arg(long, env = "HTML2DECK_NO_SEPARATE")]
    no_separate: bool,

    /// Skip the combined deck.
    #[arg(long, env = "HTML2DECK_NO_COMBINED")]
    no_combined: bool,

    /// Chrome/Chromium executable. Auto-detected when unset.
    #[arg(long, env = "HTML2DECK_CHROME")]
    chrome: Option<PathBuf>,

    /// Disable Chrome's sandbox (needed when running as root in containers).
    #[arg(long, env = "HTML2DECK_NO_SANDBOX")]
    no_sandbox: bool,

    /// Output structured JSON reports on stdout.
    #[arg(long, env = "HTML2DECK_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "HTML2DECK_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "HTML2DECK_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "HTML2DECK_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO-level library logs.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json && !cli.list;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let progress = show_progress.then(CliProgressCallback::new_dynamic);
    let config = build_config(
        &cli,
        progress
            .clone()
            .map(|cb| cb as Arc<dyn ConversionProgressCallback>),
    )?;

    // ── List mode ────────────────────────────────────────────────────────
    if cli.list {
        let discovery = scan(&config);
        for err in &discovery.pattern_errors {
            eprintln!("{} {}", yellow("⚠"), err);
        }
        if cli.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&discovery.files)
                    .context("Failed to serialise file list")?
            );
        } else {
            for path in discovery.relative_listing(&config.scan_root) {
                println!("{}", path.display());
            }
            if !cli.quiet {
                eprintln!("{} HTML files", discovery.files.len());
            }
        }
        return Ok(());
    }

    // ── Run stages ───────────────────────────────────────────────────────
    let mut summary = PipelineSummary::default();

    if !cli.decks_only {
        let report = render_images(&config)
            .await
            .context("Rendering failed")?;
        summary.render = Some(report);
    }

    if let Some(cb) = &progress {
        cb.finish();
    }

    if !cli.images_only {
        let report = build_decks(&config)
            .await
            .context("Deck assembly failed")?;
        summary.decks = Some(report);
    }

    // ── Report ───────────────────────────────────────────────────────────
    if cli.json {
        let json = serde_json::to_string_pretty(&summary).context("Failed to serialise summary")?;
        println!("{json}");
    }

    if !cli.quiet {
        if let Some(ref render) = summary.render {
            print_render_summary(render, &config, show_progress);
        }
        if let Some(ref decks) = summary.decks {
            print_deck_summary(decks, &config);
        }
    }

    Ok(())
}

/// Defaults, then the config file, then flags.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<ConversionConfig> {
    let mut builder = ConversionConfig::builder();

    if let Some(ref path) = cli.config {
        builder = builder.apply_file(&ConfigFile::load_or_default(path));
    }

    if let Some(ref dir) = cli.output_dir {
        builder = builder.output_dir(dir);
    }
    if let Some(ref dir) = cli.images_dir {
        builder = builder.images_dir(dir);
    }
    if let Some(ref root) = cli.root {
        builder = builder.scan_root(root);
    }
    if !cli.include.is_empty() {
        builder = builder.include_patterns(cli.include.clone());
    }
    if !cli.exclude.is_empty() {
        builder = builder.exclude_patterns(cli.exclude.clone());
    }
    if let Some(w) = cli.width {
        builder = builder.viewport_width(w);
    }
    if let Some(h) = cli.height {
        builder = builder.viewport_height(h);
    }
    if let Some(scale) = cli.scale {
        builder = builder.device_scale_factor(scale);
    }
    if let Some(ref selector) = cli.selector {
        builder = builder.page_selector(selector.as_str());
    }
    if let Some(ref chrome) = cli.chrome {
        builder = builder.chrome_path(chrome);
    }
    if cli.no_separate {
        builder = builder.separate_decks(false);
    }
    if cli.no_combined {
        builder = builder.combined_deck(false);
    }
    if cli.no_sandbox {
        builder = builder.sandbox(false);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

fn print_render_summary(report: &RenderReport, config: &ConversionConfig, show_progress: bool) {
    for err in &report.pattern_errors {
        eprintln!("{} bad pattern {}", yellow("⚠"), err);
    }
    if report.files.is_empty() {
        eprintln!("{} No HTML files found", yellow("⚠"));
        return;
    }
    // The progress bar already printed per-file lines and a tick.
    if !show_progress {
        for file in report.files.iter().filter(|f| !f.is_success()) {
            if let Some(ref err) = file.error {
                eprintln!("  {} {}: {}", red("✗"), file_name(&file.source), err);
            }
        }
    }
    eprintln!(
        "{}  Images: {} succeeded, {} failed  {} PNGs  {}ms  →  {}",
        if report.failed() == 0 {
            green("✔")
        } else {
            cyan("⚠")
        },
        report.succeeded(),
        report.failed(),
        report.total_images(),
        report.total_duration_ms,
        bold(&config.resolved_images_dir().display().to_string()),
    );
}

fn print_deck_summary(report: &DeckReport, config: &ConversionConfig) {
    if report.groups == 0 {
        eprintln!("{} No image groups found", yellow("⚠"));
        return;
    }
    eprintln!(
        "{}  Decks: {} written  {} slides  {} images skipped  {}ms  →  {}",
        if report.skipped_images.is_empty() {
            green("✔")
        } else {
            cyan("⚠")
        },
        report.decks.len(),
        report.total_slides(),
        report.skipped_images.len(),
        report.total_duration_ms,
        bold(&config.output_dir.display().to_string()),
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn width_and_height_flags_go_through_validation() {
        let cli = Cli::parse_from(["html2deck", "--width", "1280"]);
        let config = build_config(&cli, None).unwrap();
        assert_eq!((config.viewport.width, config.viewport.height), (1280, 794));

        let cli = Cli::parse_from(["html2deck", "--height", "600", "--width", "800"]);
        let config = build_config(&cli, None).unwrap();
        assert_eq!((config.viewport.width, config.viewport.height), (800, 600));

        assert!(Cli::try_parse_from(["html2deck", "--width", "0"]).is_err());
    }

    #[test]
    fn flags_override_config_file_viewport() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("html2deck.json");
        std::fs::write(
            &path,
            r#"{ "viewport": { "width": 1000, "height": 700, "deviceScaleFactor": 2 } }"#,
        )
        .unwrap();

        let cli = Cli::parse_from([
            "html2deck",
            "--config",
            path.to_str().unwrap(),
            "--height",
            "500",
        ]);
        let config = build_config(&cli, None).unwrap();
        assert_eq!(config.viewport.width, 1000);
        assert_eq!(config.viewport.height, 500);
        assert_eq!(config.viewport.device_scale_factor, 2);
    }

    #[test]
    fn failed_files_are_counted_for_the_summary() {
        let cb = CliProgressCallback::new_dynamic();
        cb.on_render_start(3);
        cb.on_file_start(1, 3, Path::new("a.html"));
        cb.on_file_error(1, 3, Path::new("a.html"), "navigation timed out");
        cb.on_file_start(2, 3, Path::new("b.html"));
        cb.on_file_complete(2, 3, Path::new("b.html"), 2);
        cb.on_file_start(3, 3, Path::new("c.html"));
        cb.on_file_error(3, 3, Path::new("c.html"), "capture failed");
        cb.on_render_complete(3, 1);
        assert_eq!(cb.errors.load(Ordering::SeqCst), 2);
    }
}
