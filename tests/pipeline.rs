//! Full-pipeline integration tests with a scripted browser.
//!
//! The fake launcher stands in for Chrome: each "page" it captures is a solid
//! PNG sized to the viewport at the configured device scale. Everything else
//! (discovery, naming, teardown, grouping, deck writing) is the real code.

use html2deck::{
    convert_with, render_images_with, BrowserLauncher, ConversionConfig,
    ConversionProgressCallback, FileError, PageSession, ProgressCallback, Viewport,
};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

// ── Fake browser ─────────────────────────────────────────────────────────────

/// Page counts are read from a `data-pages="N"` attribute in the HTML file, so
/// each test file scripts its own behaviour. `data-fail` makes navigation fail.
struct ScriptedLauncher {
    live: Arc<AtomicUsize>,
    launches: Arc<AtomicUsize>,
}

impl ScriptedLauncher {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            live: Arc::default(),
            launches: Arc::default(),
        })
    }
}

struct ScriptedSession {
    viewport: Viewport,
    pages: usize,
    live: Arc<AtomicUsize>,
}

impl BrowserLauncher for ScriptedLauncher {
    fn launch(&self, viewport: &Viewport) -> Result<Box<dyn PageSession>, FileError> {
        let now_live = self.live.fetch_add(1, Ordering::SeqCst) + 1;
        assert_eq!(now_live, 1, "two browser sessions alive at once");
        self.launches.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(ScriptedSession {
            viewport: *viewport,
            pages: 0,
            live: self.live.clone(),
        }))
    }
}

impl PageSession for ScriptedSession {
    fn open(&mut self, url: &str, _timeout: Duration) -> Result<(), FileError> {
        let path = url::Url::parse(url)
            .ok()
            .and_then(|u| u.to_file_path().ok())
            .ok_or_else(|| FileError::Navigation {
                detail: format!("not a file url: {url}"),
            })?;
        let html = std::fs::read_to_string(&path).map_err(|e| FileError::Navigation {
            detail: e.to_string(),
        })?;
        if html.contains("data-fail") {
            return Err(FileError::NavigationTimeout { secs: 60 });
        }
        self.pages = html.matches("class=\"page\"").count();
        Ok(())
    }

    fn count_pages(&mut self, _selector: &str) -> Result<usize, FileError> {
        Ok(self.pages)
    }

    fn capture_page(
        &mut self,
        _selector: &str,
        _index: usize,
        _settle: Duration,
    ) -> Result<Vec<u8>, FileError> {
        let (w, h) = self.viewport.device_pixels();
        Ok(solid_png(w, h))
    }
}

impl Drop for ScriptedSession {
    fn drop(&mut self) {
        self.live.fetch_sub(1, Ordering::SeqCst);
    }
}

// ── Helpers ──────────────────────────────────────────────────────────────────

fn solid_png(w: u32, h: u32) -> Vec<u8> {
    let img = image::RgbImage::from_pixel(w, h, image::Rgb([250, 250, 250]));
    let mut out = Vec::new();
    image::DynamicImage::ImageRgb8(img)
        .write_to(&mut std::io::Cursor::new(&mut out), image::ImageFormat::Png)
        .unwrap();
    out
}

fn report_html(pages: usize) -> String {
    let body: String = (0..pages)
        .map(|i| format!("<div class=\"page\">Page {}</div>\n", i + 1))
        .collect();
    format!("<!doctype html><html><body>\n{body}</body></html>")
}

fn write(root: &Path, rel: &str, contents: &str) -> PathBuf {
    let path = root.join(rel);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(&path, contents).unwrap();
    path
}

fn config(root: &Path, scale: u32) -> ConversionConfig {
    ConversionConfig::builder()
        .scan_root(root.join("reports"))
        .output_dir(root.join("output"))
        .viewport_size(112, 79)
        .device_scale_factor(scale)
        .settle_delay(Duration::ZERO)
        .capture_delay(Duration::ZERO)
        .build()
        .unwrap()
}

fn deck_slide_descriptions(deck: &Path) -> Vec<String> {
    let file = std::fs::File::open(deck).unwrap();
    let mut archive = zip::ZipArchive::new(file).unwrap();
    let mut out = Vec::new();
    for n in 1.. {
        let name = format!("ppt/slides/slide{n}.xml");
        let Ok(mut part) = archive.by_name(&name) else {
            break;
        };
        let mut xml = String::new();
        part.read_to_string(&mut xml).unwrap();
        let descr = xml
            .split("descr=\"")
            .nth(1)
            .and_then(|rest| rest.split('"').next())
            .unwrap_or_default()
            .to_string();
        out.push(descr);
    }
    out
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn three_page_report_becomes_three_slide_deck() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "reports/report.html", &report_html(3));
    let launcher = ScriptedLauncher::new();

    let summary = convert_with(&config(dir.path(), 3), launcher.clone())
        .await
        .unwrap();

    let render = summary.render.unwrap();
    assert_eq!(render.succeeded(), 1);
    assert_eq!(render.total_images(), 3);

    let images = dir.path().join("output/images");
    for n in 1..=3 {
        let png = images.join(format!("report_page_{n:02}.png"));
        assert_eq!(image::image_dimensions(&png).unwrap(), (336, 237));
    }

    let deck = dir.path().join("output/report.pptx");
    assert_eq!(
        deck_slide_descriptions(&deck),
        vec!["report_page_01.png", "report_page_02.png", "report_page_03.png"]
    );
    assert_eq!(launcher.live.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn combined_deck_follows_group_then_page_order() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "reports/beta.html", &report_html(2));
    write(dir.path(), "reports/nested/alpha.html", &report_html(3));

    let summary = convert_with(&config(dir.path(), 1), ScriptedLauncher::new())
        .await
        .unwrap();
    let decks = summary.decks.unwrap();
    assert_eq!(decks.total_slides(), 10);

    let combined = deck_slide_descriptions(&dir.path().join("output/combined_reports.pptx"));
    assert_eq!(
        combined,
        vec![
            "alpha_page_01.png",
            "alpha_page_02.png",
            "alpha_page_03.png",
            "beta_page_01.png",
            "beta_page_02.png",
        ]
    );
}

#[tokio::test]
async fn failing_file_does_not_stop_the_run() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "reports/a.html", &report_html(1));
    write(dir.path(), "reports/b.html", "<html data-fail></html>");
    write(dir.path(), "reports/c.html", &report_html(2));
    let launcher = ScriptedLauncher::new();

    let summary = convert_with(&config(dir.path(), 1), launcher.clone())
        .await
        .unwrap();

    let render = summary.render.unwrap();
    assert_eq!(render.succeeded(), 2);
    assert_eq!(render.failed(), 1);
    let failed = render.files.iter().find(|f| !f.is_success()).unwrap();
    assert_eq!(failed.stem, "b");
    assert!(matches!(
        failed.error,
        Some(FileError::NavigationTimeout { secs: 60 })
    ));
    assert_eq!(launcher.launches.load(Ordering::SeqCst), 3);

    let names: Vec<String> = summary
        .decks
        .unwrap()
        .decks
        .into_iter()
        .map(|d| d.name)
        .collect();
    assert_eq!(names, vec!["a", "c", "combined_reports"]);
}

#[tokio::test]
async fn report_without_page_markers_succeeds_with_no_deck() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "reports/blank.html", "<html><body>no markers</body></html>");

    let summary = convert_with(&config(dir.path(), 2), ScriptedLauncher::new())
        .await
        .unwrap();
    let render = summary.render.unwrap();
    assert_eq!(render.succeeded(), 1);
    assert_eq!(render.total_images(), 0);
    assert!(summary.decks.unwrap().decks.is_empty());
}

#[tokio::test]
async fn excluded_directories_are_not_rendered() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "reports/keep.html", &report_html(1));
    write(dir.path(), "reports/node_modules/lib/doc.html", &report_html(1));
    write(dir.path(), "reports/dist/old.html", &report_html(1));

    let report = render_images_with(&config(dir.path(), 1), ScriptedLauncher::new())
        .await
        .unwrap();
    assert_eq!(report.files.len(), 1);
    assert_eq!(report.files[0].stem, "keep");
}

#[derive(Default)]
struct EventLog(Mutex<Vec<String>>);

impl ConversionProgressCallback for EventLog {
    fn on_render_start(&self, total_files: usize) {
        self.0.lock().unwrap().push(format!("start {total_files}"));
    }
    fn on_file_complete(&self, index: usize, _total: usize, _source: &Path, images: usize) {
        self.0.lock().unwrap().push(format!("file {index} {images}"));
    }
    fn on_file_error(&self, index: usize, _total: usize, _source: &Path, _error: &str) {
        self.0.lock().unwrap().push(format!("error {index}"));
    }
    fn on_render_complete(&self, total_files: usize, succeeded: usize) {
        self.0
            .lock()
            .unwrap()
            .push(format!("done {succeeded}/{total_files}"));
    }
    fn on_deck_written(&self, deck: &Path, slides: usize) {
        let name = deck.file_name().unwrap().to_string_lossy().into_owned();
        self.0.lock().unwrap().push(format!("deck {name} {slides}"));
    }
}

#[tokio::test]
async fn progress_events_arrive_in_order() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "reports/a.html", &report_html(2));
    write(dir.path(), "reports/b.html", "<html data-fail></html>");

    let log = Arc::new(EventLog::default());
    let mut cfg = config(dir.path(), 1);
    let callback: ProgressCallback = log.clone();
    cfg.progress_callback = Some(callback);
    cfg.combined_deck = false;

    convert_with(&cfg, ScriptedLauncher::new()).await.unwrap();

    let events = log.0.lock().unwrap().clone();
    assert_eq!(
        events,
        vec!["start 2", "file 1 2", "error 2", "done 1/2", "deck a.pptx 2"]
    );
}

#[tokio::test]
async fn summary_serialises_to_json() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "reports/r.html", &report_html(1));

    let summary = convert_with(&config(dir.path(), 1), ScriptedLauncher::new())
        .await
        .unwrap();
    let json = serde_json::to_value(&summary).unwrap();
    assert_eq!(json["render"]["files"][0]["stem"], "r");
    assert_eq!(json["decks"]["decks"][0]["slides"], 1);
}
