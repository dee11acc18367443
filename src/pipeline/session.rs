//! Browser sessions: one fresh headless Chrome per HTML file.
//!
//! [`BrowserLauncher`] and [`PageSession`] are the seam between the render
//! loop and the browser. [`ChromeLauncher`] drives a real Chrome over the
//! DevTools protocol via `headless_chrome`; tests substitute a scripted fake.
//!
//! A session owns its browser process. Dropping it closes the tab and kills
//! the process, so teardown happens on every exit path of the render loop,
//! including early returns and panics.

use crate::config::Viewport;
use crate::error::{FileError, Html2DeckError};
use headless_chrome::browser::tab::Tab;
use headless_chrome::protocol::cdp::Page;
use headless_chrome::{Browser, LaunchOptions};
use serde::Deserialize;
use std::ffi::{OsStr, OsString};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// How often network activity is sampled while waiting for idle.
const IDLE_POLL: Duration = Duration::from_millis(100);

/// The resource count must stay unchanged this long to count as idle.
const IDLE_WINDOW: Duration = Duration::from_millis(500);

/// Starts isolated browser sessions.
pub trait BrowserLauncher: Send + Sync {
    /// Check once, before any file is processed, that a browser can be
    /// started at all. A failure here aborts the whole run.
    fn preflight(&self) -> Result<(), Html2DeckError> {
        Ok(())
    }

    /// Start a fresh session sized to `viewport`.
    fn launch(&self, viewport: &Viewport) -> Result<Box<dyn PageSession>, FileError>;
}

/// A live page inside an isolated browser session.
pub trait PageSession {
    /// Navigate to `url` and wait for the load plus network idle, all within `timeout`.
    fn open(&mut self, url: &str, timeout: Duration) -> Result<(), FileError>;

    /// Number of elements matching `selector`, in document order.
    fn count_pages(&mut self, selector: &str) -> Result<usize, FileError>;

    /// Scroll the `index`-th (0-based) match into view, wait `settle`, and
    /// return a PNG cropped to the element's border box.
    fn capture_page(
        &mut self,
        selector: &str,
        index: usize,
        settle: Duration,
    ) -> Result<Vec<u8>, FileError>;
}

// ── Chrome ───────────────────────────────────────────────────────────────

/// Launches a new headless Chrome process per session.
#[derive(Debug, Clone)]
pub struct ChromeLauncher {
    /// Explicit executable. `None` uses `headless_chrome`'s lookup
    /// (`CHROME` env var, then PATH and well-known install locations).
    pub chrome_path: Option<PathBuf>,
    pub sandbox: bool,
    pub navigation_timeout: Duration,
}

impl ChromeLauncher {
    pub fn new(chrome_path: Option<PathBuf>, sandbox: bool, navigation_timeout: Duration) -> Self {
        Self {
            chrome_path,
            sandbox,
            navigation_timeout,
        }
    }

    fn executable(&self) -> Result<PathBuf, String> {
        match self.chrome_path {
            Some(ref path) if path.exists() => Ok(path.clone()),
            Some(ref path) => Err(format!("'{}' does not exist", path.display())),
            None => headless_chrome::browser::default_executable(),
        }
    }
}

impl BrowserLauncher for ChromeLauncher {
    fn preflight(&self) -> Result<(), Html2DeckError> {
        let exe = self
            .executable()
            .map_err(|detail| Html2DeckError::BrowserUnavailable { detail })?;
        debug!("Using browser {}", exe.display());
        Ok(())
    }

    fn launch(&self, viewport: &Viewport) -> Result<Box<dyn PageSession>, FileError> {
        let launch_err = |detail: String| FileError::Launch { detail };

        let exe = self.executable().map_err(launch_err)?;
        let scale_arg = OsString::from(format!(
            "--force-device-scale-factor={}",
            viewport.device_scale_factor
        ));
        let args: Vec<&OsStr> = vec![scale_arg.as_os_str(), OsStr::new("--hide-scrollbars")];

        let options = LaunchOptions::default_builder()
            .headless(true)
            .sandbox(self.sandbox)
            .path(Some(exe))
            .window_size(Some((viewport.width, viewport.height)))
            .args(args)
            // Must outlast the longest wait between protocol events.
            .idle_browser_timeout(self.navigation_timeout + Duration::from_secs(30))
            .build()
            .map_err(|e| launch_err(format!("invalid launch options: {e}")))?;

        let browser = Browser::new(options)
            .map_err(|e| launch_err(format!("failed to launch browser: {e}")))?;
        let tab = browser
            .new_tab()
            .map_err(|e| launch_err(format!("failed to create tab: {e}")))?;

        Ok(Box::new(ChromeSession { tab, browser }))
    }
}

/// A single tab in a dedicated browser process.
///
/// Field order matters: the tab is dropped before the browser that owns it.
struct ChromeSession {
    tab: Arc<Tab>,
    browser: Browser,
}

/// Border box of an element in document coordinates (CSS px).
#[derive(Debug, Deserialize)]
struct ElementRect {
    x: f64,
    y: f64,
    width: f64,
    height: f64,
}

impl ChromeSession {
    fn evaluate(&self, expression: &str) -> Result<Option<serde_json::Value>, String> {
        self.tab
            .evaluate(expression, false)
            .map(|remote| remote.value)
            .map_err(|e| e.to_string())
    }

    /// Poll until the document is complete and no new resources have been
    /// requested for [`IDLE_WINDOW`].
    fn wait_for_network_idle(&self, deadline: Instant, timeout: Duration) -> Result<(), FileError> {
        const PROBE: &str = "document.readyState === 'complete' \
            ? performance.getEntriesByType('resource').length : -1";

        let mut last_count: Option<i64> = None;
        let mut stable_since = Instant::now();

        loop {
            let count = self
                .evaluate(PROBE)
                .map_err(|detail| FileError::Navigation { detail })?
                .and_then(|v| v.as_i64())
                .unwrap_or(-1);

            if count >= 0 && last_count == Some(count) {
                if stable_since.elapsed() >= IDLE_WINDOW {
                    return Ok(());
                }
            } else {
                last_count = Some(count);
                stable_since = Instant::now();
            }

            if Instant::now() >= deadline {
                return Err(FileError::NavigationTimeout {
                    secs: timeout.as_secs(),
                });
            }
            std::thread::sleep(IDLE_POLL);
        }
    }

    fn element_script(selector: &str, index: usize, body: &str) -> String {
        // JSON string literals are valid JS string literals.
        let selector = serde_json::to_string(selector).unwrap_or_else(|_| "''".into());
        format!(
            "(() => {{ const el = document.querySelectorAll({selector})[{index}]; \
             if (!el) return null; {body} }})()"
        )
    }
}

impl PageSession for ChromeSession {
    fn open(&mut self, url: &str, timeout: Duration) -> Result<(), FileError> {
        let started = Instant::now();
        let deadline = started + timeout;
        self.tab.set_default_timeout(timeout);

        let navigated = self
            .tab
            .navigate_to(url)
            .and_then(|tab| tab.wait_until_navigated());

        if let Err(e) = navigated {
            return Err(if started.elapsed() >= timeout {
                FileError::NavigationTimeout {
                    secs: timeout.as_secs(),
                }
            } else {
                FileError::Navigation {
                    detail: e.to_string(),
                }
            });
        }

        self.wait_for_network_idle(deadline, timeout)?;
        debug!("Loaded {} in {}ms", url, started.elapsed().as_millis());
        Ok(())
    }

    fn count_pages(&mut self, selector: &str) -> Result<usize, FileError> {
        let selector_js = serde_json::to_string(selector).unwrap_or_else(|_| "''".into());
        let value = self
            .evaluate(&format!("document.querySelectorAll({selector_js}).length"))
            .map_err(|detail| FileError::Capture { page: 0, detail })?;

        value
            .and_then(|v| v.as_u64())
            .map(|n| n as usize)
            .ok_or_else(|| FileError::Capture {
                page: 0,
                detail: format!("could not count elements matching '{selector}'"),
            })
    }

    fn capture_page(
        &mut self,
        selector: &str,
        index: usize,
        settle: Duration,
    ) -> Result<Vec<u8>, FileError> {
        let page = index + 1;
        let capture_err = |detail: String| FileError::Capture { page, detail };

        let scroll = Self::element_script(
            selector,
            index,
            "el.scrollIntoView({ block: 'start', inline: 'start' }); return true;",
        );
        self.evaluate(&scroll)
            .map_err(capture_err)?
            .filter(|v| v.as_bool() == Some(true))
            .ok_or_else(|| capture_err("element disappeared before capture".into()))?;

        std::thread::sleep(settle);

        let measure = Self::element_script(
            selector,
            index,
            "const r = el.getBoundingClientRect(); \
             return JSON.stringify({ x: r.left + window.scrollX, y: r.top + window.scrollY, \
             width: r.width, height: r.height });",
        );
        let raw = self
            .evaluate(&measure)
            .map_err(capture_err)?
            .and_then(|v| v.as_str().map(str::to_owned))
            .ok_or_else(|| capture_err("element disappeared before capture".into()))?;
        let rect: ElementRect = serde_json::from_str(&raw)
            .map_err(|e| capture_err(format!("bad element bounds: {e}")))?;

        if rect.width <= 0.0 || rect.height <= 0.0 {
            return Err(capture_err(format!(
                "element has empty bounds {}x{}",
                rect.width, rect.height
            )));
        }

        let clip = Page::Viewport {
            x: rect.x,
            y: rect.y,
            width: rect.width,
            height: rect.height,
            scale: 1.0,
        };

        self.tab
            .capture_screenshot(
                Page::CaptureScreenshotFormatOption::Png,
                None,
                Some(clip),
                true,
            )
            .map_err(|e| capture_err(format!("screenshot failed: {e}")))
    }
}

impl Drop for ChromeSession {
    fn drop(&mut self) {
        if let Err(e) = self.tab.close(false) {
            warn!("Failed to close tab cleanly: {}", e);
        }
        // `Browser` kills its child process when dropped.
        debug!(
            "Browser session closed (pid {:?})",
            self.browser.get_process_id()
        );
    }
}
