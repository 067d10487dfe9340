//! Chrome DevTools Protocol implementation of the traversal engine.

use crate::chrome::Chrome;
use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::emulation::SetEmulatedMediaParams;
use chromiumoxide::cdp::browser_protocol::input::{DispatchKeyEventParams, DispatchKeyEventType};
use chromiumoxide::cdp::browser_protocol::page::{CaptureScreenshotFormat, PrintToPdfParams};
use chromiumoxide::handler::viewport::Viewport as CdpViewport;
use chromiumoxide::page::ScreenshotParams;
use chromiumoxide::{Browser, BrowserConfig, Page as CdpPage};
use exn::ResultExt;
use futures::StreamExt;
use serde_json::Value;
use slidecap_traverse::page::error::{ErrorKind, Result};
use slidecap_traverse::page::{Fidelity, Key, Launcher, Page, PageHandle, Script, Viewport};
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::instrument;

/// JPEG quality of fingerprint captures. Only ever compared for equality.
const FINGERPRINT_QUALITY: i64 = 10;

/// How to start each engine instance.
#[derive(Clone, Debug)]
pub struct ChromeOptions {
    pub viewport: Viewport,
    /// Run with Chrome's sandbox. Usually unavailable inside containers.
    pub sandbox: bool,
    pub launch_timeout: Duration,
    /// Upper bound on a single protocol request.
    pub request_timeout: Duration,
    /// Extra command line arguments.
    pub args: Vec<String>,
}
impl Default for ChromeOptions {
    fn default() -> Self {
        Self {
            viewport: Viewport::default(),
            sandbox: false,
            launch_timeout: Duration::from_secs(30),
            request_timeout: Duration::from_secs(120),
            args: Vec::new(),
        }
    }
}

/// Launches one isolated headless browser per traversal.
///
/// Every launch gets its own temporary profile directory, removed again when
/// the page is dropped.
#[derive(Clone, Debug)]
pub struct ChromeLauncher {
    chrome: Chrome,
    options: ChromeOptions,
}
impl ChromeLauncher {
    pub fn new(chrome: Chrome, options: ChromeOptions) -> Self {
        Self { chrome, options }
    }

    fn config(&self, profile: &TempDir) -> Result<BrowserConfig> {
        let Viewport { width, height } = self.options.viewport;
        let mut builder = BrowserConfig::builder()
            .chrome_executable(self.chrome.path())
            .user_data_dir(profile.path())
            .window_size(width, height)
            .viewport(CdpViewport {
                width,
                height,
                device_scale_factor: Some(1.0),
                emulating_mobile: false,
                is_landscape: width >= height,
                has_touch: false,
            })
            .launch_timeout(self.options.launch_timeout)
            .request_timeout(self.options.request_timeout)
            .args(self.options.args.iter().map(String::as_str));
        if !self.options.sandbox {
            builder = builder.no_sandbox();
        }
        Ok(builder.build().map_err(ErrorKind::Protocol)?)
    }
}

#[async_trait]
impl Launcher for ChromeLauncher {
    #[instrument(skip(self), fields(chrome = %self.chrome.path().display()))]
    async fn launch(&self) -> Result<PageHandle> {
        let profile = TempDir::new().or_raise(|| ErrorKind::Launch)?;
        let config = self.config(&profile)?;
        let (browser, mut handler) = Browser::launch(config).await.or_raise(|| ErrorKind::Launch)?;
        let events = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        let page = match browser.new_page("about:blank").await {
            Ok(page) => page,
            Err(e) => {
                events.abort();
                return Err(e).or_raise(|| ErrorKind::Launch);
            },
        };
        // Decks are designed for screens; print media would restyle them.
        let media = SetEmulatedMediaParams { media: Some("screen".to_string()), ..SetEmulatedMediaParams::default() };
        page.execute(media).await.or_raise(|| ErrorKind::Launch)?;
        tracing::debug!(viewport = %self.options.viewport, "Browser launched");

        Ok(Box::new(ChromePage {
            page,
            browser: Mutex::new(browser),
            events,
            viewport: self.options.viewport,
            _profile: profile,
        }))
    }
}

/// A single browser tab, owning the browser process it lives in.
struct ChromePage {
    page: CdpPage,
    browser: Mutex<Browser>,
    events: JoinHandle<()>,
    viewport: Viewport,
    _profile: TempDir,
}

impl ChromePage {
    async fn key_event(&self, kind: DispatchKeyEventType, key: Key, text: Option<&str>) -> Result<()> {
        let mut builder = DispatchKeyEventParams::builder()
            .r#type(kind)
            .key(key.key())
            .code(key.code())
            .windows_virtual_key_code(key.key_code())
            .native_virtual_key_code(key.key_code());
        if let Some(text) = text {
            builder = builder.text(text);
        }
        let params = builder.build().map_err(ErrorKind::Protocol)?;
        self.page.execute(params).await.or_raise(|| ErrorKind::Input)?;
        Ok(())
    }
}

#[async_trait]
impl Page for ChromePage {
    fn viewport(&self) -> Viewport {
        self.viewport
    }

    #[instrument(skip(self))]
    async fn load(&self, url: &str, limit: Duration) -> Result<()> {
        timeout(limit, self.page.goto(url)).await.or_raise(|| ErrorKind::Timeout)?.or_raise(|| ErrorKind::Load)?;
        Ok(())
    }

    async fn evaluate(&self, script: &Script) -> Result<Value> {
        let result = self.page.evaluate(script.source()).await.or_raise(|| ErrorKind::Script)?;
        Ok(result.value().cloned().unwrap_or(Value::Null))
    }

    async fn inject_style(&self, css: &str) -> Result<()> {
        let css = serde_json::to_string(css).or_raise(|| ErrorKind::Style)?;
        let source = format!(
            "(() => {{ const style = document.createElement('style'); style.textContent = {css}; \
             (document.head || document.documentElement).appendChild(style); return true; }})()"
        );
        self.page.evaluate(source).await.or_raise(|| ErrorKind::Style)?;
        Ok(())
    }

    async fn press_key(&self, key: Key) -> Result<()> {
        self.key_event(DispatchKeyEventType::KeyDown, key, key.text()).await?;
        self.key_event(DispatchKeyEventType::KeyUp, key, None).await
    }

    async fn capture_raster(&self, fidelity: Fidelity) -> Result<Vec<u8>> {
        let params = match fidelity {
            Fidelity::Full => ScreenshotParams::builder().format(CaptureScreenshotFormat::Png).build(),
            Fidelity::Fingerprint => ScreenshotParams::builder()
                .format(CaptureScreenshotFormat::Jpeg)
                .quality(FINGERPRINT_QUALITY)
                .build(),
        };
        self.page.screenshot(params).await.or_raise(|| ErrorKind::Capture)
    }

    async fn capture_document(&self, viewport: Viewport) -> Result<Vec<u8>> {
        let (paper_width, paper_height) = viewport.paper_inches();
        let params = PrintToPdfParams {
            landscape: Some(false),
            print_background: Some(true),
            paper_width: Some(paper_width),
            paper_height: Some(paper_height),
            margin_top: Some(0.0),
            margin_bottom: Some(0.0),
            margin_left: Some(0.0),
            margin_right: Some(0.0),
            page_ranges: Some("1".to_string()),
            prefer_css_page_size: Some(false),
            ..PrintToPdfParams::default()
        };
        self.page.pdf(params).await.or_raise(|| ErrorKind::Capture)
    }

    async fn close(&self) -> Result<()> {
        let mut browser = self.browser.lock().await;
        let closed = browser.close().await.or_raise(|| ErrorKind::Close);
        if closed.is_ok() {
            browser.wait().await.or_raise(|| ErrorKind::Close)?;
        }
        self.events.abort();
        closed.map(|_| ())
    }
}

impl Drop for ChromePage {
    fn drop(&mut self) {
        self.events.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_a_laptop_screen() {
        let options = ChromeOptions::default();
        assert_eq!(options.viewport, Viewport::new(1280, 720));
        assert!(!options.sandbox);
    }

    #[test]
    fn config_builds_without_launching() {
        let exe = std::env::current_exe().unwrap();
        let launcher = ChromeLauncher::new(Chrome::at(exe).unwrap(), ChromeOptions::default());
        let profile = TempDir::new().unwrap();
        assert!(launcher.config(&profile).is_ok());
    }
}
