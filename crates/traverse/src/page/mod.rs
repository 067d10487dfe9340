//! Rendering engine collaborator interface.
//!
//! The traversal core never talks to a browser directly. It drives a [`Page`]
//! obtained from a [`Launcher`], and everything it needs from the engine is
//! listed on that trait: load, script evaluation, style injection, simulated
//! key presses, raster capture and paginated (vector) capture.
//!
//! A [`Page`] is exclusively owned by one traversal for its whole lifetime and
//! is closed when the traversal ends. Batch runs launch a fresh page each
//! time rather than keeping an engine alive between requests.

pub mod error;
mod script;

pub use self::script::Script;
use crate::page::error::Result;
use async_trait::async_trait;
use derive_more::Display;
use serde_json::Value;
use std::time::Duration;

/// Owned, type-erased handle to a launched page.
pub type PageHandle = Box<dyn Page>;

/// Pixel dimensions of the rendered view.
///
/// Vector captures use these exact dimensions as the page size, so the
/// resulting document page has the same aspect and geometry as the screen.
#[derive(Clone, Copy, Debug, Display, PartialEq, Eq, Hash)]
#[display("{width}x{height}")]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}
impl Viewport {
    /// CSS reference pixels per inch.
    pub const CSS_DPI: f64 = 96.0;

    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Paper size in inches (width, height) for a one-page document covering
    /// exactly this viewport.
    pub fn paper_inches(&self) -> (f64, f64) {
        (f64::from(self.width) / Self::CSS_DPI, f64::from(self.height) / Self::CSS_DPI)
    }
}
impl Default for Viewport {
    /// 1280x720: a laptop-sized 16:9 view that most decks are designed for.
    fn default() -> Self {
        Self::new(1280, 720)
    }
}

/// Simulated keyboard input.
#[derive(Clone, Copy, Debug, Display, PartialEq, Eq)]
pub enum Key {
    #[display("Space")]
    Space,
    #[display("ArrowRight")]
    ArrowRight,
}
impl Key {
    /// DOM `KeyboardEvent.key` value.
    pub fn key(&self) -> &'static str {
        match self {
            Self::Space => " ",
            Self::ArrowRight => "ArrowRight",
        }
    }

    /// DOM `KeyboardEvent.code` value.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Space => "Space",
            Self::ArrowRight => "ArrowRight",
        }
    }

    /// Text the key inserts, sent with the key-down event.
    pub fn text(&self) -> Option<&'static str> {
        match self {
            Self::Space => Some(" "),
            Self::ArrowRight => None,
        }
    }

    /// Windows virtual key code, still read by older deck frameworks.
    pub fn key_code(&self) -> i64 {
        match self {
            Self::Space => 32,
            Self::ArrowRight => 39,
        }
    }
}

/// Quality requested from a raster capture.
#[derive(Clone, Copy, Debug, Display, PartialEq, Eq, Hash)]
pub enum Fidelity {
    /// Lossless, full resolution (PNG). Used for deliverables.
    #[display("full")]
    Full,
    /// Small, lossy, fast. Only ever compared against other fingerprints.
    #[display("fingerprint")]
    Fingerprint,
}

/// A page loaded into a controllable rendering engine.
///
/// All methods take `&self`; implementations synchronise internally. The
/// traversal core guarantees it never issues two calls concurrently.
#[async_trait]
pub trait Page: Send + Sync {
    /// Dimensions of the rendered view.
    fn viewport(&self) -> Viewport;

    /// Navigate to `url` and wait for the load event.
    ///
    /// Callers also bound this call themselves, so an implementation that
    /// never returns is reported as a timeout.
    ///
    /// Returns [`Timeout`](error::ErrorKind::Timeout) if loading takes longer
    /// than `timeout`, [`Load`](error::ErrorKind::Load) for any other
    /// navigation failure.
    async fn load(&self, url: &str, timeout: Duration) -> Result<()>;

    /// Evaluate a script in page context and return its JSON result.
    ///
    /// Scripts returning `undefined` yield [`Value::Null`].
    async fn evaluate(&self, script: &Script) -> Result<Value>;

    /// Append a stylesheet to the document.
    async fn inject_style(&self, css: &str) -> Result<()>;

    /// Dispatch a key press (down + up) to the focused document.
    async fn press_key(&self, key: Key) -> Result<()>;

    /// Capture the current viewport as an image.
    async fn capture_raster(&self, fidelity: Fidelity) -> Result<Vec<u8>>;

    /// Capture the current viewport as a single-page PDF sized to `viewport`.
    async fn capture_document(&self, viewport: Viewport) -> Result<Vec<u8>>;

    /// Shut the engine down. No other method may be called afterwards.
    async fn close(&self) -> Result<()>;
}

/// Starts fresh, isolated rendering engine instances.
#[async_trait]
pub trait Launcher: Send + Sync {
    async fn launch(&self) -> Result<PageHandle>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(Viewport::new(1280, 720), (13.333, 7.5))]
    #[case(Viewport::new(960, 540), (10.0, 5.625))]
    #[case(Viewport::new(1920, 1080), (20.0, 11.25))]
    fn paper_size_matches_css_pixels(#[case] viewport: Viewport, #[case] expected: (f64, f64)) {
        let (width, height) = viewport.paper_inches();
        assert!((width - expected.0).abs() < 0.001, "width {width}");
        assert!((height - expected.1).abs() < 0.001, "height {height}");
    }

    #[rstest]
    #[case(Key::Space, " ", "Space", 32)]
    #[case(Key::ArrowRight, "ArrowRight", "ArrowRight", 39)]
    fn key_event_fields(#[case] key: Key, #[case] value: &str, #[case] code: &str, #[case] key_code: i64) {
        assert_eq!(key.key(), value);
        assert_eq!(key.code(), code);
        assert_eq!(key.key_code(), key_code);
        assert_eq!(key.text().is_some(), key == Key::Space);
    }

    #[test]
    fn viewport_display() {
        assert_eq!(Viewport::default().to_string(), "1280x720");
    }
}
