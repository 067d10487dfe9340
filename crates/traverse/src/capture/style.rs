//! Stylesheets injected before capturing.
//!
//! Presentation pages carry interface chrome (navigation arrows, progress
//! bars, slide numbers, the mouse cursor) that should not end up in the
//! document. The builtin `suppress.css` hides it by opacity and visibility
//! only; removing it from layout would shift the slides themselves.
//!
//! Styles are assembled through [`StyleConfig`]'s builder API, combining
//! compile-time embedded builtins with user-provided files or raw CSS. Files
//! are read eagerly so that missing files fail at construction rather than
//! halfway through a traversal.

use crate::page::Page;
use crate::page::error::{ErrorKind as PageErrorKind, Result as PageResult};
use derive_more::{Display, Error};
use exn::{OptionExt, ResultExt};
use rust_embed::Embed;
use std::borrow::Cow;
use std::path::Path;

/// Name of the builtin interface-chrome suppression stylesheet.
pub const SUPPRESS_CHROME: &str = "suppress.css";

#[derive(Embed)]
#[folder = "../../assets/styles/"]
struct Builtins;
impl Builtins {
    fn load(name: &str) -> Option<Cow<'static, [u8]>> {
        Self::get(name).map(|f| f.data)
    }

    fn list() -> Vec<Cow<'static, str>> {
        Self::iter().filter(|f| f.ends_with(".css")).collect()
    }

    fn identifier(name: impl AsRef<str>) -> String {
        format!("builtin:{}", name.as_ref().trim().trim_start_matches("builtin:"))
    }
}

/// Failure to assemble a [`StyleConfig`].
#[derive(Debug, Display, Error)]
pub enum StyleError {
    #[display("stylesheet not found: {_0}")]
    NotFound(#[error(not(source))] String),
    #[display("stylesheet unreadable: {_0}")]
    Unreadable(#[error(not(source))] String),
}

#[derive(Clone, Debug)]
enum Style {
    Builtin(String),
    // Read during construction; they'd have to be read before the first
    // capture anyway, so do it here and fail fast.
    UserContent(String),
}

/// An ordered collection of stylesheets to inject into a presentation.
///
/// Styles are applied in insertion order, so later styles override earlier
/// ones.
///
/// # Example
///
/// ```no_run
/// use slidecap_traverse::capture::StyleConfig;
///
/// # fn styles() -> Result<StyleConfig, exn::Exn<slidecap_traverse::capture::StyleError>> {
/// let styles = StyleConfig::new()
///     .with_builtin("suppress.css")?
///     .with_file("/path/to/hide-logo.css")?
///     .with_content(".watermark { opacity: 0 !important; }");
/// # Ok(styles)
/// # }
/// ```
#[derive(Clone, Debug, Default)]
pub struct StyleConfig {
    styles: Vec<Style>,
}
impl StyleConfig {
    /// Creates an empty style configuration with no stylesheets.
    pub fn new() -> Self {
        Self::default()
    }

    /// Only the builtin interface-chrome suppression stylesheet.
    pub fn suppressing_chrome() -> Self {
        Self { styles: vec![Style::Builtin(SUPPRESS_CHROME.to_string())] }
    }

    /// Returns the names of all embedded builtin stylesheets.
    pub fn list_builtins() -> Vec<Cow<'static, str>> {
        Builtins::list()
    }

    /// Appends a builtin stylesheet by name.
    pub fn with_builtin(mut self, name: impl AsRef<str>) -> Result<Self, exn::Exn<StyleError>> {
        let name = name.as_ref();
        if Builtins::load(name).is_none() {
            exn::bail!(StyleError::NotFound(Builtins::identifier(name)));
        }
        self.styles.push(Style::Builtin(name.to_string()));
        Ok(self)
    }

    /// Appends a stylesheet read from a file on disk.
    pub fn with_file(mut self, path: impl AsRef<Path>) -> Result<Self, exn::Exn<StyleError>> {
        let path = path.as_ref();
        if !path.exists() {
            exn::bail!(StyleError::NotFound(path.display().to_string()));
        }
        let content = std::fs::read_to_string(path).or_raise(|| StyleError::Unreadable(path.display().to_string()))?;
        self.styles.push(Style::UserContent(content));
        Ok(self)
    }

    /// Appends raw CSS content as a stylesheet.
    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.styles.push(Style::UserContent(content.into()));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.styles.is_empty()
    }

    /// Inject every stylesheet into `page`, in order. Returns the number of
    /// stylesheets injected.
    pub async fn apply(&self, page: &dyn Page) -> PageResult<usize> {
        for style in &self.styles {
            let css = match style {
                Style::Builtin(name) => {
                    let data = Builtins::load(name).ok_or_raise(|| PageErrorKind::Style)?;
                    String::from_utf8_lossy(&data).into_owned()
                },
                Style::UserContent(content) => content.clone(),
            };
            page.inject_style(&css).await?;
        }
        Ok(self.styles.len())
    }
}
