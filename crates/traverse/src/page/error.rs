//! Error types for the [`page`](super) collaborator interface.
//!
//! Uses [`exn`] for automatic location tracking and error tree construction.
//! Rendering engine implementations raise their own failures (protocol
//! errors, I/O errors, timeouts) into one of these kinds.

use derive_more::{Display, Error};

/// A rendering engine error with automatic location tracking via [`exn::Exn`].
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for rendering engine operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Classifies which engine operation failed.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// The engine process (or its page) could not be created.
    #[display("engine launch failed")]
    Launch,
    /// Navigating to the target failed.
    #[display("page load failed")]
    Load,
    /// An engine operation did not complete in time.
    #[display("engine operation timed out")]
    Timeout,
    /// A script threw, or its result could not be decoded.
    #[display("script evaluation failed")]
    Script,
    /// Injecting a stylesheet failed.
    #[display("style injection failed")]
    Style,
    /// Dispatching simulated input failed.
    #[display("input dispatch failed")]
    Input,
    /// A raster or document capture failed.
    #[display("capture failed")]
    Capture,
    /// The engine could not be shut down cleanly.
    #[display("engine shutdown failed")]
    Close,
    /// The engine rejected a malformed protocol request.
    #[display("protocol error: {_0}")]
    Protocol(#[error(not(source))] String),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout | Self::Capture)
    }
}
