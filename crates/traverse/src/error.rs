//! Traversal Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.
//!
//! Only session-level failures are represented here. Step-level failures
//! (a capture that times out, a navigation method that throws) never abort a
//! traversal; they are recorded as diagnostics instead.

use derive_more::{Display, Error};

/// A traversal error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for traversal operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// The target location could not be parsed as an absolute URL.
    #[display("invalid presentation address: {_0}")]
    InvalidTarget(#[error(not(source))] String),
    /// The rendering engine could not be started.
    #[display("rendering engine failed to launch")]
    Launch,
    /// The presentation could not be loaded.
    #[display("presentation failed to load")]
    Load,
    /// The presentation did not finish loading in time.
    #[display("presentation load timed out")]
    LoadTimeout,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Launch | Self::LoadTimeout)
    }
}
