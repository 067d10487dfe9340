//! Assembly Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};

/// An assembly error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for assembly operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// Nothing was captured, so there is no document to produce.
    #[display("no artifacts to assemble")]
    Empty,
    /// A vector artifact could not be parsed.
    #[display("artifact for step {_0} is not a valid PDF document")]
    InvalidDocument(#[error(not(source))] u64),
    /// A raster artifact could not be decoded.
    #[display("artifact for step {_0} is not a valid image")]
    InvalidImage(#[error(not(source))] u64),
    /// Writing the assembled document failed.
    #[display("failed to encode assembled document")]
    Encode,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        false
    }
}
