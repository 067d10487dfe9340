//! Capture sink.
//!
//! Produces one [`Artifact`] per step: either a lossless raster image of the
//! viewport, or a single-page vector document with the viewport's exact
//! dimensions (selectable text, vector graphics). Separately, low-fidelity
//! [`Fingerprint`]s are taken for visual-identity comparison; those are never
//! part of the deliverable.

mod style;

pub use self::style::{SUPPRESS_CHROME, StyleConfig, StyleError};
use crate::page::error::{ErrorKind as PageErrorKind, Result as PageResult};
use crate::page::{Fidelity, Page};
use derive_more::Display;
use exn::ResultExt;
use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::str::FromStr;
use std::time::Duration;
use tokio::time::timeout;

/// Output format of each captured step.
#[derive(Clone, Copy, Debug, Display, Default, PartialEq, Eq, Hash)]
pub enum CaptureMode {
    /// One PNG per step, later wrapped one-image-per-page.
    #[display("raster")]
    Raster,
    /// One single-page PDF per step, later merged.
    #[default]
    #[display("vector")]
    Vector,
}
impl FromStr for CaptureMode {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "raster" | "png" | "screenshot" => Ok(Self::Raster),
            "vector" | "pdf" => Ok(Self::Vector),
            other => Err(format!("unknown capture mode: {other}")),
        }
    }
}

/// The captured representation of one step.
#[derive(Clone, PartialEq, Eq)]
pub struct Artifact {
    /// Absolute step index that produced this artifact.
    pub step: u64,
    pub mode: CaptureMode,
    /// PNG bytes ([`CaptureMode::Raster`]) or PDF bytes ([`CaptureMode::Vector`]).
    pub bytes: Vec<u8>,
}
impl Debug for Artifact {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("Artifact")
            .field("step", &self.step)
            .field("mode", &self.mode)
            .field("bytes", &self.bytes.len())
            .finish()
    }
}

/// Hash of a low-fidelity raster capture.
#[derive(Clone, Copy, Debug, Display, PartialEq, Eq, Hash)]
#[display("{_0}")]
pub struct Fingerprint(blake3::Hash);
impl Fingerprint {
    pub fn of(bytes: impl AsRef<[u8]>) -> Self {
        Self(blake3::hash(bytes.as_ref()))
    }
}

/// Capture the current state of `page` for `step`, bounded by `limit`.
pub async fn capture(page: &dyn Page, mode: CaptureMode, step: u64, limit: Duration) -> PageResult<Artifact> {
    let bytes = match mode {
        CaptureMode::Raster => timeout(limit, page.capture_raster(Fidelity::Full)).await,
        CaptureMode::Vector => timeout(limit, page.capture_document(page.viewport())).await,
    }
    .or_raise(|| PageErrorKind::Timeout)??;
    if bytes.is_empty() {
        exn::bail!(PageErrorKind::Capture);
    }
    Ok(Artifact { step, mode, bytes })
}

/// Take a visual fingerprint of `page`, bounded by `limit`.
pub async fn fingerprint(page: &dyn Page, limit: Duration) -> PageResult<Fingerprint> {
    let bytes = timeout(limit, page.capture_raster(Fidelity::Fingerprint)).await.or_raise(|| PageErrorKind::Timeout)??;
    Ok(Fingerprint::of(bytes))
}
