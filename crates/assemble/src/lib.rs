//! Turning captured artifacts into one PDF document.
//!
//! Vector artifacts are already single-page documents and are merged as-is.
//! Raster artifacts are first wrapped into a page sized to the image.

pub mod error;
mod merge;
mod raster;

use crate::error::{ErrorKind, Result};
pub use crate::merge::merge;
pub use crate::raster::{POINTS_PER_PIXEL, wrap_raster};
use exn::ResultExt;
use lopdf::Document;
use slidecap_traverse::capture::{Artifact, CaptureMode};
use tracing::instrument;

/// Assemble `artifacts`, in order, into a single PDF.
#[instrument(skip_all, fields(artifacts = artifacts.len()))]
pub fn assemble(artifacts: &[Artifact]) -> Result<Vec<u8>> {
    if artifacts.is_empty() {
        exn::bail!(ErrorKind::Empty);
    }
    let documents = artifacts
        .iter()
        .map(|artifact| match artifact.mode {
            CaptureMode::Vector => {
                Document::load_mem(&artifact.bytes).or_raise(|| ErrorKind::InvalidDocument(artifact.step))
            },
            CaptureMode::Raster => wrap_raster(artifact.step, &artifact.bytes),
        })
        .collect::<Result<Vec<_>>>()?;
    merge(documents)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::merge::tests::{one_page, widths};
    use image::{ImageFormat, RgbImage};
    use std::io::Cursor;

    fn vector(step: u64, width: i64) -> Artifact {
        let mut bytes = Vec::new();
        one_page(width).save_to(&mut bytes).unwrap();
        Artifact { step, mode: CaptureMode::Vector, bytes }
    }

    fn raster(step: u64, width: u32, height: u32) -> Artifact {
        let mut bytes = Vec::new();
        RgbImage::new(width, height).write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png).unwrap();
        Artifact { step, mode: CaptureMode::Raster, bytes }
    }

    #[test]
    fn vector_artifacts_are_merged() {
        let pdf = assemble(&[vector(0, 960), vector(1, 480)]).unwrap();
        assert_eq!(widths(&pdf), vec![960.0, 480.0]);
    }

    #[test]
    fn raster_artifacts_become_pages() {
        let pdf = assemble(&[raster(0, 400, 300), raster(1, 800, 600)]).unwrap();
        assert_eq!(widths(&pdf), vec![300.0, 600.0]);
    }

    #[test]
    fn mixed_artifacts_keep_order() {
        let pdf = assemble(&[raster(0, 40, 30), vector(1, 500), raster(2, 80, 60)]).unwrap();
        assert_eq!(widths(&pdf), vec![30.0, 500.0, 60.0]);
    }

    #[test]
    fn nothing_to_assemble() {
        let err = assemble(&[]).unwrap_err();
        assert!(matches!(&*err, ErrorKind::Empty));
    }

    #[test]
    fn broken_vector_artifact_names_its_step() {
        let broken = Artifact { step: 4, mode: CaptureMode::Vector, bytes: b"%PDF-garbage".to_vec() };
        let err = assemble(&[vector(3, 100), broken]).unwrap_err();
        assert!(matches!(&*err, ErrorKind::InvalidDocument(4)));
    }
}
