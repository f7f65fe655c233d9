//! Construction of the four terminal outcomes of one check.
//!
//! Each outcome builds one [`ComparisonResult`] and, where the lifecycle
//! calls for it, performs the matching baseline-store mutation. Report
//! images are persisted before the result is returned so the caller always
//! receives valid paths.

use std::sync::Arc;

use image::RgbaImage;
use tracing::info;

use crate::diff::{DiffProcessor, DifferenceGrid};
use crate::result::CotejarResult;
use crate::session::{ComparisonResult, ImageArtifact};
use crate::store::BaselineStore;

/// Builds comparison results and applies their store mutations.
#[derive(Debug)]
pub struct ResultFactory {
    processor: Arc<DiffProcessor>,
    store: Arc<dyn BaselineStore>,
}

impl ResultFactory {
    /// Create a factory over the shared processor and store.
    #[must_use]
    pub fn new(processor: Arc<DiffProcessor>, store: Arc<dyn BaselineStore>) -> Self {
        Self { processor, store }
    }

    /// First run for this tag: the capture becomes the stored baseline.
    ///
    /// # Errors
    ///
    /// Propagates store write and persistence failures.
    pub fn no_baseline(&self, capture: &RgbaImage, key: &str) -> CotejarResult<ComparisonResult> {
        self.store.put(key, capture)?;
        info!(key, "stored first baseline");
        let path = self.processor.persist(capture, key, true)?;

        Ok(ComparisonResult {
            matched: true,
            difference_percentage: 0.0,
            baseline: Some(ImageArtifact {
                image: capture.clone(),
                path,
            }),
            difference: None,
        })
    }

    /// Capture settled to an exact match with the baseline.
    ///
    /// # Errors
    ///
    /// Propagates persistence failures.
    pub fn matched(&self, baseline: &RgbaImage, key: &str) -> CotejarResult<ComparisonResult> {
        let path = self.processor.persist(baseline, key, true)?;

        Ok(ComparisonResult {
            matched: true,
            difference_percentage: 0.0,
            baseline: Some(ImageArtifact {
                image: baseline.clone(),
                path,
            }),
            difference: None,
        })
    }

    /// Capture diverged from the baseline and update mode is off.
    ///
    /// # Errors
    ///
    /// Propagates persistence failures.
    pub fn mismatch(
        &self,
        grid: &DifferenceGrid,
        baseline: &RgbaImage,
        capture: &RgbaImage,
        key: &str,
    ) -> CotejarResult<ComparisonResult> {
        let (baseline_artifact, difference_artifact) =
            self.report_artifacts(grid, baseline, capture, key)?;

        Ok(ComparisonResult {
            matched: false,
            difference_percentage: grid.difference_percentage(),
            baseline: Some(baseline_artifact),
            difference: Some(difference_artifact),
        })
    }

    /// Capture diverged and update mode is on: the capture replaces the
    /// stored baseline and the check passes as a correction.
    ///
    /// # Errors
    ///
    /// Propagates store write and persistence failures.
    pub fn baseline_updated(
        &self,
        grid: &DifferenceGrid,
        baseline: &RgbaImage,
        capture: &RgbaImage,
        key: &str,
    ) -> CotejarResult<ComparisonResult> {
        let (baseline_artifact, difference_artifact) =
            self.report_artifacts(grid, baseline, capture, key)?;
        self.store.put(key, capture)?;
        info!(key, "baseline replaced with current capture");

        Ok(ComparisonResult {
            matched: true,
            difference_percentage: grid.difference_percentage(),
            baseline: Some(baseline_artifact),
            difference: Some(difference_artifact),
        })
    }

    /// Persist the report images shared by both divergence outcomes: the old
    /// baseline and the capture with the difference overlay drawn on top.
    fn report_artifacts(
        &self,
        grid: &DifferenceGrid,
        baseline: &RgbaImage,
        capture: &RgbaImage,
        key: &str,
    ) -> CotejarResult<(ImageArtifact, ImageArtifact)> {
        let overlay = self.processor.render_difference_overlay(capture, grid);

        let baseline_path = self.processor.persist(baseline, key, true)?;
        let overlay_path = self.processor.persist(&overlay, key, false)?;

        Ok((
            ImageArtifact {
                image: baseline.clone(),
                path: baseline_path,
            },
            ImageArtifact {
                image: overlay,
                path: overlay_path,
            },
        ))
    }
}

#[cfg(test)]
mod tests {
    use image::Rgba;

    use super::*;
    use crate::store::testing::MemoryBaselineStore;

    fn solid(color: Rgba<u8>) -> RgbaImage {
        let mut image = RgbaImage::new(32, 32);
        for pixel in image.pixels_mut() {
            *pixel = color;
        }
        image
    }

    fn factory_with(store: MemoryBaselineStore) -> (ResultFactory, Arc<MemoryBaselineStore>, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(store);
        let processor = Arc::new(DiffProcessor::new(dir.path()));
        let factory = ResultFactory::new(processor.clone(), store.clone());
        (factory, store, dir)
    }

    fn grid_for(factory_dir: &tempfile::TempDir, a: &RgbaImage, b: &RgbaImage) -> DifferenceGrid {
        DiffProcessor::new(factory_dir.path())
            .difference_grid(a, b, false)
            .unwrap()
    }

    #[test]
    fn no_baseline_stores_capture_and_passes() {
        let (factory, store, _dir) = factory_with(MemoryBaselineStore::new());
        let capture = solid(Rgba([1, 2, 3, 255]));

        let result = factory.no_baseline(&capture, "first_run").unwrap();

        assert!(result.matched);
        assert_eq!(result.difference_percentage, 0.0);
        assert_eq!(store.stored("first_run").unwrap(), capture);
        assert!(result.baseline.as_ref().unwrap().path.exists());
        assert!(result.difference.is_none());
    }

    #[test]
    fn matched_leaves_store_untouched() {
        let (factory, store, _dir) = factory_with(MemoryBaselineStore::new());
        let baseline = solid(Rgba([9, 9, 9, 255]));

        let result = factory.matched(&baseline, "steady").unwrap();

        assert!(result.matched);
        assert_eq!(store.len(), 0);
        assert!(result.difference.is_none());
    }

    #[test]
    fn mismatch_persists_overlay_and_fails() {
        let (factory, store, dir) = factory_with(MemoryBaselineStore::new());
        let baseline = solid(Rgba([255, 255, 255, 255]));
        let capture = solid(Rgba([0, 0, 0, 255]));
        let grid = grid_for(&dir, &baseline, &capture);

        let result = factory.mismatch(&grid, &baseline, &capture, "drifted").unwrap();

        assert!(!result.matched);
        assert!(result.difference_percentage > 0.0);
        assert_eq!(store.len(), 0);
        assert!(result.baseline.as_ref().unwrap().path.exists());
        assert!(result.difference.as_ref().unwrap().path.exists());
    }

    #[test]
    fn baseline_updated_overwrites_store_and_passes() {
        let (factory, store, dir) = factory_with(MemoryBaselineStore::new());
        let baseline = solid(Rgba([255, 255, 255, 255]));
        let capture = solid(Rgba([0, 0, 0, 255]));
        let grid = grid_for(&dir, &baseline, &capture);

        let result = factory
            .baseline_updated(&grid, &baseline, &capture, "corrected")
            .unwrap();

        assert!(result.matched);
        assert!(result.difference_percentage > 0.0);
        assert_eq!(store.stored("corrected").unwrap(), capture);
        assert!(result.difference.is_some());
    }

    #[test]
    fn store_failure_propagates_from_no_baseline() {
        let (factory, _store, _dir) = factory_with(MemoryBaselineStore::failing());
        let err = factory.no_baseline(&solid(Rgba([0, 0, 0, 255])), "k").unwrap_err();
        assert!(matches!(err, crate::CotejarError::StoreIo { .. }));
    }
}
