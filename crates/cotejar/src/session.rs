//! Session and run-level result entities.

use std::path::PathBuf;

use image::RgbaImage;

/// An image persisted for the test report, with its on-disk path.
#[derive(Debug, Clone)]
pub struct ImageArtifact {
    /// The in-memory image
    pub image: RgbaImage,
    /// Where the PNG copy was written
    pub path: PathBuf,
}

/// Verdict of one tagged check. Immutable once appended to a session.
#[derive(Debug, Clone)]
pub struct ComparisonResult {
    /// Whether the capture matched the baseline (or became one)
    pub matched: bool,
    /// Fraction of grid cells that differed, in `[0.0, 1.0]`
    pub difference_percentage: f32,
    /// Baseline copy written for the report, when one exists
    pub baseline: Option<ImageArtifact>,
    /// Difference overlay written for the report, on mismatch
    pub difference: Option<ImageArtifact>,
}

/// Closed snapshot of one test session's checks, in order.
#[derive(Debug, Clone)]
pub struct TestResult {
    results: Vec<ComparisonResult>,
}

impl TestResult {
    pub(crate) fn new(results: Vec<ComparisonResult>) -> Self {
        Self { results }
    }

    /// True iff every contained check matched
    #[must_use]
    pub fn all_matched(&self) -> bool {
        self.results.iter().all(|r| r.matched)
    }

    /// The checks of this session, in append order
    #[must_use]
    pub fn comparison_results(&self) -> &[ComparisonResult] {
        &self.results
    }
}

/// Every finalized session produced over the engine's lifetime.
#[derive(Debug, Clone)]
pub struct TestResultSummary {
    test_results: Vec<TestResult>,
}

impl TestResultSummary {
    pub(crate) fn new(test_results: Vec<TestResult>) -> Self {
        Self { test_results }
    }

    /// True iff every check of every session matched
    #[must_use]
    pub fn all_matched(&self) -> bool {
        self.test_results.iter().all(TestResult::all_matched)
    }

    /// All finalized sessions, in finalization order
    #[must_use]
    pub fn test_results(&self) -> &[TestResult] {
        &self.test_results
    }

    /// Total number of checks across all sessions
    #[must_use]
    pub fn total_checks(&self) -> usize {
        self.test_results
            .iter()
            .map(|t| t.comparison_results().len())
            .sum()
    }

    /// Number of mismatched checks across all sessions
    #[must_use]
    pub fn mismatched_checks(&self) -> usize {
        self.test_results
            .iter()
            .flat_map(TestResult::comparison_results)
            .filter(|r| !r.matched)
            .count()
    }
}
