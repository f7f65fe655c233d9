//! Visual session engine.
//!
//! Owns the per-test session, the run-level history, and the
//! capture-compare-decide loop for every check. Client-rendered pages settle
//! asynchronously, so a first divergent capture is retried inside a bounded
//! settle loop before the mismatch is declared real.

use std::sync::Arc;
use std::time::Duration;

use image::RgbaImage;
use tracing::{debug, info, warn};

use crate::capture::CaptureSource;
use crate::clock::{Clock, SystemClock};
use crate::config::VisualConfig;
use crate::diff::{decode_png, DiffProcessor};
use crate::factory::ResultFactory;
use crate::result::{CotejarError, CotejarResult};
use crate::session::{ComparisonResult, TestResult, TestResultSummary};
use crate::store::{self, BaselineStore};
use crate::tag;

/// Wall-clock ceiling of the settle-retry loop (5 seconds)
pub const SETTLE_BUDGET_MS: u64 = 5_000;

/// Pause between settle-loop captures
pub const SETTLE_POLL_INTERVAL_MS: u64 = 250;

/// Per-check options for [`VisualEngine::check_window`]
#[derive(Debug, Clone, Default)]
pub struct CheckOptions {
    /// Ignore-region selectors applied to this check only
    pub ignore_selectors: Vec<String>,
    /// Error when an ignore-region selector matches no elements
    pub require_ignore_matches: bool,
    /// Allow baseline and capture to differ in raw pixel dimensions
    pub ignore_size_mismatch: bool,
}

impl CheckOptions {
    /// Create options with defaults
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an ignore-region selector for this check
    #[must_use]
    pub fn with_ignore_selector(mut self, selector: impl Into<String>) -> Self {
        self.ignore_selectors.push(selector.into());
        self
    }

    /// Treat an unmatched ignore-region selector as an error
    #[must_use]
    pub const fn with_require_ignore_matches(mut self, require: bool) -> Self {
        self.require_ignore_matches = require;
        self
    }

    /// Opt out of the raw-dimension equality check
    #[must_use]
    pub const fn with_ignore_size_mismatch(mut self, ignore: bool) -> Self {
        self.ignore_size_mismatch = ignore;
        self
    }
}

/// Per-test-run visual comparison engine.
///
/// One instance owns the currently open session and the history of finalized
/// sessions; construct it once per test-run process and pass it wherever a
/// check is performed. Checks run strictly sequentially.
#[derive(Debug)]
pub struct VisualEngine {
    capture: Box<dyn CaptureSource>,
    store: Arc<dyn BaselineStore>,
    processor: Arc<DiffProcessor>,
    factory: ResultFactory,
    clock: Box<dyn Clock>,
    config: VisualConfig,
    global_ignore: Vec<String>,
    current_session: Option<Vec<ComparisonResult>>,
    history: Vec<TestResult>,
}

impl VisualEngine {
    /// Build an engine with the store selected by the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`CotejarError::Configuration`] when the capture source
    /// cannot take screenshots and [`CotejarError::StoreIo`] when the store
    /// backend fails to initialize.
    pub fn new(capture: Box<dyn CaptureSource>, config: VisualConfig) -> CotejarResult<Self> {
        let store = store::from_config(&config.storage)?;
        Self::with_store(capture, store, config)
    }

    /// Build an engine over an explicit store instance.
    ///
    /// # Errors
    ///
    /// Returns [`CotejarError::Configuration`] when the capture source
    /// cannot take screenshots.
    pub fn with_store(
        capture: Box<dyn CaptureSource>,
        store: Arc<dyn BaselineStore>,
        config: VisualConfig,
    ) -> CotejarResult<Self> {
        if !capture.can_capture() {
            return Err(CotejarError::Configuration {
                message: "capture source does not support screenshots".to_string(),
            });
        }

        let processor = Arc::new(DiffProcessor::new(&config.output_dir));
        let factory = ResultFactory::new(Arc::clone(&processor), Arc::clone(&store));
        let global_ignore = config.global_ignore_selectors.clone();

        Ok(Self {
            capture,
            store,
            processor,
            factory,
            clock: Box::new(SystemClock::new()),
            config,
            global_ignore,
            current_session: None,
            history: Vec::new(),
        })
    }

    /// Replace the clock, e.g. with a fake one in tests.
    #[must_use]
    pub fn with_clock(mut self, clock: Box<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Add selectors whose elements are masked in every subsequent check.
    pub fn add_global_ignore_regions<I, S>(&mut self, selectors: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.global_ignore.extend(selectors.into_iter().map(Into::into));
    }

    /// Run one visual check for `tag` against the stored baseline.
    ///
    /// Opens a session implicitly when none is open. On the first run for a
    /// tag the capture becomes the baseline; otherwise the capture is
    /// compared inside the settle loop and the verdict appended to the
    /// current session.
    ///
    /// # Errors
    ///
    /// Configuration, store, capture, selector and dimension errors abort
    /// this check only; the session and its earlier results stay usable.
    pub fn check_window(&mut self, raw_tag: &str, options: &CheckOptions) -> CotejarResult<ComparisonResult> {
        self.open_session();

        let key = tag::sanitize_tag(raw_tag)?;

        let mut ignore = self.global_ignore.clone();
        ignore.extend(options.ignore_selectors.iter().cloned());

        debug!(tag = %key, ignore_regions = ignore.len(), "running visual check");

        let result = match self.store.get(&key)? {
            Some(baseline) => self.compare_against_baseline(&key, &baseline, &ignore, options)?,
            None => {
                info!(tag = %key, "no baseline found, capture becomes the new baseline");
                self.clock.sleep(self.config.settle_delay());
                let capture = self.capture_masked(&ignore, options.require_ignore_matches)?;
                self.factory.no_baseline(&capture, &key)?
            }
        };

        if let Some(session) = self.current_session.as_mut() {
            session.push(result.clone());
        }
        Ok(result)
    }

    /// Finalize the open session into a [`TestResult`] and append it to the
    /// run history. The engine is then ready for a new session.
    ///
    /// # Errors
    ///
    /// Returns [`CotejarError::SessionState`] when no session is open or the
    /// open session has no results.
    pub fn end_test(&mut self) -> CotejarResult<TestResult> {
        let result = self.current_result()?;
        self.history.push(result.clone());
        self.current_session = None;
        debug!(sessions = self.history.len(), "session finalized");
        Ok(result)
    }

    /// Snapshot the currently open session without closing it.
    ///
    /// # Errors
    ///
    /// Returns [`CotejarError::SessionState`] when no session is open or the
    /// session has no results yet.
    pub fn current_result(&self) -> CotejarResult<TestResult> {
        let session = self
            .current_session
            .as_ref()
            .ok_or_else(|| CotejarError::SessionState {
                message: "no active session found".to_string(),
            })?;

        if session.is_empty() {
            return Err(CotejarError::SessionState {
                message: "no results exist for the current session".to_string(),
            });
        }

        Ok(TestResult::new(session.clone()))
    }

    /// Summarize every finalized session of this engine's lifetime.
    ///
    /// # Errors
    ///
    /// Returns [`CotejarError::SessionState`] when no session has ever been
    /// finalized, and [`CotejarError::RegressionDetected`] when
    /// `enforce_no_mismatch` is set and any check anywhere mismatched.
    pub fn all_results(&self, enforce_no_mismatch: bool) -> CotejarResult<TestResultSummary> {
        if self.history.is_empty() {
            return Err(CotejarError::SessionState {
                message: "no test results found, run checks and end the test first".to_string(),
            });
        }

        let summary = TestResultSummary::new(self.history.clone());

        if enforce_no_mismatch && !summary.all_matched() {
            return Err(CotejarError::RegressionDetected {
                mismatched: summary.mismatched_checks(),
                total: summary.total_checks(),
            });
        }

        Ok(summary)
    }

    fn open_session(&mut self) {
        if self.current_session.is_none() {
            debug!("opening new visual session");
            self.current_session = Some(Vec::new());
        }
    }

    /// Capture, compare and retry until the page settles or the budget runs
    /// out, then route the final attempt through the factory.
    ///
    /// Each iteration recomputes the full diff and only the last attempt's
    /// outcome survives; intermediate divergent captures are treated as
    /// in-flight rendering, not evidence.
    fn compare_against_baseline(
        &mut self,
        key: &str,
        baseline: &RgbaImage,
        ignore: &[String],
        options: &CheckOptions,
    ) -> CotejarResult<ComparisonResult> {
        let ignore_size_mismatch = options.ignore_size_mismatch || self.config.update_baseline;

        self.clock.sleep(self.config.settle_delay());

        let started = self.clock.now_ms();
        let (grid, capture) = loop {
            let capture = self.capture_masked(ignore, options.require_ignore_matches)?;
            let grid = self
                .processor
                .difference_grid(baseline, &capture, ignore_size_mismatch)?;

            if grid.matched_exactly()
                || self.clock.now_ms().saturating_sub(started) >= SETTLE_BUDGET_MS
            {
                break (grid, capture);
            }

            debug!(tag = %key, "capture differs from baseline, waiting for the page to settle");
            self.clock.sleep(Duration::from_millis(SETTLE_POLL_INTERVAL_MS));
        };

        if grid.matched_exactly() {
            self.factory.matched(baseline, key)
        } else if self.config.update_baseline {
            warn!(
                tag = %key,
                difference = grid.difference_percentage(),
                "capture diverged, replacing baseline"
            );
            self.factory.baseline_updated(&grid, baseline, &capture, key)
        } else {
            warn!(
                tag = %key,
                difference = grid.difference_percentage(),
                "visual mismatch"
            );
            self.factory.mismatch(&grid, baseline, &capture, key)
        }
    }

    /// Take one screenshot and draw every resolved ignore region onto it.
    fn capture_masked(&mut self, selectors: &[String], strict: bool) -> CotejarResult<RgbaImage> {
        let screenshot = self.capture.capture()?;
        let mut image = decode_png(&screenshot.data)?;

        for selector in selectors {
            let regions = self.capture.resolve_regions(selector)?;
            if regions.is_empty() && strict {
                return Err(CotejarError::ElementNotFound {
                    selector: selector.clone(),
                });
            }
            for region in regions {
                self.processor
                    .draw_ignore_region(&mut image, region.x, region.y, region.width, region.height);
            }
        }

        Ok(image)
    }
}
