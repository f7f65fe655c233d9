//! Cotejar: baseline-driven visual regression engine for browser
//! end-to-end tests.
//!
//! A check captures a screenshot of the page under test, compares it against
//! the stored baseline for the same tag, and records a pass/fail/update
//! verdict. Verdicts accumulate into per-test sessions and a run-level
//! summary.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                      VisualEngine (per run)                      │
//! │   capture ──► mask ignore regions ──► settle loop ──► verdict    │
//! ├────────────────┬──────────────────────┬──────────────────────────┤
//! │ CaptureSource  │   DiffProcessor      │   BaselineStore          │
//! │ (browser       │   (cell grid, luma,  │   (local directory or    │
//! │  adapter)      │    overlays, PNGs)   │    remote blob store)    │
//! └────────────────┴──────────────────────┴──────────────────────────┘
//! ```
//!
//! The capture source and baseline store are injected behind traits; the
//! engine never branches on which implementation is active.

#![warn(missing_docs)]

pub mod capture;
pub mod clock;
pub mod config;
pub mod diff;
pub mod engine;
pub mod factory;
mod logging;
mod result;
pub mod session;
pub mod store;
mod tag;

pub use capture::{CaptureSource, Region, Screenshot};
pub use clock::{Clock, FakeClock, SystemClock};
pub use config::{StorageConfig, VisualConfig, DEFAULT_SETTLE_DELAY_MS};
pub use diff::{DiffProcessor, DifferenceGrid, CELL_SIZE};
pub use engine::{CheckOptions, VisualEngine, SETTLE_BUDGET_MS, SETTLE_POLL_INTERVAL_MS};
pub use factory::ResultFactory;
pub use logging::init_logging;
pub use result::{CotejarError, CotejarResult};
pub use session::{ComparisonResult, ImageArtifact, TestResult, TestResultSummary};
pub use store::{from_config, BaselineStore, LocalBaselineStore, RemoteBaselineStore};
pub use tag::sanitize_tag;
