//! Result and error types for Cotejar.

use thiserror::Error;

/// Result type for Cotejar operations
pub type CotejarResult<T> = Result<T, CotejarError>;

/// Errors that can occur in Cotejar
#[derive(Debug, Error)]
pub enum CotejarError {
    /// Invalid engine setup: bad tag, non-capturing capture source, bad storage wiring
    #[error("Configuration error: {message}")]
    Configuration {
        /// Error message
        message: String,
    },

    /// Baseline and capture have different raw pixel dimensions
    #[error(
        "Image dimensions differ: baseline {baseline_width}x{baseline_height}, \
         capture {capture_width}x{capture_height}"
    )]
    DimensionMismatch {
        /// Baseline width in pixels
        baseline_width: u32,
        /// Baseline height in pixels
        baseline_height: u32,
        /// Capture width in pixels
        capture_width: u32,
        /// Capture height in pixels
        capture_height: u32,
    },

    /// Baseline store read/write failure
    #[error("Baseline store I/O failed: {message}")]
    StoreIo {
        /// Error message
        message: String,
    },

    /// Session operation called in the wrong state
    #[error("Invalid session state: {message}")]
    SessionState {
        /// Error message
        message: String,
    },

    /// Run-level signal: at least one check differed from its baseline
    #[error("Visual regression detected: {mismatched} of {total} checks differ from baseline")]
    RegressionDetected {
        /// Number of mismatched checks across all sessions
        mismatched: usize,
        /// Total number of checks across all sessions
        total: usize,
    },

    /// An ignore-region selector matched no elements under strict matching
    #[error("No element found for ignore-region selector: {selector}")]
    ElementNotFound {
        /// The selector that resolved to nothing
        selector: String,
    },

    /// Screenshot acquisition failed
    #[error("Capture failed: {message}")]
    Capture {
        /// Error message
        message: String,
    },

    /// Image decode/encode failure
    #[error("Image processing failed: {message}")]
    ImageProcessing {
        /// Error message
        message: String,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
