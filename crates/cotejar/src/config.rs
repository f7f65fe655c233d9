//! Engine configuration.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default settle delay before the first capture of a check (5 seconds)
pub const DEFAULT_SETTLE_DELAY_MS: u64 = 5_000;

/// Where baseline images live between runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum StorageConfig {
    /// One directory on the local filesystem, one file per tag
    Local {
        /// Directory holding the baseline files
        path: PathBuf,
    },
    /// One blob container behind an HTTP endpoint, one blob per tag
    Remote {
        /// Base URL of the blob service
        endpoint: String,
    },
}

/// Configuration for the visual session engine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VisualConfig {
    /// Treat mismatches as corrections: overwrite the stored baseline and pass
    pub update_baseline: bool,
    /// Delay before the first capture of every check, in milliseconds
    pub settle_delay_ms: u64,
    /// Root directory for persisted report images
    pub output_dir: PathBuf,
    /// Baseline storage backend
    pub storage: StorageConfig,
    /// Ignore-region selectors applied to every check
    pub global_ignore_selectors: Vec<String>,
}

impl Default for VisualConfig {
    fn default() -> Self {
        Self {
            update_baseline: false,
            settle_delay_ms: DEFAULT_SETTLE_DELAY_MS,
            output_dir: PathBuf::from("comparison-results"),
            storage: StorageConfig::Local {
                path: PathBuf::from("baselines"),
            },
            global_ignore_selectors: Vec::new(),
        }
    }
}

impl VisualConfig {
    /// Create a config with defaults
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable or disable baseline updating
    #[must_use]
    pub const fn with_update_baseline(mut self, update: bool) -> Self {
        self.update_baseline = update;
        self
    }

    /// Set the settle delay in milliseconds
    #[must_use]
    pub const fn with_settle_delay_ms(mut self, ms: u64) -> Self {
        self.settle_delay_ms = ms;
        self
    }

    /// Set the report output directory
    #[must_use]
    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    /// Set the baseline storage backend
    #[must_use]
    pub fn with_storage(mut self, storage: StorageConfig) -> Self {
        self.storage = storage;
        self
    }

    /// Add a selector whose elements are masked in every check
    #[must_use]
    pub fn with_global_ignore_selector(mut self, selector: impl Into<String>) -> Self {
        self.global_ignore_selectors.push(selector.into());
        self
    }

    /// Get the settle delay as a Duration
    #[must_use]
    pub const fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = VisualConfig::default();
        assert!(!config.update_baseline);
        assert_eq!(config.settle_delay_ms, DEFAULT_SETTLE_DELAY_MS);
        assert_eq!(config.output_dir, PathBuf::from("comparison-results"));
        assert!(matches!(config.storage, StorageConfig::Local { .. }));
        assert!(config.global_ignore_selectors.is_empty());
    }

    #[test]
    fn builder_chain() {
        let config = VisualConfig::new()
            .with_update_baseline(true)
            .with_settle_delay_ms(100)
            .with_output_dir("out")
            .with_storage(StorageConfig::Remote {
                endpoint: "http://blobs.internal:9000".into(),
            })
            .with_global_ignore_selector(".navbar")
            .with_global_ignore_selector("#ticker");

        assert!(config.update_baseline);
        assert_eq!(config.settle_delay(), Duration::from_millis(100));
        assert_eq!(config.global_ignore_selectors.len(), 2);
        assert!(matches!(config.storage, StorageConfig::Remote { .. }));
    }

    #[test]
    fn serde_round_trip() {
        let config = VisualConfig::new()
            .with_settle_delay_ms(250)
            .with_global_ignore_selector(".ad-banner");
        let json = serde_json::to_string(&config).unwrap();
        let back: VisualConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.settle_delay_ms, 250);
        assert_eq!(back.global_ignore_selectors, vec![".ad-banner".to_string()]);
    }

    #[test]
    fn storage_config_tagged_encoding() {
        let json = serde_json::to_string(&StorageConfig::Local {
            path: PathBuf::from("b"),
        })
        .unwrap();
        assert!(json.contains("\"kind\":\"local\""));
    }
}
