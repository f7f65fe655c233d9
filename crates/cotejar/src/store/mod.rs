//! Baseline persistence.
//!
//! One trait, two interchangeable backends: a local directory and a remote
//! blob container. The engine never branches on which one is active; backend
//! selection happens once in [`from_config`]. Absence of a baseline is a
//! normal outcome (`Ok(None)`), not an error; any real I/O failure surfaces
//! as [`CotejarError::StoreIo`] and is never retried here.

use std::fmt;
use std::sync::Arc;

use image::RgbaImage;

use crate::config::StorageConfig;
use crate::result::{CotejarError, CotejarResult};

mod local;
mod remote;

pub use local::LocalBaselineStore;
pub use remote::RemoteBaselineStore;

/// Keyed persistence for baseline images.
///
/// Keys are already sanitized by the engine; implementations only append
/// their own file or blob suffix.
pub trait BaselineStore: fmt::Debug {
    /// Retrieve the baseline stored under `key`, or `None` when absent.
    ///
    /// # Errors
    ///
    /// Returns [`CotejarError::StoreIo`] on any read failure other than
    /// plain absence.
    fn get(&self, key: &str) -> CotejarResult<Option<RgbaImage>>;

    /// Store `image` under `key`, overwriting any existing entry.
    ///
    /// # Errors
    ///
    /// Returns [`CotejarError::StoreIo`] on any write failure.
    fn put(&self, key: &str, image: &RgbaImage) -> CotejarResult<()>;
}

/// Build the store selected by the configuration.
///
/// # Errors
///
/// Returns [`CotejarError::StoreIo`] when the backend cannot be initialized.
pub fn from_config(storage: &StorageConfig) -> CotejarResult<Arc<dyn BaselineStore>> {
    match storage {
        StorageConfig::Local { path } => Ok(Arc::new(LocalBaselineStore::new(path)?)),
        StorageConfig::Remote { endpoint } => Ok(Arc::new(RemoteBaselineStore::new(endpoint)?)),
    }
}

pub(crate) fn store_io<E: fmt::Display>(context: &str, error: E) -> CotejarError {
    CotejarError::StoreIo {
        message: format!("{context}: {error}"),
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use super::*;

    /// In-memory store for exercising components without a filesystem.
    #[derive(Debug, Default)]
    pub struct MemoryBaselineStore {
        entries: Mutex<HashMap<String, RgbaImage>>,
        fail_writes: bool,
    }

    impl MemoryBaselineStore {
        pub fn new() -> Self {
            Self::default()
        }

        /// A store whose writes always fail, for error-path tests.
        pub fn failing() -> Self {
            Self {
                entries: Mutex::new(HashMap::new()),
                fail_writes: true,
            }
        }

        pub fn len(&self) -> usize {
            self.entries.lock().unwrap().len()
        }

        pub fn stored(&self, key: &str) -> Option<RgbaImage> {
            self.entries.lock().unwrap().get(key).cloned()
        }
    }

    impl BaselineStore for MemoryBaselineStore {
        fn get(&self, key: &str) -> CotejarResult<Option<RgbaImage>> {
            Ok(self.entries.lock().unwrap().get(key).cloned())
        }

        fn put(&self, key: &str, image: &RgbaImage) -> CotejarResult<()> {
            if self.fail_writes {
                return Err(store_io("memory store", "writes disabled"));
            }
            self.entries
                .lock()
                .unwrap()
                .insert(key.to_string(), image.clone());
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    #[test]
    fn from_config_builds_a_local_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = from_config(&StorageConfig::Local {
            path: PathBuf::from(dir.path()),
        })
        .unwrap();
        assert!(store.get("anything").unwrap().is_none());
    }
}
