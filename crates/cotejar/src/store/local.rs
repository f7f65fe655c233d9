//! Local filesystem baseline store.

use std::fs;
use std::path::PathBuf;

use image::RgbaImage;
use tracing::debug;

use crate::diff::{decode_png, encode_png};
use crate::result::CotejarResult;
use crate::store::{store_io, BaselineStore};

/// One directory, one PNG file per key.
#[derive(Debug)]
pub struct LocalBaselineStore {
    dir: PathBuf,
}

impl LocalBaselineStore {
    /// Open the store, creating the directory if needed.
    ///
    /// # Errors
    ///
    /// Returns [`crate::CotejarError::StoreIo`] when the directory cannot be
    /// created.
    pub fn new(dir: impl Into<PathBuf>) -> CotejarResult<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .map_err(|e| store_io(&format!("failed to create baseline directory {}", dir.display()), e))?;
        Ok(Self { dir })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.png"))
    }
}

impl BaselineStore for LocalBaselineStore {
    fn get(&self, key: &str) -> CotejarResult<Option<RgbaImage>> {
        let path = self.path_for(key);
        if !path.exists() {
            return Ok(None);
        }
        let bytes = fs::read(&path)
            .map_err(|e| store_io(&format!("failed to read baseline {}", path.display()), e))?;
        let image = decode_png(&bytes)
            .map_err(|e| store_io(&format!("stored baseline {} is not a valid image", path.display()), e))?;
        Ok(Some(image))
    }

    fn put(&self, key: &str, image: &RgbaImage) -> CotejarResult<()> {
        let path = self.path_for(key);
        debug!(key, path = %path.display(), "storing baseline");
        fs::write(&path, encode_png(image)?)
            .map_err(|e| store_io(&format!("failed to write baseline {}", path.display()), e))
    }
}

#[cfg(test)]
mod tests {
    use image::Rgba;

    use super::*;

    fn solid(color: Rgba<u8>) -> RgbaImage {
        let mut image = RgbaImage::new(8, 8);
        for pixel in image.pixels_mut() {
            *pixel = color;
        }
        image
    }

    #[test]
    fn get_on_missing_key_is_none_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalBaselineStore::new(dir.path()).unwrap();
        assert!(store.get("nothing_here").unwrap().is_none());
    }

    #[test]
    fn put_then_get_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalBaselineStore::new(dir.path()).unwrap();
        let image = solid(Rgba([12, 34, 56, 255]));

        store.put("home_page", &image).unwrap();
        assert_eq!(store.get("home_page").unwrap().unwrap(), image);
    }

    #[test]
    fn put_overwrites_unconditionally() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalBaselineStore::new(dir.path()).unwrap();

        store.put("k", &solid(Rgba([1, 1, 1, 255]))).unwrap();
        let replacement = solid(Rgba([2, 2, 2, 255]));
        store.put("k", &replacement).unwrap();

        assert_eq!(store.get("k").unwrap().unwrap(), replacement);
    }

    #[test]
    fn corrupt_file_surfaces_as_store_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalBaselineStore::new(dir.path()).unwrap();
        fs::write(dir.path().join("bad.png"), b"not a png").unwrap();

        let err = store.get("bad").unwrap_err();
        assert!(matches!(err, crate::CotejarError::StoreIo { .. }));
    }

    #[test]
    fn new_creates_missing_directories() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a").join("b");
        let store = LocalBaselineStore::new(&nested).unwrap();
        store.put("k", &solid(Rgba([0, 0, 0, 255]))).unwrap();
        assert!(nested.join("k.png").exists());
    }
}
