//! Remote blob baseline store.
//!
//! Talks to a blob service over HTTP: one container, one blob per key.
//! `PUT {endpoint}/{container}` creates the container, `GET`/`PUT`
//! `{endpoint}/{container}/{key}.png` move the blobs. Transient network
//! failures surface as store errors; retry policy belongs to the caller.

use std::time::Duration;

use image::RgbaImage;
use tracing::{debug, info};

use crate::diff::{decode_png, encode_png};
use crate::result::CotejarResult;
use crate::store::{store_io, BaselineStore};

/// Container holding all baseline blobs
const CONTAINER: &str = "baseline-images";

/// Request timeout for all store operations
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Blob container behind an HTTP endpoint, one blob per key.
#[derive(Debug)]
pub struct RemoteBaselineStore {
    endpoint: String,
    client: reqwest::blocking::Client,
}

impl RemoteBaselineStore {
    /// Connect to the blob service and create the container if absent.
    ///
    /// # Errors
    ///
    /// Returns [`crate::CotejarError::StoreIo`] when the service is
    /// unreachable or refuses the container.
    pub fn new(endpoint: impl Into<String>) -> CotejarResult<Self> {
        let endpoint = endpoint.into().trim_end_matches('/').to_string();
        let client = reqwest::blocking::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| store_io("failed to build HTTP client", e))?;

        let store = Self { endpoint, client };
        store.ensure_container()?;
        Ok(store)
    }

    fn container_url(&self) -> String {
        format!("{}/{}", self.endpoint, CONTAINER)
    }

    fn blob_url(&self, key: &str) -> String {
        format!("{}/{}/{}.png", self.endpoint, CONTAINER, key)
    }

    fn ensure_container(&self) -> CotejarResult<()> {
        let url = self.container_url();
        let response = self
            .client
            .put(&url)
            .send()
            .map_err(|e| store_io(&format!("failed to reach blob service at {url}"), e))?;

        // 409 means the container already exists, which is the common case.
        let status = response.status();
        if status.is_success() || status.as_u16() == 409 {
            info!(container = CONTAINER, "baseline container ready");
            Ok(())
        } else {
            Err(store_io(
                &format!("blob service rejected container {url}"),
                format!("HTTP {status}"),
            ))
        }
    }
}

impl BaselineStore for RemoteBaselineStore {
    fn get(&self, key: &str) -> CotejarResult<Option<RgbaImage>> {
        let url = self.blob_url(key);
        let response = self
            .client
            .get(&url)
            .send()
            .map_err(|e| store_io(&format!("failed to fetch baseline {url}"), e))?;

        let status = response.status();
        if status.as_u16() == 404 {
            debug!(key, "no remote baseline");
            return Ok(None);
        }
        if !status.is_success() {
            return Err(store_io(
                &format!("blob service refused read of {url}"),
                format!("HTTP {status}"),
            ));
        }

        let bytes = response
            .bytes()
            .map_err(|e| store_io(&format!("failed to download baseline {url}"), e))?;
        let image = decode_png(&bytes)
            .map_err(|e| store_io(&format!("remote baseline {url} is not a valid image"), e))?;
        Ok(Some(image))
    }

    fn put(&self, key: &str, image: &RgbaImage) -> CotejarResult<()> {
        let url = self.blob_url(key);
        debug!(key, url = %url, "uploading baseline");

        let response = self
            .client
            .put(&url)
            .header("content-type", "image/png")
            .body(encode_png(image)?)
            .send()
            .map_err(|e| store_io(&format!("failed to upload baseline {url}"), e))?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(store_io(
                &format!("blob service refused write of {url}"),
                format!("HTTP {status}"),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unreachable_service_fails_construction_with_store_error() {
        // Nothing listens on a reserved discard port.
        let err = RemoteBaselineStore::new("http://127.0.0.1:9").unwrap_err();
        assert!(matches!(err, crate::CotejarError::StoreIo { .. }));
    }

    #[test]
    fn endpoint_trailing_slash_is_normalized() {
        // Construction fails on the network step, but URL shaping is still
        // observable through the error context.
        let err = RemoteBaselineStore::new("http://127.0.0.1:9/").unwrap_err();
        let message = err.to_string();
        assert!(message.contains("http://127.0.0.1:9/baseline-images"));
        assert!(!message.contains("9//baseline-images"));
    }
}
