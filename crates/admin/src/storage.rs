//! Object storage for product images.
//!
//! Speaks the storage REST dialect used by Supabase and similar S3 fronts:
//! `PUT {url}/object/{bucket}/{key}` with the service key as a bearer token.
//! Objects are then served from `{public_url}/{key}`.

use std::sync::Arc;
use std::time::Duration;

use secrecy::ExposeSecret;
use thiserror::Error;
use tracing::instrument;

use crate::config::StorageConfig;

/// Errors from the storage backend.
#[derive(Debug, Error)]
pub enum StorageError {
    /// No storage variables were configured.
    #[error("object storage is not configured")]
    NotConfigured,

    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Backend returned a non-success status.
    #[error("storage API error ({status}): {message}")]
    Api { status: u16, message: String },
}

/// Object storage client.
#[derive(Clone)]
pub struct ObjectStorage {
    inner: Arc<ObjectStorageInner>,
}

struct ObjectStorageInner {
    client: reqwest::Client,
    config: StorageConfig,
}

impl std::fmt::Debug for ObjectStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectStorage")
            .field("config", &self.inner.config)
            .finish_non_exhaustive()
    }
}

impl ObjectStorage {
    /// # Errors
    ///
    /// Returns `StorageError::Http` if the HTTP client cannot be built.
    pub fn new(config: StorageConfig) -> Result<Self, StorageError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            inner: Arc::new(ObjectStorageInner { client, config }),
        })
    }

    /// Public URL an object will be served from.
    #[must_use]
    pub fn public_url(&self, key: &str) -> String {
        format!("{}/{key}", self.inner.config.public_url)
    }

    /// Upload `bytes` under `key` and return its public URL.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the request fails or is rejected.
    #[instrument(skip(self, bytes), fields(size = bytes.len()))]
    pub async fn put(
        &self,
        key: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<String, StorageError> {
        let config = &self.inner.config;
        let url = format!("{}/object/{}/{key}", config.url, config.bucket);

        let response = self
            .inner
            .client
            .put(&url)
            .bearer_auth(config.service_key.expose_secret())
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .header("cache-control", "public, max-age=31536000, immutable")
            .body(bytes)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(StorageError::Api {
                status: status.as_u16(),
                message,
            });
        }

        tracing::info!(key, "object stored");
        Ok(self.public_url(key))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    use secrecy::SecretString;
    use wiremock::matchers::{body_bytes, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn storage(server: &MockServer) -> ObjectStorage {
        ObjectStorage::new(StorageConfig {
            url: format!("{}/storage/v1", server.uri()),
            bucket: "product-images".to_string(),
            service_key: SecretString::from("svc-test-key"),
            public_url: "https://cdn.dewy.test/product-images".to_string(),
        })
        .unwrap()
    }

    #[tokio::test]
    async fn put_sends_bytes_and_returns_public_url() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/storage/v1/object/product-images/products/abc.png"))
            .and(header("authorization", "Bearer svc-test-key"))
            .and(header("content-type", "image/png"))
            .and(body_bytes(vec![0x89, b'P', b'N', b'G']))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let url = storage(&server)
            .put("products/abc.png", vec![0x89, b'P', b'N', b'G'], "image/png")
            .await
            .unwrap();
        assert_eq!(url, "https://cdn.dewy.test/product-images/products/abc.png");
    }

    #[tokio::test]
    async fn rejected_upload_is_an_api_error() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(403).set_body_string("invalid signature"))
            .mount(&server)
            .await;

        let err = storage(&server)
            .put("products/abc.webp", vec![1, 2, 3], "image/webp")
            .await
            .unwrap_err();
        assert!(
            matches!(err, StorageError::Api { status: 403, ref message } if message == "invalid signature")
        );
    }
}
