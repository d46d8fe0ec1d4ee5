use std::future::Future;
use std::time::Duration;

use bytes::Bytes;
use reqwest::StatusCode;
use reqwest::header::CONTENT_TYPE;
use tracing::{debug, warn};

use crewplate_types::models::ImageRef;

use super::{BlobStore, validate_key};
use crate::error::{CoreError, Result};

const UPLOAD_TIMEOUT: Duration = Duration::from_secs(30);

/// Uploads to a crewplate server over `PUT {server}/uploads/{key}`.
pub struct HttpBlobStore {
    client: reqwest::Client,
    server: String,
    token: String,
}

impl HttpBlobStore {
    pub fn new(server: impl Into<String>, token: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(UPLOAD_TIMEOUT)
            .build()
            .map_err(|e| CoreError::Storage(e.into()))?;
        Ok(Self::with_client(client, server, token))
    }

    pub fn with_client(
        client: reqwest::Client,
        server: impl Into<String>,
        token: impl Into<String>,
    ) -> Self {
        Self {
            client,
            server: server.into().trim_end_matches('/').to_string(),
            token: token.into(),
        }
    }

    async fn upload(&self, key: &str, body: Bytes, content_type: &str) -> Result<()> {
        validate_key(key)?;
        let url = format!("{}/uploads/{}", self.server, key);
        let size = body.len();

        let resp = self
            .client
            .put(&url)
            .bearer_auth(&self.token)
            .header(CONTENT_TYPE, content_type)
            .body(body)
            .send()
            .await
            .map_err(|e| {
                warn!("Upload of {} failed to send: {}", key, e);
                CoreError::Transient(e.to_string())
            })?;

        let status = resp.status();
        if status.is_success() {
            debug!("Uploaded {} ({} bytes)", key, size);
            return Ok(());
        }

        let body = resp.text().await.unwrap_or_default();
        Err(classify_status(status, &body))
    }
}

/// Server errors and throttling are worth another attempt; any other
/// rejection will not change on retry.
fn classify_status(status: StatusCode, body: &str) -> CoreError {
    let msg = if body.is_empty() {
        status.to_string()
    } else {
        format!("{}: {}", status, body)
    };
    if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
        CoreError::Transient(msg)
    } else {
        CoreError::UploadFailed(msg)
    }
}

impl BlobStore for HttpBlobStore {
    fn put(
        &self,
        key: &str,
        body: Bytes,
        content_type: &str,
    ) -> impl Future<Output = Result<()>> + Send {
        self.upload(key, body, content_type)
    }

    fn durable_ref(&self, key: &str) -> ImageRef {
        ImageRef::new(format!("{}/blobs/{}", self.server, key))
    }
}
