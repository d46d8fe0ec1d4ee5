//! Image storage behind a small put/resolve interface.
//!
//! [`DiskBlobStore`] is what the server writes uploads into; [`HttpBlobStore`]
//! is the client side of the same contract, pushing bytes to the server's
//! upload endpoint.

mod disk;
mod http;

use std::future::Future;
use std::sync::Arc;

use bytes::Bytes;

use crewplate_types::models::ImageRef;

use crate::error::{CoreError, Result};

pub use disk::{DiskBlobStore, StoredBlob};
pub use http::HttpBlobStore;

pub const IMAGE_CONTENT_TYPE: &str = "image/jpeg";

pub trait BlobStore: Send + Sync {
    /// Store `body` under `key`, replacing anything already there.
    ///
    /// Failures worth retrying come back as [`CoreError::Transient`].
    fn put(
        &self,
        key: &str,
        body: Bytes,
        content_type: &str,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Reference that stays valid for as long as the object exists.
    fn durable_ref(&self, key: &str) -> ImageRef;
}

impl<T: BlobStore> BlobStore for Arc<T> {
    fn put(
        &self,
        key: &str,
        body: Bytes,
        content_type: &str,
    ) -> impl Future<Output = Result<()>> + Send {
        (**self).put(key, body, content_type)
    }

    fn durable_ref(&self, key: &str) -> ImageRef {
        (**self).durable_ref(key)
    }
}

/// Keys are `/`-separated relative paths of plain segments. Anything that
/// could step outside the store root is refused.
pub fn validate_key(key: &str) -> Result<()> {
    if key.is_empty() || key.len() > 512 {
        return Err(CoreError::validation("blob key must be 1-512 characters"));
    }
    for segment in key.split('/') {
        let plain = segment
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.'));
        if segment.is_empty() || segment == "." || segment == ".." || !plain {
            return Err(CoreError::validation(format!("invalid blob key '{}'", key)));
        }
    }
    Ok(())
}

/// Guess a content type from the key's extension.
pub fn content_type_for(key: &str) -> &'static str {
    let ext = key.rsplit_once('.').map(|(_, ext)| ext.to_ascii_lowercase());
    match ext.as_deref() {
        Some("jpg" | "jpeg") => IMAGE_CONTENT_TYPE,
        Some("png") => "image/png",
        Some("webp") => "image/webp",
        Some("heic") => "image/heic",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_cannot_escape_the_root() {
        assert!(validate_key("3f2a/1700000000000.jpg").is_ok());
        assert!(validate_key("../etc/passwd").is_err());
        assert!(validate_key("/abs.jpg").is_err());
        assert!(validate_key("a//b.jpg").is_err());
        assert!(validate_key("a/./b.jpg").is_err());
        assert!(validate_key("a\\b.jpg").is_err());
        assert!(validate_key("").is_err());
    }

    #[test]
    fn content_type_from_extension() {
        assert_eq!(content_type_for("u/1.JPG"), "image/jpeg");
        assert_eq!(content_type_for("u/1.png"), "image/png");
        assert_eq!(content_type_for("u/noext"), "application/octet-stream");
    }
}
