use std::future::Future;
use std::path::PathBuf;

use bytes::Bytes;
use sha2::{Digest, Sha256};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};
use uuid::Uuid;

use crewplate_types::models::ImageRef;

use super::{BlobStore, validate_key};
use crate::error::{CoreError, Result};

fn io_error(err: std::io::Error) -> CoreError {
    CoreError::Storage(err.into())
}

#[derive(Debug, Clone)]
pub struct StoredBlob {
    pub size: u64,
    pub sha256: String,
}

/// Blobs stored as plain files at `{dir}/{key}`.
///
/// Writes go to a temporary sibling first and are renamed into place, so a
/// reader never sees a half-written image.
pub struct DiskBlobStore {
    dir: PathBuf,
    public_base: String,
}

impl DiskBlobStore {
    pub async fn new(dir: PathBuf, public_base: impl Into<String>) -> anyhow::Result<Self> {
        fs::create_dir_all(&dir).await?;
        info!("Blob storage directory: {}", dir.display());
        Ok(Self {
            dir,
            public_base: public_base.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn path_for(&self, key: &str) -> Result<PathBuf> {
        validate_key(key)?;
        Ok(self.dir.join(key))
    }

    pub fn public_url(&self, key: &str) -> String {
        format!("{}/blobs/{}", self.public_base, key)
    }

    pub async fn write(&self, key: &str, data: &[u8]) -> Result<StoredBlob> {
        let path = self.path_for(key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await.map_err(io_error)?;
        }

        let tmp = path.with_extension(format!("{}.tmp", Uuid::new_v4()));
        let mut file = fs::File::create(&tmp).await.map_err(io_error)?;
        file.write_all(data).await.map_err(io_error)?;
        file.flush().await.map_err(io_error)?;
        file.sync_all().await.map_err(io_error)?;
        drop(file);

        if let Err(e) = fs::rename(&tmp, &path).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(io_error(e));
        }

        let sha256 = hex::encode(Sha256::digest(data));
        debug!("Stored blob {} ({} bytes, sha256 {})", key, data.len(), sha256);
        Ok(StoredBlob {
            size: data.len() as u64,
            sha256,
        })
    }

    /// `None` if nothing is stored under `key`.
    pub async fn read(&self, key: &str) -> Result<Option<Bytes>> {
        let path = self.path_for(key)?;
        match fs::read(&path).await {
            Ok(data) => Ok(Some(Bytes::from(data))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(io_error(e)),
        }
    }
}

impl BlobStore for DiskBlobStore {
    fn put(
        &self,
        key: &str,
        body: Bytes,
        _content_type: &str,
    ) -> impl Future<Output = Result<()>> + Send {
        async move {
            self.write(key, &body).await?;
            Ok(())
        }
    }

    fn durable_ref(&self, key: &str) -> ImageRef {
        ImageRef::new(self.public_url(key))
    }
}
