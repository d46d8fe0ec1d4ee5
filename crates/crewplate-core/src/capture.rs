use std::sync::{Mutex, MutexGuard, PoisonError};

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use crewplate_types::models::{CaptureStatus, ImageRef};

use crate::blob::{BlobStore, IMAGE_CONTENT_TYPE};
use crate::error::CoreError;
use crate::retry::RetryPolicy;

/// Recorded on the preview when an upload future is dropped mid-flight.
pub const UPLOAD_CANCELLED: &str = "upload cancelled";

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("cannot {action} while {from:?}")]
    InvalidTransition {
        action: &'static str,
        from: CaptureStatus,
    },

    #[error("an upload is already in flight")]
    UploadInFlight,

    #[error("captured image is empty")]
    EmptyCapture,

    #[error("captured image is not valid base64: {0}")]
    InvalidEncoding(#[from] base64::DecodeError),

    /// Terminal upload failure. The preview is kept so the user can retry.
    #[error(transparent)]
    Upload(CoreError),
}

/// Image bytes held in memory between the shutter and the upload.
#[derive(Debug, Clone)]
pub struct CapturedImage {
    data: Bytes,
}

impl CapturedImage {
    pub fn from_bytes(data: impl Into<Bytes>) -> Result<Self, CaptureError> {
        let data = data.into();
        if data.is_empty() {
            return Err(CaptureError::EmptyCapture);
        }
        Ok(Self { data })
    }

    /// Cameras commonly hand back base64.
    pub fn from_base64(encoded: &str) -> Result<Self, CaptureError> {
        Self::from_bytes(STANDARD.decode(encoded.trim())?)
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn bytes(&self) -> &Bytes {
        &self.data
    }
}

#[derive(Debug)]
enum Stage {
    Idle,
    Capturing,
    Preview {
        image: CapturedImage,
        last_error: Option<String>,
    },
    Uploading {
        image: CapturedImage,
    },
}

impl Stage {
    fn status(&self) -> CaptureStatus {
        match self {
            Stage::Idle => CaptureStatus::Idle,
            Stage::Capturing => CaptureStatus::Capturing,
            Stage::Preview {
                last_error: None, ..
            } => CaptureStatus::Preview,
            Stage::Preview { .. } => CaptureStatus::Failed,
            Stage::Uploading { .. } => CaptureStatus::Uploading,
        }
    }
}

/// Key an upload is stored under: scoped to the user, named by capture time.
pub fn upload_key(user_id: Uuid, at: DateTime<Utc>) -> String {
    format!("{}/{}.jpg", user_id, at.timestamp_millis())
}

/// Camera shot to stored image, one step at a time.
///
/// ```text
/// Idle --shutter--> Capturing --captured--> Preview --confirm--> Uploading
///                     ^    |                  |                   |    |
///                     |    +--capture_failed--+-> Idle  <--ok-----+    |
///                     +-------retake----------+                        |
///                                             ^-------failure----------+
/// ```
///
/// Methods take `&self`; the stage lock is never held across the upload, and
/// a second `confirm` during an upload is refused with
/// [`CaptureError::UploadInFlight`].
pub struct CapturePipeline<S> {
    store: S,
    user_id: Uuid,
    retry: RetryPolicy,
    stage: Mutex<Stage>,
}

impl<S: BlobStore> CapturePipeline<S> {
    pub fn new(store: S, user_id: Uuid) -> Self {
        Self {
            store,
            user_id,
            retry: RetryPolicy::default(),
            stage: Mutex::new(Stage::Idle),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    fn stage(&self) -> MutexGuard<'_, Stage> {
        // Every transition is a single assignment, so a poisoned stage is
        // still a valid one.
        self.stage.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn status(&self) -> CaptureStatus {
        self.stage().status()
    }

    /// Message from the last failed upload, while the preview is still held.
    pub fn last_error(&self) -> Option<String> {
        match &*self.stage() {
            Stage::Preview { last_error, .. } => last_error.clone(),
            _ => None,
        }
    }

    pub fn preview(&self) -> Option<CapturedImage> {
        match &*self.stage() {
            Stage::Preview { image, .. } | Stage::Uploading { image } => Some(image.clone()),
            _ => None,
        }
    }

    pub fn shutter(&self) -> Result<(), CaptureError> {
        let mut stage = self.stage();
        if !matches!(*stage, Stage::Idle) {
            return Err(invalid("shutter", &stage));
        }
        *stage = Stage::Capturing;
        Ok(())
    }

    pub fn captured(&self, image: CapturedImage) -> Result<(), CaptureError> {
        let mut stage = self.stage();
        if !matches!(*stage, Stage::Capturing) {
            return Err(invalid("accept a capture", &stage));
        }
        *stage = Stage::Preview {
            image,
            last_error: None,
        };
        Ok(())
    }

    /// The camera gave up; nothing was captured.
    pub fn capture_failed(&self) -> Result<(), CaptureError> {
        let mut stage = self.stage();
        if !matches!(*stage, Stage::Capturing) {
            return Err(invalid("fail a capture", &stage));
        }
        *stage = Stage::Idle;
        Ok(())
    }

    /// Throw the preview away and go back to the camera.
    pub fn retake(&self) -> Result<(), CaptureError> {
        let mut stage = self.stage();
        match *stage {
            Stage::Preview { .. } => {}
            Stage::Uploading { .. } => return Err(CaptureError::UploadInFlight),
            _ => return Err(invalid("retake", &stage)),
        }
        *stage = Stage::Capturing;
        Ok(())
    }

    /// Back to idle from anywhere except mid-upload, dropping any preview.
    pub fn cancel(&self) -> Result<(), CaptureError> {
        let mut stage = self.stage();
        if let Stage::Uploading { .. } = *stage {
            return Err(CaptureError::UploadInFlight);
        }
        *stage = Stage::Idle;
        Ok(())
    }

    /// Upload the preview and hand back its durable reference.
    ///
    /// On success the pipeline is idle again. On failure it returns to the
    /// preview with the error recorded, and `confirm` may be called again.
    /// Dropping the returned future mid-upload counts as a failure with
    /// [`UPLOAD_CANCELLED`] as the error.
    pub async fn confirm(&self) -> Result<ImageRef, CaptureError> {
        let (in_flight, body) = {
            let mut stage = self.stage();
            let image = match &*stage {
                Stage::Preview { image, .. } => image.clone(),
                Stage::Uploading { .. } => return Err(CaptureError::UploadInFlight),
                other => return Err(invalid("confirm", other)),
            };
            *stage = Stage::Uploading {
                image: image.clone(),
            };
            let body = image.bytes().clone();
            let in_flight = InFlight {
                stage: &self.stage,
                image: Some(image),
            };
            (in_flight, body)
        };

        let key = upload_key(self.user_id, Utc::now());
        info!("Uploading capture {} ({} bytes)", key, body.len());

        let uploaded = self
            .retry
            .run(|| self.store.put(&key, body.clone(), IMAGE_CONTENT_TYPE))
            .await;

        match uploaded {
            Ok(()) => {
                in_flight.succeed();
                Ok(self.store.durable_ref(&key))
            }
            Err(err) => {
                let err = match err {
                    CoreError::Transient(msg) => CoreError::UploadFailed(msg),
                    CoreError::UploadFailed(msg) => CoreError::UploadFailed(msg),
                    other => CoreError::UploadFailed(other.to_string()),
                };
                warn!("Upload of {} failed: {}", key, err);
                in_flight.fail(err.to_string());
                Err(CaptureError::Upload(err))
            }
        }
    }
}

/// Held for the duration of an upload. If `confirm` is dropped before it
/// settles the stage, the preview comes back marked as failed.
struct InFlight<'a> {
    stage: &'a Mutex<Stage>,
    image: Option<CapturedImage>,
}

impl InFlight<'_> {
    fn lock(&self) -> MutexGuard<'_, Stage> {
        self.stage.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn succeed(mut self) {
        self.image = None;
        *self.lock() = Stage::Idle;
    }

    fn fail(mut self, error: String) {
        if let Some(image) = self.image.take() {
            *self.lock() = Stage::Preview {
                image,
                last_error: Some(error),
            };
        }
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if let Some(image) = self.image.take() {
            warn!("Upload abandoned before it finished");
            *self.lock() = Stage::Preview {
                image,
                last_error: Some(UPLOAD_CANCELLED.to_string()),
            };
        }
    }
}

fn invalid(action: &'static str, from: &Stage) -> CaptureError {
    CaptureError::InvalidTransition {
        action,
        from: from.status(),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::future::Future;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    use tokio::sync::Notify;

    use super::*;
    use crate::error::Result;

    /// In-memory store that fails the first `failures` puts as transient and
    /// can optionally wait on a gate before finishing.
    #[derive(Default)]
    struct TestStore {
        objects: Mutex<HashMap<String, Bytes>>,
        failures: AtomicU32,
        rejected: bool,
        gate: Option<Arc<Notify>>,
    }

    impl BlobStore for TestStore {
        fn put(
            &self,
            key: &str,
            body: Bytes,
            _content_type: &str,
        ) -> impl Future<Output = Result<()>> + Send {
            async move {
                if let Some(gate) = &self.gate {
                    gate.notified().await;
                }
                if self.rejected {
                    return Err(CoreError::UploadFailed("403 Forbidden".into()));
                }
                if self.failures.load(Ordering::SeqCst) > 0 {
                    self.failures.fetch_sub(1, Ordering::SeqCst);
                    return Err(CoreError::Transient("connection reset".into()));
                }
                self.objects.lock().unwrap().insert(key.to_string(), body);
                Ok(())
            }
        }

        fn durable_ref(&self, key: &str) -> ImageRef {
            ImageRef::new(format!("mem://{}", key))
        }
    }

    fn previewing(store: TestStore) -> CapturePipeline<TestStore> {
        let pipeline = CapturePipeline::new(store, Uuid::new_v4()).with_retry(RetryPolicy::immediate(3));
        pipeline.shutter().unwrap();
        pipeline
            .captured(CapturedImage::from_bytes(&b"jpeg"[..]).unwrap())
            .unwrap();
        pipeline
    }

    #[tokio::test]
    async fn happy_path_returns_reference_and_goes_idle() {
        let pipeline = previewing(TestStore::default());
        assert_eq!(pipeline.status(), CaptureStatus::Preview);

        let reference = pipeline.confirm().await.unwrap();
        assert!(reference.as_str().starts_with(&format!("mem://{}/", pipeline.user_id)));
        assert!(reference.as_str().ends_with(".jpg"));
        assert_eq!(pipeline.status(), CaptureStatus::Idle);
        assert!(pipeline.preview().is_none());
        assert_eq!(pipeline.store.objects.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn transient_failures_are_retried() {
        let store = TestStore {
            failures: AtomicU32::new(2),
            ..Default::default()
        };
        let pipeline = previewing(store);
        assert!(pipeline.confirm().await.is_ok());
    }

    #[tokio::test]
    async fn failure_returns_to_preview_and_allows_retry() {
        let store = TestStore {
            failures: AtomicU32::new(3),
            ..Default::default()
        };
        let pipeline = previewing(store);

        let err = pipeline.confirm().await.unwrap_err();
        assert!(matches!(err, CaptureError::Upload(CoreError::UploadFailed(_))));
        assert_eq!(pipeline.status(), CaptureStatus::Failed);
        assert!(pipeline.last_error().is_some());
        assert!(pipeline.preview().is_some());

        // Store has recovered; the held preview uploads on the next confirm
        assert!(pipeline.confirm().await.is_ok());
        assert_eq!(pipeline.status(), CaptureStatus::Idle);
    }

    #[tokio::test]
    async fn permanent_rejection_is_not_retried() {
        let store = TestStore {
            rejected: true,
            ..Default::default()
        };
        let pipeline = previewing(store);
        assert!(matches!(
            pipeline.confirm().await,
            Err(CaptureError::Upload(CoreError::UploadFailed(_)))
        ));
        assert_eq!(pipeline.status(), CaptureStatus::Failed);
    }

    #[tokio::test]
    async fn second_confirm_during_upload_is_rejected() {
        let gate = Arc::new(Notify::new());
        let store = TestStore {
            gate: Some(gate.clone()),
            ..Default::default()
        };
        let pipeline = previewing(store);

        let (first, second) = tokio::join!(pipeline.confirm(), async {
            assert_eq!(pipeline.status(), CaptureStatus::Uploading);
            let second = pipeline.confirm().await;
            assert!(matches!(pipeline.cancel(), Err(CaptureError::UploadInFlight)));
            gate.notify_one();
            second
        });

        assert!(first.is_ok());
        assert!(matches!(second, Err(CaptureError::UploadInFlight)));
        assert_eq!(pipeline.store.objects.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn abandoned_upload_returns_to_a_failed_preview() {
        let gate = Arc::new(Notify::new());
        let store = TestStore {
            gate: Some(gate),
            ..Default::default()
        };
        let pipeline = previewing(store);

        let timed_out =
            tokio::time::timeout(std::time::Duration::from_millis(20), pipeline.confirm()).await;
        assert!(timed_out.is_err());

        assert_eq!(pipeline.status(), CaptureStatus::Failed);
        assert_eq!(pipeline.last_error().as_deref(), Some(UPLOAD_CANCELLED));
        assert!(pipeline.preview().is_some());

        pipeline.retake().unwrap();
        assert_eq!(pipeline.status(), CaptureStatus::Capturing);
    }

    #[tokio::test]
    async fn abandoned_upload_can_be_confirmed_again() {
        let gate = Arc::new(Notify::new());
        let store = TestStore {
            gate: Some(gate.clone()),
            ..Default::default()
        };
        let pipeline = previewing(store);

        let _ = tokio::time::timeout(std::time::Duration::from_millis(20), pipeline.confirm()).await;
        assert_eq!(pipeline.status(), CaptureStatus::Failed);

        gate.notify_one();
        assert!(pipeline.confirm().await.is_ok());
        assert_eq!(pipeline.status(), CaptureStatus::Idle);
    }

    #[test]
    fn retake_discards_the_preview() {
        let pipeline = previewing(TestStore::default());
        pipeline.retake().unwrap();
        assert_eq!(pipeline.status(), CaptureStatus::Capturing);
        assert!(pipeline.preview().is_none());

        pipeline.capture_failed().unwrap();
        assert_eq!(pipeline.status(), CaptureStatus::Idle);
    }

    #[tokio::test]
    async fn out_of_order_calls_are_rejected() {
        let pipeline = CapturePipeline::new(TestStore::default(), Uuid::new_v4());
        assert!(matches!(
            pipeline.confirm().await,
            Err(CaptureError::InvalidTransition { from: CaptureStatus::Idle, .. })
        ));
        assert!(pipeline.retake().is_err());

        pipeline.shutter().unwrap();
        assert!(pipeline.shutter().is_err());

        pipeline.cancel().unwrap();
        assert_eq!(pipeline.status(), CaptureStatus::Idle);
    }

    #[test]
    fn captures_must_not_be_empty() {
        assert!(matches!(CapturedImage::from_bytes(Vec::<u8>::new()), Err(CaptureError::EmptyCapture)));
        assert!(matches!(CapturedImage::from_base64("***"), Err(CaptureError::InvalidEncoding(_))));
        assert_eq!(CapturedImage::from_base64("anBlZw==").unwrap().len(), 4);
    }
}
