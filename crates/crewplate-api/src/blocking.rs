use tracing::error;

use crewplate_core::CoreError;
use crewplate_db::Database;

use crate::auth::AppState;
use crate::error::ApiError;

/// Run store work off the async runtime, bounded by the request timeout.
///
/// A timeout surfaces as [`CoreError::Transient`]. The blocking task itself
/// keeps running until SQLite's busy timeout releases it.
pub(crate) async fn run_blocking<T, F>(state: &AppState, f: F) -> Result<T, ApiError>
where
    F: FnOnce(&Database) -> crewplate_core::Result<T> + Send + 'static,
    T: Send + 'static,
{
    let st = state.clone();
    let task = tokio::task::spawn_blocking(move || f(&st.db));

    match tokio::time::timeout(state.request_timeout, task).await {
        Err(_) => Err(CoreError::Transient("store call timed out".into()).into()),
        Ok(Err(e)) => {
            error!("spawn_blocking join error: {}", e);
            Err(ApiError::Internal("background task failed".into()))
        }
        Ok(Ok(res)) => res.map_err(ApiError::from),
    }
}

/// [`run_blocking`] for mutations that are safe to repeat: transient store
/// failures are retried under the state's policy before giving up.
pub(crate) async fn run_mutation<T, F>(state: &AppState, mut f: F) -> Result<T, ApiError>
where
    F: FnMut(&Database) -> crewplate_core::Result<T> + Send + 'static,
    T: Send + 'static,
{
    let retry = state.retry;
    run_blocking(state, move |db| retry.run_blocking(|| f(db))).await
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    use axum::http::StatusCode;
    use uuid::Uuid;

    use crewplate_core::blob::DiskBlobStore;
    use crewplate_core::retry::RetryPolicy;

    use super::*;
    use crate::auth::AppStateInner;

    async fn state(request_timeout: Duration) -> AppState {
        let tag = Uuid::new_v4();
        let tmp = std::env::temp_dir();
        let db = Database::open(&tmp.join(format!("crewplate_blocking_test_{}.db", tag))).unwrap();
        let blobs = DiskBlobStore::new(tmp.join(format!("crewplate_blocking_blobs_{}", tag)), "http://test")
            .await
            .unwrap();
        Arc::new(AppStateInner {
            db,
            jwt_secret: "test-secret".into(),
            blobs,
            request_timeout,
            retry: RetryPolicy::immediate(3),
            max_upload_bytes: 1024,
        })
    }

    #[tokio::test]
    async fn slow_store_call_times_out_as_unavailable() {
        let state = state(Duration::from_millis(1)).await;
        let err = run_blocking(&state, |_| {
            std::thread::sleep(Duration::from_millis(200));
            Ok(())
        })
        .await
        .unwrap_err();

        assert!(matches!(err, ApiError::Core(CoreError::Transient(_))));
        assert_eq!(err.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn persistent_transient_failure_is_retried_then_fails() {
        let state = state(Duration::from_secs(5)).await;
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let err = run_mutation(&state, move |_| -> crewplate_core::Result<()> {
            counter.fetch_add(1, Ordering::SeqCst);
            Err(CoreError::Transient("database is locked".into()))
        })
        .await
        .unwrap_err();

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(matches!(err, ApiError::Core(CoreError::OperationFailed(_))));
        assert_eq!(err.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn transient_failure_that_clears_succeeds() {
        let state = state(Duration::from_secs(5)).await;
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let value = run_mutation(&state, move |_| {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(CoreError::Transient("database is busy".into()))
            } else {
                Ok(7)
            }
        })
        .await
        .unwrap();

        assert_eq!(value, 7);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
