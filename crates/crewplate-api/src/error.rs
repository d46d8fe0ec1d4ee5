use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tracing::{error, warn};

use crewplate_core::CoreError;
use crewplate_types::api::ErrorBody;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("missing or invalid bearer token")]
    Unauthorized,

    #[error("{0}")]
    BadRequest(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Core(err) => match err {
                CoreError::Validation(_) => StatusCode::BAD_REQUEST,
                CoreError::NotFound(_) => StatusCode::NOT_FOUND,
                CoreError::Forbidden(_) => StatusCode::FORBIDDEN,
                CoreError::InvalidOperation(_) | CoreError::Conflict(_) => StatusCode::CONFLICT,
                CoreError::InvalidCredentials => StatusCode::UNAUTHORIZED,
                CoreError::Transient(_) | CoreError::OperationFailed(_) => {
                    StatusCode::SERVICE_UNAVAILABLE
                }
                CoreError::UploadFailed(_) => StatusCode::BAD_GATEWAY,
                CoreError::CodeGenerationExhausted(_) | CoreError::Storage(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Storage details stay in the log, not the response
        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            error!("{}", self);
            "internal server error".to_string()
        } else {
            if status.is_server_error() {
                warn!("{}", self);
            }
            self.to_string()
        };

        (status, Json(ErrorBody { error: message })).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn core_errors_map_to_statuses() {
        let cases = [
            (CoreError::Validation("bad".into()), StatusCode::BAD_REQUEST),
            (CoreError::NotFound("crew"), StatusCode::NOT_FOUND),
            (CoreError::Forbidden("no"), StatusCode::FORBIDDEN),
            (CoreError::InvalidOperation("self"), StatusCode::CONFLICT),
            (CoreError::Conflict("dup"), StatusCode::CONFLICT),
            (CoreError::InvalidCredentials, StatusCode::UNAUTHORIZED),
            (CoreError::CodeGenerationExhausted(8), StatusCode::INTERNAL_SERVER_ERROR),
            (CoreError::Transient("busy".into()), StatusCode::SERVICE_UNAVAILABLE),
            (CoreError::OperationFailed("busy".into()), StatusCode::SERVICE_UNAVAILABLE),
            (CoreError::UploadFailed("gone".into()), StatusCode::BAD_GATEWAY),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status(), status);
        }
    }

    #[test]
    fn storage_errors_hide_details() {
        let resp = ApiError::from(CoreError::Storage(anyhow::anyhow!("disk /var/x failed")))
            .into_response();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
