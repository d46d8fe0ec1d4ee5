use crewplate_types::models::InvalidAccessCode;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, CoreError>;

#[derive(Debug, Error)]
pub enum CoreError {
    /// Caller input is wrong. Never retried.
    #[error("{0}")]
    Validation(String),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("{0}")]
    Forbidden(&'static str),

    #[error("{0}")]
    InvalidOperation(&'static str),

    #[error("{0}")]
    Conflict(&'static str),

    #[error("invalid email or password")]
    InvalidCredentials,

    #[error("no unused access code found after {0} attempts")]
    CodeGenerationExhausted(usize),

    /// Busy store, timeout or network hiccup. Safe to retry.
    #[error("temporarily unavailable: {0}")]
    Transient(String),

    #[error("upload failed: {0}")]
    UploadFailed(String),

    /// A transient failure that outlived its retry budget.
    #[error("operation failed after retries: {0}")]
    OperationFailed(String),

    #[error("storage error: {0:#}")]
    Storage(anyhow::Error),
}

impl CoreError {
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }

    pub(crate) fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }
}

impl From<anyhow::Error> for CoreError {
    fn from(err: anyhow::Error) -> Self {
        if crewplate_db::is_transient(&err) {
            Self::Transient(format!("{:#}", err))
        } else {
            Self::Storage(err)
        }
    }
}

impl From<InvalidAccessCode> for CoreError {
    fn from(err: InvalidAccessCode) -> Self {
        Self::Validation(err.to_string())
    }
}
