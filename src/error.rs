use thiserror::Error;

/// Failures surfaced by the document store.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("document {0} not found")]
    NotFound(String),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Failures surfaced by the external metadata API.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("request failed with status {0}")]
    Status(u16),

    #[error("network error: {0}")]
    Network(String),

    #[error("malformed response: {0}")]
    Decode(String),
}

/// Operation-level failures. An operation that is already in flight is not an
/// error; it is reported as a no-op by the mutation guard.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("not signed in")]
    NotAuthenticated,

    #[error("not found: {0}")]
    NotFound(String),

    #[error("remote unavailable: {0}")]
    RemoteUnavailable(String),
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(path) => AppError::NotFound(path),
            other => AppError::RemoteUnavailable(other.to_string()),
        }
    }
}

impl From<ApiError> for AppError {
    fn from(err: ApiError) -> Self {
        AppError::RemoteUnavailable(err.to_string())
    }
}

impl AppError {
    /// Short status line safe to show an end user. Full detail goes to the
    /// logs, never to the UI.
    pub fn user_message(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "That request looks invalid",
            AppError::NotAuthenticated => "Sign in to continue",
            AppError::NotFound(_) => "Content not found",
            AppError::RemoteUnavailable(_) => "Connection problem, please try again",
        }
    }
}
