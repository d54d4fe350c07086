//! Error types for the HTTP client.

use pairup_room::ServiceError;

/// Errors returned by [`ApiClient`](crate::ApiClient) calls.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Credentials were rejected (401/403), or a call needing a token was
    /// made without one.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// The service could not be reached or the connection broke.
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Input rejected locally; nothing was sent.
    #[error("{0}")]
    Validation(String),

    /// Any other non-success status. `message` is the service's own text.
    #[error("{message}")]
    Rejected { status: u16, message: String },

    /// A success response whose body did not have the expected shape.
    #[error("unexpected response body: {0}")]
    Decode(#[from] serde_json::Error),
}

impl From<ApiError> for ServiceError {
    fn from(e: ApiError) -> Self {
        match e {
            ApiError::Auth(message) => ServiceError::Unauthorized(message),
            ApiError::Network(e) => ServiceError::Unreachable(e.to_string()),
            ApiError::Validation(message) => ServiceError::Invalid(message),
            ApiError::Rejected { status, message } => ServiceError::Rejected { status, message },
            ApiError::Decode(e) => ServiceError::BadResponse(e.to_string()),
        }
    }
}
