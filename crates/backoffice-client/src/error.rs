//! Error types for the Backoffice client.

use thiserror::Error;

/// Errors surfaced to callers of the gateway.
///
/// Callers never see raw status codes or response bodies: every application
/// failure arrives as [`ApiError::Api`] carrying one normalized message.
#[derive(Error, Debug)]
pub enum ApiError {
    /// No response was obtained (host unreachable, DNS failure, reset).
    #[error("Network error: {0}")]
    Network(String),

    /// The session could not be renewed; credentials were cleared.
    #[error("Unauthorized: session expired")]
    Unauthorized,

    /// The server rejected the request.
    #[error("{0}")]
    Api(String),

    /// The request could not be built (unserializable body, bad multipart part).
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// A typed call expected data but the response carried none.
    #[error("Empty response")]
    EmptyResponse,

    /// The response body did not match the expected shape.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// The client could not be constructed from its configuration.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        ApiError::Network(err.to_string())
    }
}

/// Result type alias for gateway operations.
pub type ApiResult<T> = Result<T, ApiError>;
