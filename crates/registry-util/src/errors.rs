use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// Error kinds surfaced across the proxy, auth middleware, and driver loop.
///
/// Each variant maps to a fixed HTTP status via `IntoResponse`. Contention
/// (423 by default, but configurable per `AppState::locked_status`) is
/// reported by the controllers directly rather than through this enum,
/// since its status code is not fixed at compile time.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("upstream registry unreachable: {0}")]
    UpstreamUnreachable(#[from] reqwest::Error),

    #[error("failed to rewrite response body: {0}")]
    ResponseRewriteFailed(String),

    #[error("authorization failed")]
    AuthFailed,

    #[error("configuration error: {0}")]
    Configuration(String),
}

impl IntoResponse for RegistryError {
    fn into_response(self) -> Response {
        let status = match &self {
            RegistryError::UpstreamUnreachable(_) => StatusCode::SERVICE_UNAVAILABLE,
            RegistryError::ResponseRewriteFailed(_) => StatusCode::BAD_GATEWAY,
            RegistryError::AuthFailed => StatusCode::UNAUTHORIZED,
            RegistryError::Configuration(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, self.to_string()).into_response()
    }
}

pub type RegistryResult<T> = Result<T, RegistryError>;
