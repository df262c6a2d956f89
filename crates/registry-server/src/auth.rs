use axum::extract::{Request, State};
use axum::http::header;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use registry_util::RegistryError;

/// Shared state the auth middleware reads from: the expected bearer value.
/// An empty token disables the check entirely, matching the original's
/// behavior of only validating when a token has actually been configured
/// (used in tests that don't want to mint and pass one around).
#[derive(Clone, Debug, Default)]
pub struct AuthState {
    pub expected_token: String,
}

/// Validates `Authorization: Bearer x-api-key:<token>`. The scheme prefix
/// and the `x-api-key:` marker are stripped and the residue compared
/// byte-for-byte with the configured token.
pub async fn require_bearer_token(State(auth): State<AuthState>, request: Request, next: Next) -> Response {
    if auth.expected_token.is_empty() {
        return next.run(request).await;
    }

    let provided = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(extract_token);

    match provided {
        Some(token) if token == auth.expected_token => next.run(request).await,
        _ => RegistryError::AuthFailed.into_response(),
    }
}

const KEY_PREFIX: &str = "x-api-key:";

fn extract_token(header_value: &str) -> Option<&str> {
    let rest = header_value.strip_prefix("Bearer ")?;
    rest.strip_prefix(KEY_PREFIX)
}
