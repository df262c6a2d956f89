use std::sync::Arc;

use axum::body::Bytes;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use registry_util::RegistryError;
use url::Url;

/// Called immediately before dispatch; may mutate outgoing headers.
pub type RewriteHook = Arc<dyn Fn(&mut HeaderMap) + Send + Sync>;

/// Called after the upstream responds, before bytes are flushed to the
/// client. May rewrite the body; the proxy recomputes `Content-Length`
/// from whatever bytes come back.
pub type ModifyResponseHook =
    Arc<dyn Fn(StatusCode, HeaderMap, Bytes) -> Result<(HeaderMap, Bytes), ModifyError> + Send + Sync>;

/// A rewrite hook failed to produce a usable response. Callers map this to
/// `502 Bad Gateway` via `RegistryError::ResponseRewriteFailed`.
#[derive(Debug, thiserror::Error)]
#[error("response rewrite failed: {0}")]
pub struct ModifyError(pub String);

/// A generic forwarder to an absolute upstream URL with composable,
/// immutable rewrite/modify-response hooks. Several controllers share one
/// base proxy and specialize it with `with_rewrite`/`with_modify_response`,
/// each returning a new value rather than mutating in place.
#[derive(Clone)]
pub struct ReverseProxy {
    client: reqwest::Client,
    rewrite: Option<RewriteHook>,
    modify_response: Option<ModifyResponseHook>,
}

impl ReverseProxy {
    pub fn new(client: reqwest::Client) -> Self {
        ReverseProxy {
            client,
            rewrite: None,
            modify_response: None,
        }
    }

    pub fn with_rewrite(&self, hook: RewriteHook) -> Self {
        ReverseProxy {
            client: self.client.clone(),
            rewrite: Some(hook),
            modify_response: self.modify_response.clone(),
        }
    }

    pub fn with_modify_response(&self, hook: ModifyResponseHook) -> Self {
        ReverseProxy {
            client: self.client.clone(),
            rewrite: self.rewrite.clone(),
            modify_response: Some(hook),
        }
    }

    /// Dispatches a `GET` to `target` and returns the response to forward to
    /// the original client. Upstream transport errors and a failing
    /// modify-response hook are reported as `RegistryError`, which the
    /// caller turns into a response via `IntoResponse` (503 and 502
    /// respectively). A non-2xx upstream status is not an error here — it
    /// is forwarded through unchanged in the `Ok` response. The proxy never
    /// performs authentication itself — that's applied upstream of it at
    /// the router.
    #[tracing::instrument(skip(self), fields(target = %target))]
    pub async fn dispatch(&self, target: Url) -> Result<Response, RegistryError> {
        let mut headers = HeaderMap::new();
        if let Some(rewrite) = &self.rewrite {
            rewrite(&mut headers);
        }

        let request = self.client.get(target.clone()).headers(headers);
        let upstream = request.send().await.map_err(|err| {
            tracing::warn!(error = %err, "upstream unreachable");
            RegistryError::UpstreamUnreachable(err)
        })?;

        let status = upstream.status();
        let headers = upstream.headers().clone();
        let body = upstream.bytes().await.map_err(|err| {
            tracing::warn!(error = %err, "upstream body read failed");
            RegistryError::UpstreamUnreachable(err)
        })?;

        let (headers, body) = match &self.modify_response {
            Some(modify) => modify(status, headers, body).map_err(|err| {
                tracing::warn!(error = %err.0, "response rewrite failed");
                RegistryError::ResponseRewriteFailed(err.0)
            })?,
            None => (headers, body),
        };

        let content_length = body.len();
        let mut response = (status, headers, body).into_response();
        response.headers_mut().insert(
            axum::http::header::CONTENT_LENGTH,
            axum::http::HeaderValue::from_str(&content_length.to_string())
                .expect("decimal content-length is always a valid header value"),
        );
        Ok(response)
    }
}
