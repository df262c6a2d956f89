use std::sync::Arc;

use axum::http::StatusCode;
use registry_core::Coordinator;
use url::Url;

use crate::proxy::ReverseProxy;

/// Shared state threaded through every route handler.
#[derive(Clone)]
pub struct AppState {
    pub coordinator: Arc<Coordinator>,
    pub proxy: ReverseProxy,
    /// This server's own externally-reachable base URL, used to build
    /// loopback download links (`http://<this-server>/downloads/...`).
    pub public_base_url: Url,
    /// The status reported for a request matching a live record. Defaults
    /// to `423 Locked`; kept as a single configuration value used
    /// everywhere the coordinator reports contention.
    pub locked_status: StatusCode,
}

impl AppState {
    pub fn new(coordinator: Arc<Coordinator>, proxy: ReverseProxy, public_base_url: Url) -> Self {
        AppState {
            coordinator,
            proxy,
            public_base_url,
            locked_status: StatusCode::from_u16(423).expect("423 is a valid status code"),
        }
    }

    pub fn with_locked_status(mut self, status: StatusCode) -> Self {
        self.locked_status = status;
        self
    }
}
