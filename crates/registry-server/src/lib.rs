//! The private registry facade: a reverse-proxying HTTP server that
//! impersonates an upstream Terraform Provider Registry Protocol registry,
//! rewriting download links back through itself so concurrent fetches for
//! the same plugin can be coordinated.

mod auth;
mod controllers;
mod proxy;
mod router;
mod server;
mod state;

pub use auth::AuthState;
pub use controllers::{DiscoveryController, DownloadController, FindPackageController, VersionsController};
pub use proxy::{ModifyError, ModifyResponseHook, ReverseProxy, RewriteHook};
pub use router::{Controller, ControllerRouter};
pub use server::Server;
pub use state::AppState;

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::middleware;
use registry_core::Coordinator;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use url::Url;

/// Wires components A–F into the router `Server` serves: the plugin
/// coordination service, the reverse-proxy handler, the auth middleware,
/// and the four controllers, composed through `ControllerRouter`.
///
/// `token` is the raw, unprefixed key clients are expected to present as
/// `Authorization: Bearer x-api-key:<token>` — not the `x-api-key:`-prefixed
/// value itself. An empty token disables the check.
#[allow(clippy::too_many_arguments)]
pub fn build(coordinator: Arc<Coordinator>, public_base_url: Url, addr: SocketAddr, token: String) -> Server {
    let proxy = ReverseProxy::new(reqwest::Client::new());
    let state = AppState::new(coordinator, proxy, public_base_url);

    let auth_state = AuthState { expected_token: token };

    let providers = ControllerRouter::new()
        .group("/v1/providers")
        .register(&[&VersionsController, &FindPackageController]);
    let providers_prefix = format!("{}/", providers.prefix());
    let providers = guard(providers, &auth_state);

    let downloads = guard(
        ControllerRouter::new().group("/downloads").register(&[&DownloadController]),
        &auth_state,
    );

    let mut discovery_entries = HashMap::new();
    discovery_entries.insert("providers.v1".to_string(), providers_prefix);

    let root = ControllerRouter::new()
        .register(&[&DiscoveryController::new(discovery_entries)])
        .merge_at("/v1/providers", providers)
        .merge_at("/downloads", downloads);

    let app = root
        .into_axum_router()
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()));

    Server::new(app, state, addr)
}

/// Applies the bearer-token check to one group's routes only — discovery
/// stays public per the route table in the registry protocol surface.
fn guard(group: ControllerRouter, auth_state: &AuthState) -> ControllerRouter {
    let prefix = group.prefix().to_string();
    let guarded = group
        .into_axum_router()
        .route_layer(middleware::from_fn_with_state(auth_state.clone(), auth::require_bearer_token));
    ControllerRouter::from_axum_router(prefix, guarded)
}
