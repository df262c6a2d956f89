use axum::extract::{Path, State};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use registry_core::PluginIdentity;
use url::Url;

use crate::router::{Controller, ControllerRouter};
use crate::state::AppState;

pub struct VersionsController;

impl Controller for VersionsController {
    fn register_routes(&self, router: ControllerRouter) -> ControllerRouter {
        router.route("/:registry/:namespace/:name/versions", get(versions_handler))
    }
}

async fn versions_handler(
    State(state): State<AppState>,
    Path((registry, namespace, name)): Path<(String, String, String)>,
) -> Response {
    let identity = PluginIdentity {
        registry_host: Some(registry.clone()),
        namespace: Some(namespace.clone()),
        name: Some(name.clone()),
        ..PluginIdentity::default()
    };

    if state.coordinator.is_locked(&identity).await {
        return state.locked_status.into_response();
    }

    let target = format!("https://{registry}/v1/providers/{namespace}/{name}/versions");
    let url = match Url::parse(&target) {
        Ok(url) => url,
        Err(err) => {
            tracing::warn!(error = %err, %target, "could not build upstream versions URL");
            return axum::http::StatusCode::BAD_GATEWAY.into_response();
        }
    };

    match state.proxy.dispatch(url).await {
        Ok(response) => response,
        Err(err) => err.into_response(),
    }
}
