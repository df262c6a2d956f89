use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use url::Url;

use crate::router::{Controller, ControllerRouter};
use crate::state::AppState;

pub struct DownloadController;

impl Controller for DownloadController {
    fn register_routes(&self, router: ControllerRouter) -> ControllerRouter {
        router.route("/:host/*path", get(download_handler))
    }
}

async fn download_handler(State(state): State<AppState>, Path((host, path)): Path<(String, String)>) -> Response {
    let target = format!("https://{host}/{path}");
    let url = match Url::parse(&target) {
        Ok(url) => url,
        Err(err) => {
            tracing::warn!(error = %err, %target, "could not build upstream download URL");
            return StatusCode::BAD_GATEWAY.into_response();
        }
    };

    // A download must correspond to a live record findPackage already
    // created; if nothing is tracking this exact link there is nothing to
    // stream on behalf of, so it gets the same locked status a genuine
    // contention would.
    if !state.coordinator.is_locked_for_link(&url).await {
        return state.locked_status.into_response();
    }

    let response = match state.proxy.dispatch(url.clone()).await {
        Ok(response) => response,
        Err(err) => {
            state.coordinator.unlock_link(&url).await;
            return err.into_response();
        }
    };
    state.coordinator.unlock_link(&url).await;
    response
}
