use std::sync::{Arc, Mutex};

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use registry_core::{PluginIdentity, PluginLinks, PluginRecord};
use serde_json::Value;
use url::Url;

use crate::proxy::ModifyError;
use crate::router::{Controller, ControllerRouter};
use crate::state::AppState;

const LINK_KEYS: [&str; 3] = ["download_url", "shasums_url", "shasums_signature_url"];

pub struct FindPackageController;

impl Controller for FindPackageController {
    fn register_routes(&self, router: ControllerRouter) -> ControllerRouter {
        router.route(
            "/:registry/:namespace/:name/:version/download/:os/:arch",
            get(find_package_handler),
        )
    }
}

#[allow(clippy::too_many_arguments)]
async fn find_package_handler(
    State(state): State<AppState>,
    Path((registry, namespace, name, version, os, arch)): Path<(String, String, String, String, String, String)>,
) -> Response {
    let identity = PluginIdentity::new(&registry, &namespace, &name, &version, &os, &arch);

    if !state.coordinator.lock(identity.clone()).await {
        tracing::debug!(%identity, "find-package contended");
        return locked(&state);
    }

    let target = format!("https://{registry}/v1/providers/{namespace}/{name}/{version}/download/{os}/{arch}");
    let url = match Url::parse(&target) {
        Ok(url) => url,
        Err(err) => {
            tracing::warn!(error = %err, %target, "could not build upstream find-package URL");
            state.coordinator.unlock(&identity, &PluginLinks::new()).await;
            return bad_gateway();
        }
    };

    // Harvested original upstream URLs, written to by the modify-response
    // hook below and read back here once the proxy call returns. The hook
    // itself stays synchronous (the builder contract); recording the links
    // on the coordinator is an async follow-up step the controller does.
    let harvested: Arc<Mutex<Vec<Url>>> = Arc::new(Mutex::new(Vec::new()));
    let hook_harvested = harvested.clone();
    let base = state.public_base_url.clone();

    let proxy = state
        .proxy
        .with_rewrite(Arc::new(|headers: &mut HeaderMap| {
            // The response body must be JSON-decodable; a compressed body
            // would defeat the rewrite step below.
            headers.remove(header::ACCEPT_ENCODING);
        }))
        .with_modify_response(Arc::new(move |status, headers, body| {
            if status != StatusCode::OK {
                return Ok((headers, body));
            }
            rewrite_download_links(body, &base, &hook_harvested).map(|rewritten| (headers, rewritten))
        }));

    let response = match proxy.dispatch(url).await {
        Ok(response) => response,
        Err(err) => {
            // Transport failure or a rewrite failure: the lock acquired
            // above does not correspond to a usable in-flight download, so
            // it must be released with zero links to free the record
            // immediately.
            state.coordinator.unlock(&identity, &PluginLinks::new()).await;
            return err.into_response();
        }
    };

    if response.status() == StatusCode::OK {
        let links = harvested.lock().expect("hook never panics while holding the lock").clone();
        let record = PluginRecord::with_links(identity.clone(), PluginLinks::from_urls(links));
        state.coordinator.add(record).await;
    } else {
        // Upstream returned a non-2xx status of its own (passed through
        // unchanged): same teardown as a transport failure above.
        state.coordinator.unlock(&identity, &PluginLinks::new()).await;
    }

    response
}

fn rewrite_download_links(body: Bytes, base: &Url, harvested: &Arc<Mutex<Vec<Url>>>) -> Result<Bytes, ModifyError> {
    let mut decoded: Value = serde_json::from_slice(&body).map_err(|err| ModifyError(err.to_string()))?;
    let object = decoded
        .as_object_mut()
        .ok_or_else(|| ModifyError("find-package response was not a JSON object".into()))?;

    for key in LINK_KEYS {
        let Some(field) = object.get_mut(key) else {
            continue;
        };
        if field.is_null() {
            continue;
        }
        let original = field
            .as_str()
            .ok_or_else(|| ModifyError(format!("{key} was not a string")))?;
        let original_url = Url::parse(original).map_err(|err| ModifyError(err.to_string()))?;

        harvested
            .lock()
            .expect("hook never panics while holding the lock")
            .push(original_url.clone());

        *field = Value::String(loopback_url(base, &original_url));
    }

    serde_json::to_vec(&decoded)
        .map(Bytes::from)
        .map_err(|err| ModifyError(err.to_string()))
}

fn loopback_url(base: &Url, original: &Url) -> String {
    let host = original.host_str().unwrap_or_default();
    let path = original.path().trim_start_matches('/');
    format!("{}/downloads/{host}/{path}", base.as_str().trim_end_matches('/'))
}

fn locked(state: &AppState) -> Response {
    state.locked_status.into_response()
}

fn bad_gateway() -> Response {
    StatusCode::BAD_GATEWAY.into_response()
}
