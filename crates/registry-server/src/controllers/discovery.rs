use std::collections::HashMap;

use axum::routing::get;
use axum::Json;

use crate::router::{Controller, ControllerRouter};

/// Serves `/.well-known/terraform.json`, the registry protocol's service
/// discovery document. The entries it publishes are collected from other
/// controllers at assembly time (see `registry-server`'s top-level builder)
/// rather than hard-coded here.
pub struct DiscoveryController {
    entries: HashMap<String, String>,
}

impl DiscoveryController {
    pub fn new(entries: HashMap<String, String>) -> Self {
        DiscoveryController { entries }
    }
}

impl Controller for DiscoveryController {
    fn register_routes(&self, router: ControllerRouter) -> ControllerRouter {
        let entries = self.entries.clone();
        router.route(
            "/.well-known/terraform.json",
            get(move || {
                let entries = entries.clone();
                async move { Json(entries) }
            }),
        )
    }
}
