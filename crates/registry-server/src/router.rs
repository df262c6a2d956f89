use axum::routing::MethodRouter;
use axum::Router;

use crate::state::AppState;

/// A controller declares its own routes against a supplied router and,
/// optionally, the discovery keys it wants published under
/// `/.well-known/terraform.json`.
pub trait Controller: Send + Sync {
    fn register_routes(&self, router: ControllerRouter) -> ControllerRouter;

    fn discovery_entries(&self) -> Vec<(String, String)> {
        Vec::new()
    }
}

/// A thin layer over `axum::Router` offering prefix-joining groups and
/// controller registration. `group(prefix)` starts a fresh sub-router whose
/// absolute path prefix is tracked so controllers (and the discovery
/// controller) can read it back at registration time instead of it being
/// hard-coded.
pub struct ControllerRouter {
    prefix: String,
    router: Router<AppState>,
}

impl Default for ControllerRouter {
    fn default() -> Self {
        Self::new()
    }
}

impl ControllerRouter {
    pub fn new() -> Self {
        ControllerRouter {
            prefix: String::new(),
            router: Router::new(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Starts a sub-router nested at `relative_prefix`, joined onto this
    /// router's own prefix.
    pub fn group(&self, relative_prefix: &str) -> Self {
        ControllerRouter {
            prefix: join_prefix(&self.prefix, relative_prefix),
            router: Router::new(),
        }
    }

    pub fn route(mut self, path: &str, method_router: MethodRouter<AppState>) -> Self {
        self.router = self.router.route(path, method_router);
        self
    }

    /// Runs `controllers` against this router in order, returning the
    /// composed result.
    pub fn register(mut self, controllers: &[&dyn Controller]) -> Self {
        for controller in controllers {
            self = controller.register_routes(self);
        }
        self
    }

    /// Merges a sub-router built via `group(relative_prefix)` back into
    /// this one at that same path.
    pub fn merge_at(mut self, relative_prefix: &str, nested: ControllerRouter) -> Self {
        self.router = self.router.nest(relative_prefix, nested.router);
        self
    }

    pub fn into_axum_router(self) -> Router<AppState> {
        self.router
    }

    /// Rewraps a raw `axum::Router` (e.g. after applying a middleware layer
    /// that only some groups need) while preserving the tracked prefix.
    pub fn from_axum_router(prefix: String, router: Router<AppState>) -> Self {
        ControllerRouter { prefix, router }
    }
}

fn join_prefix(base: &str, relative: &str) -> String {
    let base = base.trim_end_matches('/');
    let relative = relative.trim_start_matches('/');
    format!("{base}/{relative}")
}
