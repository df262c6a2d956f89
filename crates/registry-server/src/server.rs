use std::net::SocketAddr;
use std::time::Duration;

use anyhow::Context;
use axum::Router;
use tokio_util::sync::CancellationToken;

use crate::state::AppState;

/// Graceful shutdown deadline once cancellation is observed, matching the
/// original's 30-second budget for in-flight requests to finish.
const SHUTDOWN_DEADLINE: Duration = Duration::from_secs(30);

/// Owns the assembled router and the address to listen on. `run` binds,
/// serves, and tears down on cancellation.
pub struct Server {
    app: Router,
    addr: SocketAddr,
}

impl Server {
    pub fn new(app: Router<AppState>, state: AppState, addr: SocketAddr) -> Self {
        Server {
            app: app.with_state(state),
            addr,
        }
    }

    /// Binds the listener, serves until `cancel` fires, then waits up to
    /// `SHUTDOWN_DEADLINE` for in-flight requests to finish before
    /// returning. `http.ErrServerClosed`'s Rust equivalent — a clean
    /// shutdown — is not surfaced as an error.
    pub async fn run(self, cancel: CancellationToken) -> anyhow::Result<()> {
        let listener = tokio::net::TcpListener::bind(self.addr)
            .await
            .with_context(|| format!("binding registry facade listener on {}", self.addr))?;
        tracing::info!(addr = %self.addr, "registry facade listening");

        let shutdown_signal = cancel.clone();
        let serve = axum::serve(listener, self.app.into_make_service()).with_graceful_shutdown(async move {
            shutdown_signal.cancelled().await;
            tracing::info!("shutdown requested, draining in-flight requests");
        });

        let handle = tokio::spawn(serve);
        cancel.cancelled().await;

        match tokio::time::timeout(SHUTDOWN_DEADLINE, handle).await {
            Ok(Ok(Ok(()))) => Ok(()),
            Ok(Ok(Err(err))) => Err(err).context("registry facade server error"),
            Ok(Err(join_err)) => Err(anyhow::anyhow!("registry facade server task failed: {join_err}")),
            Err(_) => {
                tracing::warn!("graceful shutdown deadline elapsed, giving up on the drain");
                Ok(())
            }
        }
    }
}
