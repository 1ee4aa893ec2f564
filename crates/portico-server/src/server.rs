//! Portal server lifecycle.

use crate::error::ServerError;
use crate::routes;
use crate::state::AppState;
use portico_core::PorticoConfig;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

/// The portal HTTP server.
pub struct PorticoServer {
    config: PorticoConfig,
}

impl PorticoServer {
    /// Create a new server with the given configuration.
    pub fn new(config: PorticoConfig) -> Self {
        Self { config }
    }

    /// Initialize state, bind, and serve until interrupted.
    ///
    /// Runs a background interval task that sweeps expired sessions, and
    /// drains the audit queue before returning so shutdown does not lose
    /// enqueued records.
    pub async fn run(&self) -> Result<(), ServerError> {
        let state = AppState::init(self.config.clone())
            .await
            .map_err(ServerError::Internal)?;

        let addr = self.config.server.listen_addr.clone();
        let app = routes::create_router(state.clone());

        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| ServerError::StartupFailed(format!("bind {addr}: {e}")))?;
        tracing::info!(address = %addr, "portal listening");

        let sweeper = tokio::spawn(sweep_sessions(state.clone()));

        let served = axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown_signal())
        .await;

        sweeper.abort();
        state.recorder.flush().await;
        tracing::info!("audit queue drained, shutting down");

        served.map_err(|e| ServerError::StartupFailed(e.to_string()))
    }

    /// The configured listen address.
    pub fn listen_addr(&self) -> &str {
        &self.config.server.listen_addr
    }
}

/// Periodically drop sessions whose refresh window has passed. Failures
/// are logged and the loop keeps going; the sweep is an optimization, not
/// a correctness requirement, since expired sessions read as absent.
async fn sweep_sessions(state: Arc<AppState>) {
    let period = Duration::from_secs(state.config.auth.sweep_interval_minutes.max(1) * 60);
    let mut ticker = tokio::time::interval(period);
    // The first tick completes immediately; consume it so the initial
    // sweep happens one full period after startup.
    ticker.tick().await;

    loop {
        ticker.tick().await;
        match state.accounts.sweep_expired_sessions().await {
            Ok(0) => {}
            Ok(removed) => tracing::debug!(removed, "swept expired sessions"),
            Err(err) => tracing::warn!(error = %err, "session sweep failed"),
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %err, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                tracing::warn!(error = %err, "failed to install terminate handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("shutdown signal received");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_reports_configured_address() {
        let config = PorticoConfig::default();
        let server = PorticoServer::new(config);
        assert_eq!(server.listen_addr(), "0.0.0.0:8080");
    }
}
