//! Router assembly
//!
//! ```text
//! GET /         ─┐
//! GET /healthz  ─┤
//! GET /status   ─┼──▶ auth gate ──▶ CORS
//! GET /render   ─┘
//! ```

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::FromRef;
use axum::middleware;
use axum::routing::get;
use axum::Router;
use tracing::info;

use crate::browser::RenderEngine;
use crate::cors::cors_layer;
use crate::error::Result;
use crate::handlers::{health_handler, render_handler, root_handler, status_handler, AppState};
use crate::render::RetryOrchestrator;
use crate::security::{require_token, AuthConfig};

/// Everything the handlers share
pub struct ServerState<E> {
    /// Render pipeline
    pub orchestrator: Arc<RetryOrchestrator<E>>,
    /// Counters behind `/status`
    pub stats: Arc<AppState>,
    /// Bearer gate settings
    pub auth: AuthConfig,
}

impl<E> ServerState<E> {
    /// State with fresh counters
    pub fn new(orchestrator: RetryOrchestrator<E>, auth: AuthConfig) -> Self {
        Self {
            orchestrator: Arc::new(orchestrator),
            stats: Arc::new(AppState::new()),
            auth,
        }
    }
}

impl<E> Clone for ServerState<E> {
    fn clone(&self) -> Self {
        Self {
            orchestrator: Arc::clone(&self.orchestrator),
            stats: Arc::clone(&self.stats),
            auth: self.auth.clone(),
        }
    }
}

impl<E> FromRef<ServerState<E>> for Arc<RetryOrchestrator<E>> {
    fn from_ref(state: &ServerState<E>) -> Self {
        Arc::clone(&state.orchestrator)
    }
}

impl<E> FromRef<ServerState<E>> for Arc<AppState> {
    fn from_ref(state: &ServerState<E>) -> Self {
        Arc::clone(&state.stats)
    }
}

impl<E> FromRef<ServerState<E>> for AuthConfig {
    fn from_ref(state: &ServerState<E>) -> Self {
        state.auth.clone()
    }
}

/// Build the service router
pub fn app<E>(state: ServerState<E>) -> Router
where
    E: RenderEngine + 'static,
{
    Router::new()
        .route("/", get(root_handler))
        .route("/healthz", get(health_handler))
        .route("/status", get(status_handler))
        .route("/render", get(render_handler::<E>))
        .layer(middleware::from_fn_with_state(
            state.auth.clone(),
            require_token,
        ))
        .layer(cors_layer())
        .with_state(state)
}

/// Bind `addr` and serve [`app`] until `shutdown` resolves
pub async fn serve<E, F>(addr: SocketAddr, state: ServerState<E>, shutdown: F) -> Result<()>
where
    E: RenderEngine + 'static,
    F: Future<Output = ()> + Send + 'static,
{
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("render-api listening on {}", listener.local_addr()?);

    axum::serve(listener, app(state).into_make_service())
        .with_graceful_shutdown(shutdown)
        .await?;

    info!("render-api stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::BrowserController;
    use crate::Error;

    fn state() -> ServerState<BrowserController> {
        ServerState::new(
            RetryOrchestrator::new(BrowserController::default()),
            AuthConfig::new(None),
        )
    }

    #[tokio::test]
    async fn test_serve_stops_on_shutdown() {
        let addr: SocketAddr = "127.0.0.1:0".parse().unwrap();
        assert!(serve(addr, state(), async {}).await.is_ok());
    }

    #[tokio::test]
    async fn test_serve_reports_bind_failure() {
        let taken = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = taken.local_addr().unwrap();

        let result = serve(addr, state(), async {}).await;
        assert!(matches!(result, Err(Error::Io(_))));
    }
}
