//! HTTP/WS external adapter (C10), grounded in the teacher's `router::mod`
//! (`AppState` + `build_router`).

pub mod handlers;
pub mod websocket;

use std::sync::Arc;
use std::time::Duration;

use axum::routing::{delete, get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::engine::docker::ContainerExecutor;
use crate::engine::executor::Executor;
use crate::session::SessionManager;

/// Shared state every handler sees: the default executor exec/commands/help
/// routes run against, the container executor handle if the interactive WS
/// route needs one, the session manager, and the JWT secret gating the WS
/// handshake (spec §6's minimal bearer/JWT placeholder, not a new auth
/// subsystem — see SPEC_FULL.md §12).
pub struct AppState {
    pub executor: Arc<dyn Executor>,
    pub container_executor: Option<Arc<ContainerExecutor>>,
    pub sessions: Arc<SessionManager>,
    pub ws_jwt_secret: Option<String>,
}

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(handlers::health::health))
        .route("/exec", post(handlers::exec::exec))
        .route("/commands", get(handlers::commands::commands))
        .route("/help", get(handlers::commands::help))
        .route("/sessions", post(handlers::sessions::create_session).get(handlers::sessions::list_sessions))
        .route("/sessions/{id}", delete(handlers::sessions::delete_session))
        .route("/sessions/{id}/exec", post(handlers::sessions::session_exec))
        .route("/exec/interactive", get(websocket::interactive_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Periodic idle-session sweep, driven the way the teacher's
/// `cmd::root::run` drives its own periodic sync task with a
/// `CancellationToken`-gated `tokio::select!` loop.
pub async fn run_session_reaper(sessions: Arc<SessionManager>, interval: Duration, shutdown: tokio_util::sync::CancellationToken) {
    let mut ticker = tokio::time::interval(interval);
    loop {
        tokio::select! {
            _ = ticker.tick() => sessions.reap_idle().await,
            _ = shutdown.cancelled() => break,
        }
    }
}
