//! POST/GET /sessions, POST /sessions/{id}/exec, DELETE /sessions/{id}

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::engine::{Command, ExecuteContext, ExecuteOptions, ExecuteResult};
use crate::server::AppState;
use crate::session::{SessionInfo, SessionRequest};

use super::ApiError;

/// The request body is `SessionRequest` itself (label, executor_type,
/// docker_config/local_config, options, metadata) — there's no narrower DTO
/// to wrap it in, since every field the session manager needs comes
/// straight off the wire.
pub type CreateSessionRequest = SessionRequest;

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub session: SessionInfo,
}

pub async fn create_session(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CreateSessionRequest>,
) -> Result<Json<SessionResponse>, ApiError> {
    let session = state.sessions.create(request).await?;
    Ok(Json(SessionResponse { session }))
}

pub async fn list_sessions(State(state): State<Arc<AppState>>) -> Json<Vec<SessionInfo>> {
    Json(state.sessions.list())
}

pub async fn delete_session(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> Result<(), ApiError> {
    state.sessions.delete(&id).await?;
    Ok(())
}

#[derive(Debug, Deserialize)]
pub struct SessionExecRequest {
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    pub work_dir: Option<String>,
    #[serde(default)]
    pub env: HashMap<String, String>,
}

pub async fn session_exec(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(request): Json<SessionExecRequest>,
) -> Result<Json<ExecuteResult>, ApiError> {
    let executor = state.sessions.get(&id)?;

    let mut options = ExecuteOptions::new();
    options.work_dir = request.work_dir;
    options.env = request.env;

    let ctx = ExecuteContext::new(Command::new(request.command, request.args), options, CancellationToken::new());
    let result = executor.execute(ctx).await?;
    Ok(Json(result))
}
