//! POST /exec

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;

use crate::engine::{Command, ExecuteContext, ExecuteOptions, ExecuteResult};
use crate::server::AppState;

use super::ApiError;

#[derive(Debug, Deserialize)]
pub struct ExecRequest {
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    pub work_dir: Option<String>,
    #[serde(default)]
    pub env: HashMap<String, String>,
}

pub async fn exec(State(state): State<Arc<AppState>>, Json(request): Json<ExecRequest>) -> Result<Json<ExecuteResult>, ApiError> {
    let mut options = ExecuteOptions::new();
    options.work_dir = request.work_dir;
    options.env = request.env;

    let ctx = ExecuteContext::new(Command::new(request.command, request.args), options, CancellationToken::new());
    let result = state.executor.execute(ctx).await?;
    Ok(Json(result))
}
