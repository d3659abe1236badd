//! GET /commands and GET /help

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::engine::builtin::BuiltinInfo;
use crate::server::AppState;

pub async fn commands(State(state): State<Arc<AppState>>) -> Json<Vec<BuiltinInfo>> {
    Json(state.executor.list_commands())
}

#[derive(Debug, Serialize)]
pub struct HelpResponse {
    pub service: &'static str,
    pub version: &'static str,
    pub commands: Vec<BuiltinInfo>,
}

pub async fn help(State(state): State<Arc<AppState>>) -> Json<HelpResponse> {
    Json(HelpResponse {
        service: "runshell",
        version: env!("CARGO_PKG_VERSION"),
        commands: state.executor.list_commands(),
    })
}
