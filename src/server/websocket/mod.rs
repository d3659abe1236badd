//! WS /exec/interactive, grounded in the teacher's
//! `router::websocket::handler`'s upgrade + select-loop shape.

pub mod auth;

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use tracing::{info, warn};

use crate::engine::interactive::{self, InteractiveBridge};
use crate::engine::types::InteractiveOptions;
use crate::server::AppState;

#[derive(Debug, Deserialize)]
pub struct WsAuthQuery {
    pub token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WsInit {
    command: String,
    #[serde(default)]
    args: Vec<String>,
    work_dir: Option<String>,
    #[serde(default)]
    terminal_type: Option<String>,
    #[serde(default)]
    rows: Option<u16>,
    #[serde(default)]
    cols: Option<u16>,
}

pub async fn interactive_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    Query(query): Query<WsAuthQuery>,
) -> Response {
    if let Some(secret) = state.ws_jwt_secret.as_ref() {
        let authorized = query
            .token
            .as_deref()
            .and_then(|token| auth::validate_websocket_token(token, secret.as_bytes()).ok())
            .map(|claims| claims.has_permission("exec.interactive"))
            .unwrap_or(false);

        if !authorized {
            return axum::http::StatusCode::UNAUTHORIZED.into_response();
        }
    }

    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(mut socket: WebSocket, state: Arc<AppState>) {
    let init = match socket.recv().await {
        Some(Ok(Message::Text(text))) => match serde_json::from_str::<WsInit>(&text) {
            Ok(init) => init,
            Err(err) => {
                let _ = socket.send(Message::Text(format!("{{\"error\":\"invalid init message: {err}\"}}"))).await;
                return;
            }
        },
        _ => return,
    };

    let shell_line = crate::engine::types::Command::new(init.command, init.args).to_shell_line();
    let options = InteractiveOptions {
        terminal_type: init.terminal_type.unwrap_or_else(|| "xterm-256color".to_string()),
        rows: init.rows.unwrap_or(24),
        cols: init.cols.unwrap_or(80),
        raw: true,
    };

    let bridge = if let Some(container) = state.container_executor.as_ref() {
        let container_id = match container.ensure_running().await {
            Ok(id) => id,
            Err(err) => {
                let _ = socket.send(Message::Text(format!("{{\"error\":\"{err}\"}}"))).await;
                return;
            }
        };
        interactive::spawn_container(container.docker_handle(), container_id, shell_line, &options).await
    } else {
        interactive::spawn_local(&shell_line, init.work_dir.as_deref(), &options)
    };

    let mut bridge: InteractiveBridge = match bridge {
        Ok(bridge) => bridge,
        Err(err) => {
            let _ = socket.send(Message::Text(format!("{{\"error\":\"{err}\"}}"))).await;
            return;
        }
    };

    info!("interactive session started");

    let mut output_log: Vec<u8> = Vec::new();
    let mut final_exit_code: Option<i32> = None;

    loop {
        tokio::select! {
            incoming = socket.recv() => {
                match incoming {
                    Some(Ok(Message::Text(text))) => {
                        let mut bytes = text.into_bytes();
                        if !bytes.ends_with(b"\n") {
                            bytes.push(b'\n');
                        }
                        if bridge.input_tx.send(bytes).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Binary(data))) => {
                        let mut bytes = data;
                        if !bytes.ends_with(b"\n") {
                            bytes.push(b'\n');
                        }
                        if bridge.input_tx.send(bytes).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(err)) => {
                        warn!(error = %err, "interactive websocket receive error");
                        break;
                    }
                    _ => {}
                }
            }
            outgoing = bridge.output_rx.recv() => {
                match outgoing {
                    Some(bytes) => {
                        output_log.extend_from_slice(&bytes);
                        if socket.send(Message::Binary(bytes)).await.is_err() {
                            break;
                        }
                    }
                    None => break,
                }
            }
            exit = &mut bridge.exit_rx => {
                final_exit_code = exit.ok();
                break;
            }
        }
    }

    if final_exit_code.is_none() {
        final_exit_code = bridge.exit_rx.try_recv().ok();
    }

    let final_frame = serde_json::json!({
        "exit_code": final_exit_code.unwrap_or(1),
        "output": String::from_utf8_lossy(&output_log),
    });
    let _ = socket.send(Message::Text(final_frame.to_string())).await;

    info!("interactive session ended");
}
