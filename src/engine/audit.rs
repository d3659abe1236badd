//! Audited decorator (C6): wraps any executor and emits an event per call.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::io::AsyncWriteExt;
use tokio::sync::{broadcast, Mutex};
use tracing::warn;
use uuid::Uuid;

use super::builtin::BuiltinInfo;
use super::error::EngineResult;
use super::executor::Executor;
use super::types::ExecuteContext;
use super::types::ExecuteResult;

/// Where an `AuditEvent` sits in a call's lifecycle. A `Started` event is
/// emitted before the inner executor runs; a `Completed`/`Failed` event
/// follows after, sharing the same `id` so the two can be correlated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditStatus {
    Started,
    Completed,
    Failed,
}

/// One audit record per lifecycle point of an `execute` call: a `Started`
/// event before dispatch, then a `Completed` or `Failed` event after.
#[derive(Debug, Clone, Serialize)]
pub struct AuditEvent {
    pub id: String,
    pub status: AuditStatus,
    pub executor_name: String,
    pub command_name: String,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub exit_code: Option<i32>,
    pub error: Option<String>,
}

/// Anything that can receive audit events. Separated from the concrete
/// sink so callers can plug in their own (a metrics pipe, a remote log
/// collector) without touching the decorator.
#[async_trait::async_trait]
pub trait AuditSink: Send + Sync {
    async fn record(&self, event: AuditEvent);
}

/// Fans audit events out over a broadcast channel (subscribers can tail
/// live) and appends them as JSON lines to a file, the same pub/sub + sink
/// shape as the teacher's `system::sink::SinkPool`.
pub struct FileAuditSink {
    tx: broadcast::Sender<AuditEvent>,
    file: Mutex<Option<tokio::fs::File>>,
}

impl FileAuditSink {
    pub async fn new(path: Option<PathBuf>) -> EngineResult<Arc<Self>> {
        let (tx, rx) = broadcast::channel(1024);
        // Keep one receiver alive so the channel doesn't close for lack of
        // subscribers, matching `EventBus`'s self-subscribing `_receiver`.
        std::mem::forget(rx);

        let file = match path {
            Some(path) => Some(
                tokio::fs::OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(path)
                    .await?,
            ),
            None => None,
        };

        Ok(Arc::new(Self { tx, file: Mutex::new(file) }))
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AuditEvent> {
        self.tx.subscribe()
    }
}

#[async_trait::async_trait]
impl AuditSink for FileAuditSink {
    async fn record(&self, event: AuditEvent) {
        let _ = self.tx.send(event.clone());

        let mut guard = self.file.lock().await;
        if let Some(file) = guard.as_mut() {
            match serde_json::to_string(&event) {
                Ok(mut line) => {
                    line.push('\n');
                    if let Err(err) = file.write_all(line.as_bytes()).await {
                        warn!(error = %err, "failed writing audit event");
                    }
                }
                Err(err) => warn!(error = %err, "failed serializing audit event"),
            }
        }
    }
}

/// Decorator: runs every `execute` through `inner`, then records an
/// `AuditEvent` regardless of outcome.
pub struct AuditedExecutor {
    inner: Arc<dyn Executor>,
    sink: Arc<dyn AuditSink>,
}

impl AuditedExecutor {
    pub fn new(inner: Arc<dyn Executor>, sink: Arc<dyn AuditSink>) -> Arc<Self> {
        Arc::new(Self { inner, sink })
    }
}

#[async_trait::async_trait]
impl Executor for AuditedExecutor {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn execute(&self, ctx: ExecuteContext) -> EngineResult<ExecuteResult> {
        let id = Uuid::new_v4().to_string();
        let executor_name = self.inner.name().to_string();
        let command_name = ctx.command.name().to_string();
        let start_time = ctx.start_time;

        self.sink
            .record(AuditEvent {
                id: id.clone(),
                status: AuditStatus::Started,
                executor_name: executor_name.clone(),
                command_name: command_name.clone(),
                start_time,
                end_time: None,
                exit_code: None,
                error: None,
            })
            .await;

        let result = self.inner.execute(ctx).await;

        let event = match &result {
            Ok(res) => AuditEvent {
                id,
                status: if res.exit_code == 0 { AuditStatus::Completed } else { AuditStatus::Failed },
                executor_name,
                command_name,
                start_time,
                end_time: Some(res.end_time),
                exit_code: Some(res.exit_code),
                error: res.error.clone(),
            },
            Err(err) => AuditEvent {
                id,
                status: AuditStatus::Failed,
                executor_name,
                command_name,
                start_time,
                end_time: Some(Utc::now()),
                exit_code: None,
                error: Some(err.to_string()),
            },
        };
        self.sink.record(event).await;

        result
    }

    async fn execute_command(&self, ctx: ExecuteContext) -> EngineResult<ExecuteResult> {
        self.inner.execute_command(ctx).await
    }

    fn list_commands(&self) -> Vec<BuiltinInfo> {
        self.inner.list_commands()
    }

    fn register_command(&self, info: BuiltinInfo, handler: super::builtin::BuiltinHandlerFn) -> EngineResult<()> {
        self.inner.register_command(info, handler)
    }

    fn unregister_command(&self, name: &str) {
        self.inner.unregister_command(name);
    }

    async fn close(&self) -> EngineResult<()> {
        self.inner.close().await
    }
}
