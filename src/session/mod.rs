//! Session manager (C8): tracks live command/interactive sessions, each
//! bound to its own freshly-built executor, grounded in the teacher's
//! `server::manager::Manager`.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

use crate::engine::builder::{ContainerExecutorBuilder, ExecutorBuilder, LocalExecutorBuilder};
use crate::engine::docker::ContainerConfig;
use crate::engine::executor::Executor;
use crate::engine::local::LocalConfig;
use crate::engine::types::ExecuteOptions;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session '{0}' not found")]
    NotFound(String),
}

/// Which backend a session's executor runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutorType {
    Local,
    Docker,
}

impl Default for ExecutorType {
    fn default() -> Self {
        ExecutorType::Local
    }
}

/// The subset of `ExecuteOptions` that survives JSON: no stream fields,
/// since those have no wire representation. Converted into a real
/// `ExecuteOptions` before being handed to an `ExecutorBuilder`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SessionOptions {
    pub work_dir: Option<String>,
    pub env: HashMap<String, String>,
    pub tty: bool,
}

impl SessionOptions {
    fn into_execute_options(self) -> ExecuteOptions {
        ExecuteOptions {
            work_dir: self.work_dir,
            env: self.env,
            tty: self.tty,
            ..ExecuteOptions::new()
        }
    }
}

/// Parameters a caller supplies when opening a session (spec §6): which
/// backend to build, that backend's config, default per-request options,
/// and free-form metadata.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SessionRequest {
    pub label: Option<String>,
    pub executor_type: ExecutorType,
    pub docker_config: Option<ContainerConfig>,
    pub local_config: Option<LocalConfig>,
    pub options: Option<SessionOptions>,
    pub metadata: HashMap<String, String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Active,
    Closed,
}

/// A live session: an id, the executor it's bound to, and bookkeeping
/// timestamps used for idle-TTL reap (SPEC_FULL.md §11).
pub struct Session {
    pub id: String,
    pub label: Option<String>,
    pub executor: Arc<dyn Executor>,
    pub status: SessionStatus,
    pub created_at: DateTime<Utc>,
    pub last_accessed_at: DateTime<Utc>,
    pub metadata: HashMap<String, String>,
}

/// The wire-facing view of a `Session` (no `executor`, which isn't
/// serializable), returned by `create`/`list`/`get_info`.
#[derive(Debug, Clone, Serialize)]
pub struct SessionInfo {
    pub id: String,
    pub label: Option<String>,
    pub status: SessionStatus,
    pub created_at: DateTime<Utc>,
    pub last_accessed_at: DateTime<Utc>,
    pub metadata: HashMap<String, String>,
}

impl From<&Session> for SessionInfo {
    fn from(session: &Session) -> Self {
        Self {
            id: session.id.clone(),
            label: session.label.clone(),
            status: session.status,
            created_at: session.created_at,
            last_accessed_at: session.last_accessed_at,
            metadata: session.metadata.clone(),
        }
    }
}

/// Create/Get/List/Delete/Update over live sessions, backed by a
/// concurrent map the way `Manager::servers` is, since HTTP handlers on
/// different connections touch this concurrently. Each session gets its
/// own executor, built fresh from its `SessionRequest` rather than sharing
/// the server's default executor.
pub struct SessionManager {
    sessions: DashMap<String, Session>,
    idle_ttl: Option<Duration>,
    docker_socket: String,
}

impl SessionManager {
    pub fn new(idle_ttl: Option<Duration>, docker_socket: impl Into<String>) -> Arc<Self> {
        Arc::new(Self { sessions: DashMap::new(), idle_ttl, docker_socket: docker_socket.into() })
    }

    /// Build a fresh executor per `request.executor_type` and register a new
    /// session bound to it.
    pub async fn create(&self, request: SessionRequest) -> crate::engine::error::EngineResult<SessionInfo> {
        let options = request.options.map(SessionOptions::into_execute_options);

        let executor: Arc<dyn Executor> = match request.executor_type {
            ExecutorType::Local => {
                let config = request.local_config.unwrap_or_default();
                LocalExecutorBuilder::new().with_config(config).build(options).await?
            }
            ExecutorType::Docker => {
                let config = request.docker_config.unwrap_or_default();
                ContainerExecutorBuilder::new(config)
                    .with_socket(self.docker_socket.clone())
                    .build(options)
                    .await?
            }
        };

        let id = Uuid::new_v4().to_string();
        let now = Utc::now();
        let session = Session {
            id: id.clone(),
            label: request.label,
            executor,
            status: SessionStatus::Active,
            created_at: now,
            last_accessed_at: now,
            metadata: request.metadata,
        };
        let info = SessionInfo::from(&session);
        self.sessions.insert(id.clone(), session);
        info!(session_id = %id, "session created");
        Ok(info)
    }

    /// Fetch the executor for a session and touch its last-accessed time.
    pub fn get(&self, id: &str) -> Result<Arc<dyn Executor>, SessionError> {
        let mut entry = self.sessions.get_mut(id).ok_or_else(|| SessionError::NotFound(id.to_string()))?;
        entry.last_accessed_at = Utc::now();
        Ok(entry.executor.clone())
    }

    pub fn get_info(&self, id: &str) -> Result<SessionInfo, SessionError> {
        self.sessions.get(id).map(|e| SessionInfo::from(e.value())).ok_or_else(|| SessionError::NotFound(id.to_string()))
    }

    pub fn list(&self) -> Vec<SessionInfo> {
        self.sessions.iter().map(|e| SessionInfo::from(e.value())).collect()
    }

    pub async fn delete(&self, id: &str) -> Result<(), SessionError> {
        let (_, session) = self.sessions.remove(id).ok_or_else(|| SessionError::NotFound(id.to_string()))?;
        let _ = session.executor.close().await;
        info!(session_id = id, "session deleted");
        Ok(())
    }

    pub fn update_label(&self, id: &str, label: Option<String>) -> Result<(), SessionError> {
        let mut entry = self.sessions.get_mut(id).ok_or_else(|| SessionError::NotFound(id.to_string()))?;
        entry.label = label;
        Ok(())
    }

    pub fn count(&self) -> usize {
        self.sessions.len()
    }

    /// Background sweep: close and drop any session idle longer than the
    /// configured TTL. Intended to be driven by a periodic task from
    /// `cmd::root::run`, the way the teacher drives its own sync loop.
    pub async fn reap_idle(&self) {
        let Some(ttl) = self.idle_ttl else { return };
        let now = Utc::now();
        let expired: Vec<String> = self
            .sessions
            .iter()
            .filter(|e| {
                now.signed_duration_since(e.last_accessed_at)
                    .to_std()
                    .map(|d| d > ttl)
                    .unwrap_or(false)
            })
            .map(|e| e.key().clone())
            .collect();

        for id in expired {
            info!(session_id = %id, "reaping idle session");
            let _ = self.delete(&id).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn create_get_and_delete_round_trip() {
        let manager = SessionManager::new(None, "unix:///var/run/docker.sock");
        let info = manager.create(SessionRequest::default()).await.expect("creates");

        assert!(manager.get(&info.id).is_ok());
        assert_eq!(manager.count(), 1);

        manager.delete(&info.id).await.expect("deletes");
        assert!(manager.get(&info.id).is_err());
    }

    #[tokio::test]
    async fn get_unknown_session_errors() {
        let manager = SessionManager::new(None, "unix:///var/run/docker.sock");
        assert!(manager.get("missing").is_err());
    }
}
