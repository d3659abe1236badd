//! Executor builder (C9): assembles a fully wired executor (decorators
//! included) from configuration, mirroring the teacher's fondness for
//! small purpose-built builders over one do-everything constructor.

use std::path::PathBuf;
use std::sync::Arc;

use bollard::Docker;

use super::audit::{AuditedExecutor, FileAuditSink};
use super::docker::{ContainerConfig, ContainerExecutor};
use super::error::{EngineError, EngineResult};
use super::executor::Executor;
use super::local::{LocalConfig, LocalExecutor};
use super::types::ExecuteOptions;

/// Anything that can produce a ready-to-use `Executor`. `options`, when
/// given, seeds the built executor's defaults (working directory, env) from
/// a per-request `ExecuteOptions` rather than only from static config —
/// what lets a session built through this trait carry its own defaults
/// instead of always inheriting the process-wide configuration (§4.9).
#[async_trait::async_trait]
pub trait ExecutorBuilder {
    async fn build(self, options: Option<ExecuteOptions>) -> EngineResult<Arc<dyn Executor>>;
}

/// Builds a `LocalExecutor`, optionally wrapped in the audited decorator.
pub struct LocalExecutorBuilder {
    config: LocalConfig,
    audit_sink_path: Option<PathBuf>,
}

impl LocalExecutorBuilder {
    pub fn new() -> Self {
        Self { config: LocalConfig::default(), audit_sink_path: None }
    }

    pub fn with_config(mut self, config: LocalConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_audit_log(mut self, path: PathBuf) -> Self {
        self.audit_sink_path = Some(path);
        self
    }
}

impl Default for LocalExecutorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl ExecutorBuilder for LocalExecutorBuilder {
    async fn build(self, options: Option<ExecuteOptions>) -> EngineResult<Arc<dyn Executor>> {
        let mut config = self.config;
        if let Some(options) = options {
            if options.work_dir.is_some() {
                config.default_work_dir = options.work_dir;
            }
            for (k, v) in options.env {
                config.default_env.insert(k, v);
            }
        }
        let base: Arc<dyn Executor> = LocalExecutor::new(config);
        match self.audit_sink_path {
            Some(path) => {
                let sink = FileAuditSink::new(Some(path)).await?;
                Ok(AuditedExecutor::new(base, sink))
            }
            None => Ok(base),
        }
    }
}

/// Builds a `ContainerExecutor` from a Docker connection and container
/// config, optionally wrapped in the audited decorator.
pub struct ContainerExecutorBuilder {
    config: ContainerConfig,
    docker_socket: Option<String>,
    audit_sink_path: Option<PathBuf>,
}

impl ContainerExecutorBuilder {
    pub fn new(config: ContainerConfig) -> Self {
        Self { config, docker_socket: None, audit_sink_path: None }
    }

    pub fn with_socket(mut self, socket: impl Into<String>) -> Self {
        self.docker_socket = Some(socket.into());
        self
    }

    pub fn with_audit_log(mut self, path: PathBuf) -> Self {
        self.audit_sink_path = Some(path);
        self
    }

    fn connect(&self) -> EngineResult<Docker> {
        let docker = match &self.docker_socket {
            Some(socket) => Docker::connect_with_socket(socket, 120, bollard::API_DEFAULT_VERSION),
            None => Docker::connect_with_local_defaults(),
        };
        docker.map_err(|err| EngineError::RuntimeSetup(format!("failed to connect to docker: {err}")))
    }
}

#[async_trait::async_trait]
impl ExecutorBuilder for ContainerExecutorBuilder {
    async fn build(self, options: Option<ExecuteOptions>) -> EngineResult<Arc<dyn Executor>> {
        let docker = self.connect()?;
        let mut config = self.config;
        if let Some(options) = options {
            if options.work_dir.is_some() {
                config.work_dir = options.work_dir;
            }
            for (k, v) in options.env {
                config.env.insert(k, v);
            }
        }
        let base: Arc<dyn Executor> = ContainerExecutor::new(docker, config)?;
        match self.audit_sink_path {
            Some(path) => {
                let sink = FileAuditSink::new(Some(path)).await?;
                Ok(AuditedExecutor::new(base, sink))
            }
            None => Ok(base),
        }
    }
}

/// Wraps an already-built executor with the audited decorator — the
/// function-builder variant for callers assembling a pipeline or a
/// caller-supplied executor that isn't built from scratch here.
pub struct AuditBuilder {
    inner: Arc<dyn Executor>,
    sink_path: Option<PathBuf>,
}

impl AuditBuilder {
    pub fn new(inner: Arc<dyn Executor>) -> Self {
        Self { inner, sink_path: None }
    }

    pub fn with_log_path(mut self, path: PathBuf) -> Self {
        self.sink_path = Some(path);
        self
    }
}

#[async_trait::async_trait]
impl ExecutorBuilder for AuditBuilder {
    /// `options` doesn't apply here: this builder wraps an executor that's
    /// already fully constructed, so there's nothing left to seed defaults
    /// into.
    async fn build(self, _options: Option<ExecuteOptions>) -> EngineResult<Arc<dyn Executor>> {
        let sink = FileAuditSink::new(self.sink_path).await?;
        Ok(AuditedExecutor::new(self.inner, sink))
    }
}
