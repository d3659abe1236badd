//! Container-backed executor (C4) — "the heart of the system": owns a
//! single long-lived container and runs commands inside it via `docker
//! exec`.

use std::sync::Arc;

use bollard::Docker;
use tokio::sync::Mutex;
use tracing::info;
use uuid::Uuid;

use super::config::ContainerConfig;
use super::stats::ContainerStats;
use super::{exec, lifecycle, stats};
use crate::engine::builtin::{BuiltinInfo, BuiltinRegistry};
use crate::engine::error::{EngineError, EngineResult};
use crate::engine::executor::Executor;
use crate::engine::pipeline;
use crate::engine::types::{ExecuteContext, ExecuteResult};

/// The container lifecycle state machine from §4.4.1: none of a container
/// exists yet, one is being created, one is running, or one has been torn
/// down (terminal — a `ContainerExecutor` does not resurrect itself).
#[derive(Debug, Clone)]
enum ContainerState {
    None,
    Creating,
    Running(String),
    Removed,
}

pub struct ContainerExecutor {
    docker: Docker,
    config: ContainerConfig,
    container_name: String,
    state: Mutex<ContainerState>,
    registry: BuiltinRegistry,
}

impl ContainerExecutor {
    pub fn new(docker: Docker, config: ContainerConfig) -> EngineResult<Arc<Self>> {
        let container_name = format!("{}-{}", config.name_prefix, Uuid::new_v4());
        Ok(Arc::new(Self {
            docker,
            config,
            container_name,
            state: Mutex::new(ContainerState::None),
            registry: BuiltinRegistry::new(),
        }))
    }

    /// Guarantee a running container exists, creating one on first use and
    /// reusing it afterward (§4.4.1). Guarded by `state`'s mutex so
    /// concurrent callers don't race each other into creating two
    /// containers for the same executor.
    async fn ensure_container(&self) -> EngineResult<String> {
        let mut guard = self.state.lock().await;
        match &*guard {
            ContainerState::Running(id) => return Ok(id.clone()),
            ContainerState::Removed => {
                return Err(EngineError::NotPermitted(
                    "container executor has been closed".to_string(),
                ))
            }
            ContainerState::None | ContainerState::Creating => {}
        }

        *guard = ContainerState::Creating;
        // Fall back to `None` (not `Removed`) if creation fails, so a later
        // call can retry instead of being permanently locked out.
        let mut guard = scopeguard::guard(guard, |mut guard| {
            if matches!(*guard, ContainerState::Creating) {
                *guard = ContainerState::None;
            }
        });
        let id = lifecycle::create_container(&self.docker, &self.config, &self.container_name).await?;
        **guard = ContainerState::Running(id.clone());
        Ok(id)
    }

    /// Public entry point for callers (the interactive WS bridge) that need
    /// a running container id without going through `execute`.
    pub async fn ensure_running(&self) -> EngineResult<String> {
        self.ensure_container().await
    }

    pub fn docker_handle(&self) -> Docker {
        self.docker.clone()
    }

    /// Surface CPU/memory/network figures for the owned container
    /// (SPEC_FULL.md §11, grounded in the teacher's
    /// `docker::service::get_container_stats`). Library-only: no HTTP route
    /// exposes this.
    pub async fn stats(&self) -> EngineResult<ContainerStats> {
        let guard = self.state.lock().await;
        let id = match &*guard {
            ContainerState::Running(id) => id.clone(),
            _ => return Err(EngineError::NotFound("container is not running".to_string())),
        };
        drop(guard);
        stats::collect(&self.docker, &id).await
    }

    /// Guarantee the container is running, then exec `ctx.command` in it
    /// unconditionally. Shared by `execute`'s fallthrough and
    /// `execute_command`'s registry bypass.
    async fn run_os(&self, ctx: &mut ExecuteContext) -> EngineResult<ExecuteResult> {
        let container_id = self.ensure_container().await?;
        exec::run(&self.docker, &self.config, &container_id, ctx).await
    }
}

#[async_trait::async_trait]
impl Executor for ContainerExecutor {
    fn name(&self) -> &str {
        "container"
    }

    async fn execute(&self, mut ctx: ExecuteContext) -> EngineResult<ExecuteResult> {
        if ctx.is_piped || ctx.pipe_context.is_some() {
            return pipeline::execute_on(self, ctx).await;
        }

        if self.config.use_builtin_commands {
            if let Some(handler) = self.registry.get(ctx.command.name()) {
                return handler(ctx.copy()).await;
            }
        }

        self.run_os(&mut ctx).await
    }

    /// Bypasses the builtin registry entirely: always execs `ctx.command`
    /// inside the container, even if its name collides with a registered
    /// builtin. Builtins that delegate to themselves must call this, not
    /// `execute`.
    async fn execute_command(&self, mut ctx: ExecuteContext) -> EngineResult<ExecuteResult> {
        self.run_os(&mut ctx).await
    }

    fn list_commands(&self) -> Vec<BuiltinInfo> {
        self.registry.list()
    }

    fn register_command(&self, info: BuiltinInfo, handler: crate::engine::builtin::BuiltinHandlerFn) -> EngineResult<()> {
        self.registry.register(info, handler)
    }

    fn unregister_command(&self, name: &str) {
        self.registry.unregister(name);
    }

    async fn close(&self) -> EngineResult<()> {
        let mut guard = self.state.lock().await;
        match &*guard {
            ContainerState::Running(id) => {
                let id = id.clone();
                lifecycle::destroy_container(&self.docker, &id).await?;
                info!(container_name = %self.container_name, "executor closed");
                *guard = ContainerState::Removed;
                Ok(())
            }
            ContainerState::Removed => Ok(()),
            ContainerState::None | ContainerState::Creating => {
                *guard = ContainerState::Removed;
                Ok(())
            }
        }
    }
}

impl ContainerExecutor {
    /// Mirrors `LocalExecutor::execute_via_arc`: wires the back-reference so
    /// builtins registered on a container executor can delegate into it.
    pub async fn execute_via_arc(self: &Arc<Self>, mut ctx: ExecuteContext) -> EngineResult<ExecuteResult> {
        ctx.executor_back_reference = Some(self.clone() as Arc<dyn Executor>);
        self.execute(ctx).await
    }
}
