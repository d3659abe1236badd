//! Local process executor (C3): runs commands as host child processes.

use std::process::Stdio;
use std::sync::Arc;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::Command as TokioCommand;
use tracing::{debug, warn};

use super::builtin::{pwd_handler, readfile_handler, BuiltinInfo, BuiltinRegistry};
use super::error::{EngineError, EngineResult};
use super::executor::Executor;
use super::pipeline;
use super::types::{ExecuteContext, ExecuteResult, EXIT_CODE_INTERNAL, EXIT_CODE_NOT_FOUND};

/// Tunables for the local executor, loaded from configuration or a
/// session's `local_config` request field.
#[derive(Debug, Clone, serde::Deserialize)]
#[serde(default)]
pub struct LocalConfig {
    pub default_work_dir: Option<String>,
    pub default_env: std::collections::HashMap<String, String>,
    pub allow_unregistered: bool,
    pub output_cap_bytes: usize,
}

impl Default for LocalConfig {
    fn default() -> Self {
        Self {
            default_work_dir: None,
            default_env: std::collections::HashMap::new(),
            allow_unregistered: true,
            output_cap_bytes: 10 * 1024 * 1024,
        }
    }
}

/// Runs commands directly on the host: builtins first, then the host PATH
/// via `/bin/sh -c` (so redirection and globbing a caller embeds in a
/// single argument still work, matching the container executor's own shell
/// delegation in spirit).
pub struct LocalExecutor {
    config: LocalConfig,
    registry: BuiltinRegistry,
}

impl LocalExecutor {
    pub fn new(config: LocalConfig) -> Arc<Self> {
        let registry = BuiltinRegistry::new();
        let _ = registry.register(BuiltinInfo::new("pwd", "print the working directory"), pwd_handler());
        let _ = registry.register(
            BuiltinInfo::new("readfile", "print a file's contents (delegates to cat)"),
            readfile_handler(),
        );
        Arc::new(Self { config, registry })
    }

    /// Truncate captured output at the configured cap, appending the
    /// marker SPEC_FULL.md §11 specifies.
    fn cap_output(&self, mut bytes: Vec<u8>) -> String {
        if bytes.len() > self.config.output_cap_bytes {
            let dropped = bytes.len() - self.config.output_cap_bytes;
            bytes.truncate(self.config.output_cap_bytes);
            let mut out = String::from_utf8_lossy(&bytes).into_owned();
            out.push_str(&format!("\n... [output truncated, {dropped} bytes dropped]\n"));
            out
        } else {
            String::from_utf8_lossy(&bytes).into_owned()
        }
    }

    /// Builtin lookup first, OS process otherwise — the path `execute` takes.
    async fn run_single(&self, ctx: &mut ExecuteContext) -> EngineResult<ExecuteResult> {
        if let Some(handler) = self.registry.get(ctx.command.name()) {
            debug!(command = ctx.command.name(), "dispatching builtin");
            return handler(ctx.copy()).await;
        }

        if !self.config.allow_unregistered {
            return Err(EngineError::NotFound(format!(
                "command '{}' is not registered",
                ctx.command.name()
            )));
        }

        self.run_os(ctx).await
    }

    /// Spawn `ctx.command` as a host child process unconditionally, skipping
    /// the builtin registry. This is the method `execute_command` calls.
    async fn run_os(&self, ctx: &mut ExecuteContext) -> EngineResult<ExecuteResult> {
        let work_dir = ctx
            .options
            .work_dir
            .clone()
            .or_else(|| self.config.default_work_dir.clone())
            .unwrap_or_else(|| ".".to_string());

        let shell_line = ctx.command.to_shell_line();
        let mut cmd = TokioCommand::new("/bin/sh");
        cmd.arg("-c").arg(&shell_line).current_dir(&work_dir);
        for (k, v) in &self.config.default_env {
            cmd.env(k, v);
        }
        for (k, v) in &ctx.options.env {
            cmd.env(k, v);
        }
        cmd.stdin(Stdio::piped());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(err) => {
                warn!(error = %err, command = %shell_line, "failed to spawn local command");
                return Ok(ExecuteResult::failed(
                    ctx.command.name(),
                    EXIT_CODE_NOT_FOUND,
                    ctx.start_time,
                    String::new(),
                    Some(err.to_string()),
                ));
            }
        };

        let mut stdout = child.stdout.take().expect("piped stdout");
        let mut stderr = child.stderr.take().expect("piped stderr");
        let mut stdin = child.stdin.take().expect("piped stdin");

        if let Some(mut reader) = ctx.options.stdin.take() {
            tokio::spawn(async move {
                let mut buf = Vec::new();
                if tokio::io::AsyncReadExt::read_to_end(&mut reader, &mut buf).await.is_ok() {
                    let _ = stdin.write_all(&buf).await;
                }
            });
        } else {
            drop(stdin);
        }

        let stdout_task = tokio::spawn(async move {
            let mut buf = Vec::new();
            let _ = stdout.read_to_end(&mut buf).await;
            buf
        });
        let stderr_task = tokio::spawn(async move {
            let mut buf = Vec::new();
            let _ = stderr.read_to_end(&mut buf).await;
            buf
        });

        let status = tokio::select! {
            status = child.wait() => status,
            _ = ctx.cancel_scope.cancelled() => {
                let _ = child.start_kill();
                let _ = child.wait().await;
                return Err(EngineError::Cancelled);
            }
        };

        let mut out = stdout_task.await.unwrap_or_default();
        let err_bytes = stderr_task.await.unwrap_or_default();
        out.extend_from_slice(&err_bytes);

        // Tee to the caller's stream uncapped, independent of the capped
        // buffer we keep for `ExecuteResult::output` (SPEC_FULL.md §11).
        if let Some(writer) = ctx.options.stdout.as_mut() {
            let _ = writer.write_all(&out).await;
        }

        let output = self.cap_output(out);

        match status {
            Ok(status) => {
                let code = status.code().unwrap_or(EXIT_CODE_INTERNAL);
                if code == 0 {
                    Ok(ExecuteResult::success(ctx.command.name(), ctx.start_time, output))
                } else {
                    let error = if code == EXIT_CODE_NOT_FOUND {
                        Some(format!("command not found: {}", ctx.command.name()))
                    } else {
                        Some(format!("command exited with code {code}"))
                    };
                    Ok(ExecuteResult::failed(ctx.command.name(), code, ctx.start_time, output, error))
                }
            }
            Err(err) => Ok(ExecuteResult::failed(
                ctx.command.name(),
                EXIT_CODE_INTERNAL,
                ctx.start_time,
                output,
                Some(err.to_string()),
            )),
        }
    }
}

#[async_trait::async_trait]
impl Executor for LocalExecutor {
    fn name(&self) -> &str {
        "local"
    }

    async fn execute(&self, mut ctx: ExecuteContext) -> EngineResult<ExecuteResult> {
        if ctx.is_piped || ctx.pipe_context.is_some() {
            return pipeline::execute_on(self, ctx).await;
        }
        // Builtins that need to call back into this executor (e.g.
        // `readfile` delegating to `cat`) rely on `executor_back_reference`
        // already being set; callers that go through `LocalExecutor::new`
        // and keep the `Arc` around should use `execute_via_arc` to get that
        // wiring for free.
        self.run_single(&mut ctx).await
    }

    /// Bypasses the builtin registry entirely: always spawns `ctx.command`
    /// as a host process, even if its name collides with a registered
    /// builtin. Builtins that delegate to themselves (`readfile` -> `cat`)
    /// must call this, not `execute`.
    async fn execute_command(&self, mut ctx: ExecuteContext) -> EngineResult<ExecuteResult> {
        self.run_os(&mut ctx).await
    }

    fn list_commands(&self) -> Vec<BuiltinInfo> {
        self.registry.list()
    }

    fn register_command(&self, info: BuiltinInfo, handler: super::builtin::BuiltinHandlerFn) -> EngineResult<()> {
        self.registry.register(info, handler)
    }

    fn unregister_command(&self, name: &str) {
        self.registry.unregister(name);
    }

    async fn close(&self) -> EngineResult<()> {
        Ok(())
    }
}

impl LocalExecutor {
    /// Entry point used by callers holding the `Arc` returned from `new`:
    /// wires `executor_back_reference` so builtins like `readfile` can
    /// delegate back into this same executor.
    pub async fn execute_via_arc(self: &Arc<Self>, mut ctx: ExecuteContext) -> EngineResult<ExecuteResult> {
        ctx.executor_back_reference = Some(self.clone() as Arc<dyn Executor>);
        self.execute(ctx).await
    }
}
