//! Per-command exec algorithm (§4.4.2), grounded in the teacher's
//! `docker::service::DockerService::exec_command`.

use std::time::Duration;

use bollard::exec::{CreateExecOptions, StartExecResults};
use bollard::Docker;
use futures_util::StreamExt;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::engine::docker::config::ContainerConfig;
use crate::engine::error::{EngineError, EngineResult};
use crate::engine::types::{ExecuteContext, ExecuteResult, EXIT_CODE_INTERNAL, EXIT_CODE_NOT_FOUND};

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Run a single command inside an already-running container.
///
/// 1. Assemble `["/bin/sh", "-c", <joined command>]`.
/// 2. Build the exec config (attach stdout/stderr/stdin, tty always off —
///    this is the non-interactive path, §4.4.2 step 4).
/// 3. Create the exec, then start+attach it.
/// 4. Spawn a task copying the attached output stream into the capture
///    buffer and (if present) the caller's stdout writer.
/// 5. Poll `inspect_exec` roughly every 100ms until it reports not running.
/// 6. Return the captured output and exit code.
pub async fn run(docker: &Docker, config: &ContainerConfig, container_id: &str, ctx: &mut ExecuteContext) -> EngineResult<ExecuteResult> {
    let shell_line = ctx.command.to_shell_line();
    let env: Vec<String> = ctx.options.env.iter().map(|(k, v)| format!("{k}={v}")).collect();
    let work_dir = ctx.options.work_dir.clone().or_else(|| config.work_dir.clone());

    let exec_options = CreateExecOptions {
        cmd: Some(vec!["/bin/sh".to_string(), "-c".to_string(), shell_line.clone()]),
        env: if env.is_empty() { None } else { Some(env) },
        working_dir: work_dir,
        attach_stdout: Some(true),
        attach_stderr: Some(true),
        attach_stdin: Some(ctx.options.stdin.is_some()),
        tty: Some(false),
        ..Default::default()
    };

    let created = docker
        .create_exec(container_id, exec_options)
        .await
        .map_err(|err| EngineError::RuntimeSetup(format!("create_exec failed: {err}")))?;

    debug!(exec_id = %created.id, command = %shell_line, "starting exec");

    let mut captured = Vec::new();

    match docker
        .start_exec(&created.id, None)
        .await
        .map_err(|err| EngineError::RuntimeSetup(format!("start_exec failed: {err}")))?
    {
        StartExecResults::Attached { mut output, mut input } => {
            if let Some(mut reader) = ctx.options.stdin.take() {
                tokio::spawn(async move {
                    let mut buf = Vec::new();
                    if tokio::io::AsyncReadExt::read_to_end(&mut reader, &mut buf).await.is_ok() {
                        let _ = input.write_all(&buf).await;
                    }
                });
            }

            while let Some(chunk) = output.next().await {
                let chunk = chunk.map_err(|err| EngineError::Io(std::io::Error::new(std::io::ErrorKind::Other, err)))?;
                let bytes = chunk.into_bytes();
                if let Some(writer) = ctx.options.stdout.as_mut() {
                    let _ = writer.write_all(&bytes).await;
                }
                captured.extend_from_slice(&bytes);
            }
        }
        StartExecResults::Detached => {
            return Err(EngineError::Internal("exec started detached unexpectedly".to_string()));
        }
    }

    let exit_code = loop {
        let inspect = docker
            .inspect_exec(&created.id)
            .await
            .map_err(|err| EngineError::RuntimeSetup(format!("inspect_exec failed: {err}")))?;

        if inspect.running.unwrap_or(false) {
            tokio::select! {
                _ = tokio::time::sleep(POLL_INTERVAL) => continue,
                _ = ctx.cancel_scope.cancelled() => return Err(EngineError::Cancelled),
            }
        }

        break inspect.exit_code.unwrap_or(EXIT_CODE_INTERNAL as i64);
    };

    let output = String::from_utf8_lossy(&captured).into_owned();
    if exit_code == 0 {
        Ok(ExecuteResult::success(ctx.command.name(), ctx.start_time, output))
    } else {
        let code = exit_code as i32;
        let error = if code == EXIT_CODE_NOT_FOUND {
            Some(format!("command not found: {}", ctx.command.name()))
        } else {
            Some(format!("command exited with code {code}"))
        };
        Ok(ExecuteResult::failed(ctx.command.name(), code, ctx.start_time, output, error))
    }
}
