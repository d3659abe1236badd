//! Interactive PTY bridge (C7): a full-duplex byte pipe to either a local
//! shell or a container's `docker exec -it`, driven by a terminal-facing
//! caller (the WebSocket adapter).

use std::sync::Arc;

use bollard::exec::{CreateExecOptions, StartExecResults};
use bollard::Docker;
use futures_util::StreamExt;
use portable_pty::{native_pty_system, CommandBuilder, PtySize};
use tokio::io::AsyncWriteExt;
use tokio::sync::{mpsc, oneshot};
use tracing::warn;

use super::error::{EngineError, EngineResult};
use super::types::InteractiveOptions;

/// A running interactive session: callers push raw bytes in, receive raw
/// bytes out, and can resize the terminal. Dropping both channel halves
/// tears the session down. `exit_rx` resolves once with the session's real
/// exit code (or 1 if it couldn't be determined) when the underlying
/// process/exec ends.
pub struct InteractiveBridge {
    pub output_rx: mpsc::Receiver<Vec<u8>>,
    pub input_tx: mpsc::Sender<Vec<u8>>,
    pub exit_rx: oneshot::Receiver<i32>,
    resize_tx: Option<mpsc::Sender<(u16, u16)>>,
}

impl InteractiveBridge {
    pub async fn resize(&self, rows: u16, cols: u16) -> EngineResult<()> {
        if let Some(tx) = &self.resize_tx {
            let _ = tx.send((rows, cols)).await;
            Ok(())
        } else {
            Err(EngineError::NotPermitted("this backend does not support resize".to_string()))
        }
    }
}

/// Local backend: opens a host PTY and spawns `/bin/sh -c <command>` (or
/// `powershell` on Windows) inside it, streaming bytes in both directions.
/// Grounded in the PTY open/spawn/read-loop shape of a known
/// `portable-pty`-based shell session.
pub fn spawn_local(shell_line: &str, work_dir: Option<&str>, options: &InteractiveOptions) -> EngineResult<InteractiveBridge> {
    let pty_system = native_pty_system();
    let pair = pty_system
        .openpty(PtySize {
            rows: options.rows,
            cols: options.cols,
            pixel_width: 0,
            pixel_height: 0,
        })
        .map_err(|err| EngineError::RuntimeSetup(format!("failed to open pty: {err}")))?;

    let mut cmd = if cfg!(target_os = "windows") {
        let mut c = CommandBuilder::new("powershell");
        c.arg("-Command");
        c.arg(shell_line);
        c
    } else {
        let mut c = CommandBuilder::new("sh");
        c.arg("-c");
        c.arg(shell_line);
        c
    };
    if let Some(dir) = work_dir {
        cmd.cwd(dir);
    }

    let mut child = pair
        .slave
        .spawn_command(cmd)
        .map_err(|err| EngineError::RuntimeSetup(format!("failed to spawn pty command: {err}")))?;
    drop(pair.slave);

    let mut reader = pair
        .master
        .try_clone_reader()
        .map_err(|err| EngineError::RuntimeSetup(format!("failed to clone pty reader: {err}")))?;
    let mut writer = pair
        .master
        .take_writer()
        .map_err(|err| EngineError::RuntimeSetup(format!("failed to take pty writer: {err}")))?;

    let (output_tx, output_rx) = mpsc::channel::<Vec<u8>>(256);
    let (input_tx, mut input_rx) = mpsc::channel::<Vec<u8>>(256);
    let (resize_tx, mut resize_rx) = mpsc::channel::<(u16, u16)>(16);

    // Reading from a PTY master is a blocking syscall; run it on a blocking
    // thread and forward chunks over the async channel.
    tokio::task::spawn_blocking(move || {
        let mut buf = [0u8; 4096];
        loop {
            match std::io::Read::read(&mut reader, &mut buf) {
                Ok(0) => break,
                Ok(n) => {
                    if output_tx.blocking_send(buf[..n].to_vec()).is_err() {
                        break;
                    }
                }
                Err(err) if err.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(_) => break,
            }
        }
    });

    tokio::task::spawn_blocking(move || {
        let rt = tokio::runtime::Handle::current();
        loop {
            let Some(chunk) = rt.block_on(input_rx.recv()) else { break };
            if std::io::Write::write_all(&mut writer, &chunk).is_err() {
                break;
            }
        }
    });

    let master = pair.master;
    tokio::task::spawn_blocking(move || {
        let rt = tokio::runtime::Handle::current();
        loop {
            let Some((rows, cols)) = rt.block_on(resize_rx.recv()) else { break };
            let _ = master.resize(PtySize { rows, cols, pixel_width: 0, pixel_height: 0 });
        }
    });

    let (exit_tx, exit_rx) = oneshot::channel();
    tokio::task::spawn_blocking(move || {
        let code = match child.wait() {
            Ok(status) => status.exit_code() as i32,
            Err(_) => 1,
        };
        let _ = exit_tx.send(code);
    });

    Ok(InteractiveBridge {
        output_rx,
        input_tx,
        exit_rx,
        resize_tx: Some(resize_tx),
    })
}

/// Container backend: `docker exec -it`, streamed through bollard's
/// attached exec the same way the per-command path does in `docker::exec`,
/// but with a tty and bidirectional stdin.
pub async fn spawn_container(
    docker: Docker,
    container_id: String,
    shell_line: String,
    options: &InteractiveOptions,
) -> EngineResult<InteractiveBridge> {
    let exec_options = CreateExecOptions {
        cmd: Some(vec!["/bin/sh".to_string(), "-c".to_string(), shell_line]),
        attach_stdout: Some(true),
        attach_stderr: Some(true),
        attach_stdin: Some(true),
        tty: Some(true),
        ..Default::default()
    };

    let created = docker
        .create_exec(&container_id, exec_options)
        .await
        .map_err(|err| EngineError::RuntimeSetup(format!("create_exec (interactive) failed: {err}")))?;

    let (mut output, mut input) = match docker
        .start_exec(&created.id, None)
        .await
        .map_err(|err| EngineError::RuntimeSetup(format!("start_exec (interactive) failed: {err}")))?
    {
        StartExecResults::Attached { output, input } => (output, input),
        StartExecResults::Detached => {
            return Err(EngineError::Internal("interactive exec started detached".to_string()))
        }
    };

    let (output_tx, output_rx) = mpsc::channel::<Vec<u8>>(256);
    let (input_tx, mut input_rx) = mpsc::channel::<Vec<u8>>(256);
    let (resize_tx, mut resize_rx) = mpsc::channel::<(u16, u16)>(16);
    let (exit_tx, exit_rx) = oneshot::channel();

    let exec_id = created.id.clone();
    let docker_for_output = docker.clone();
    tokio::spawn(async move {
        while let Some(chunk) = output.next().await {
            match chunk {
                Ok(chunk) => {
                    if output_tx.send(chunk.into_bytes().to_vec()).await.is_err() {
                        break;
                    }
                }
                Err(err) => {
                    warn!(error = %err, "interactive exec output stream ended with error");
                    break;
                }
            }
        }

        let code = loop {
            match docker_for_output.inspect_exec(&exec_id).await {
                Ok(inspect) if inspect.running.unwrap_or(false) => {
                    tokio::time::sleep(std::time::Duration::from_millis(100)).await;
                    continue;
                }
                Ok(inspect) => break inspect.exit_code.unwrap_or(1) as i32,
                Err(_) => break 1,
            }
        };
        let _ = exit_tx.send(code);
    });

    tokio::spawn(async move {
        while let Some(chunk) = input_rx.recv().await {
            if input.write_all(&chunk).await.is_err() {
                break;
            }
        }
    });

    let resize_exec_id = created.id.clone();
    let docker_for_resize = docker.clone();
    tokio::spawn(async move {
        while let Some((rows, cols)) = resize_rx.recv().await {
            let _ = docker_for_resize
                .resize_exec(&resize_exec_id, bollard::exec::ResizeExecOptions { height: rows, width: cols })
                .await;
        }
    });

    let _ = docker
        .resize_exec(
            &created.id,
            bollard::exec::ResizeExecOptions {
                height: options.rows,
                width: options.cols,
            },
        )
        .await;

    Ok(InteractiveBridge {
        output_rx,
        input_tx,
        exit_rx,
        resize_tx: Some(resize_tx),
    })
}
