//! Value types and contracts shared by every executor (C1).

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::sync::CancellationToken;

use super::executor::Executor;

/// A command to run: a program name and its ordered arguments.
///
/// Immutable once constructed, matching the data model's "immutable once
/// constructed" invariant for `Command`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    name: String,
    args: Vec<String>,
}

impl Command {
    pub fn new(name: impl Into<String>, args: Vec<String>) -> Self {
        Self { name: name.into(), args }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Render as a single shell invocation, the way the container executor
    /// assembles `["/bin/sh", "-c", <joined>]` (§4.4.2 step 3).
    pub fn to_shell_line(&self) -> String {
        if self.args.is_empty() {
            self.name.clone()
        } else {
            format!("{} {}", self.name, self.args.join(" "))
        }
    }
}

/// An opaque, caller-owned byte sink/source used for stdio wiring.
///
/// Streams are boxed trait objects rather than generics because
/// `ExecuteOptions` is stored in contexts that cross many call boundaries
/// (builtins calling back through `executor_back_reference`); a concrete
/// generic parameter would infect every signature in the engine.
pub type BoxedReader = Box<dyn AsyncRead + Send + Unpin>;
pub type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// All-optional execution parameters (work dir, env, streams, timeout, tty,
/// metadata).
#[derive(Default)]
pub struct ExecuteOptions {
    pub work_dir: Option<String>,
    pub env: HashMap<String, String>,
    pub stdin: Option<BoxedReader>,
    pub stdout: Option<BoxedWriter>,
    pub stderr: Option<BoxedWriter>,
    pub timeout: Option<Duration>,
    pub tty: bool,
    pub metadata: HashMap<String, String>,
}

impl ExecuteOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge two options: the receiver's non-empty fields win, matching the
    /// data model's `Merge(other)` contract. Env maps are merged key by key
    /// with the receiver's entries taking precedence on collision.
    pub fn merge(mut self, other: ExecuteOptions) -> ExecuteOptions {
        let ExecuteOptions {
            work_dir,
            env,
            stdin,
            stdout,
            stderr,
            timeout,
            tty,
            metadata,
        } = other;

        if self.work_dir.is_none() {
            self.work_dir = work_dir;
        }
        if self.stdin.is_none() {
            self.stdin = stdin;
        }
        if self.stdout.is_none() {
            self.stdout = stdout;
        }
        if self.stderr.is_none() {
            self.stderr = stderr;
        }
        if self.timeout.is_none() {
            self.timeout = timeout;
        }
        if !self.tty {
            self.tty = tty;
        }

        let mut merged_env = env;
        for (k, v) in self.env {
            merged_env.insert(k, v);
        }
        self.env = merged_env;

        let mut merged_meta = metadata;
        for (k, v) in self.metadata {
            merged_meta.insert(k, v);
        }
        self.metadata = merged_meta;

        self
    }
}

/// A single `a | b | c` pipeline specification, already parsed.
#[derive(Debug, Clone)]
pub struct PipelineContext {
    pub cancel_scope: CancellationToken,
    pub commands: Vec<Command>,
    pub options: Arc<ExecuteOptions>,
}

/// Terminal configuration for interactive execution.
#[derive(Debug, Clone)]
pub struct InteractiveOptions {
    pub terminal_type: String,
    pub rows: u16,
    pub cols: u16,
    pub raw: bool,
}

impl Default for InteractiveOptions {
    fn default() -> Self {
        Self {
            terminal_type: "xterm-256color".to_string(),
            rows: 24,
            cols: 80,
            raw: true,
        }
    }
}

/// Everything a single `Execute` call needs: the command, its options, the
/// cancellation scope that governs it, and the flags that steer dispatch.
///
/// `executor_back_reference` lets builtins call back into the owning
/// executor (§4.2). It is an `Arc` clone rather than a true borrow because
/// async trait objects can't carry a borrowed lifetime across `.await`
/// points cleanly, but it must be treated as borrowed: bounded by this call,
/// never stashed in long-lived state (see DESIGN.md).
pub struct ExecuteContext {
    pub cancel_scope: CancellationToken,
    pub command: Command,
    pub options: ExecuteOptions,
    pub executor_back_reference: Option<Arc<dyn Executor>>,
    pub is_piped: bool,
    pub pipe_context: Option<PipelineContext>,
    pub interactive: bool,
    pub interactive_options: Option<InteractiveOptions>,
    pub start_time: DateTime<Utc>,
}

impl ExecuteContext {
    pub fn new(command: Command, options: ExecuteOptions, cancel_scope: CancellationToken) -> Self {
        Self {
            cancel_scope,
            command,
            options,
            executor_back_reference: None,
            is_piped: false,
            pipe_context: None,
            interactive: false,
            interactive_options: None,
            start_time: Utc::now(),
        }
    }

    /// Shallow clone for builtins that rewrite the command before
    /// delegating (§9 "Context copying"). Stream fields in `options` are not
    /// `Clone` (they're owned boxed trait objects), so a copy always starts
    /// with empty streams — callers that need streams in the delegated call
    /// must move them in explicitly after copying.
    pub fn copy(&self) -> ExecuteContext {
        ExecuteContext {
            cancel_scope: self.cancel_scope.clone(),
            command: self.command.clone(),
            options: ExecuteOptions {
                work_dir: self.options.work_dir.clone(),
                env: self.options.env.clone(),
                stdin: None,
                stdout: None,
                stderr: None,
                timeout: self.options.timeout,
                tty: self.options.tty,
                metadata: self.options.metadata.clone(),
            },
            executor_back_reference: self.executor_back_reference.clone(),
            is_piped: self.is_piped,
            pipe_context: self.pipe_context.clone(),
            interactive: self.interactive,
            interactive_options: self.interactive_options.clone(),
            start_time: self.start_time,
        }
    }

    /// Convenience used by builtins: copy the context and swap in a new
    /// command, the way `readfile` rewrites itself into a `cat` invocation
    /// before calling `ExecuteCommand`.
    pub fn with_command(&self, command: Command) -> ExecuteContext {
        let mut ctx = self.copy();
        ctx.command = command;
        ctx
    }
}

/// Reserved exit code meaning "internal failure, no process ever ran".
pub const EXIT_CODE_INTERNAL: i32 = -1;
/// Reserved exit code meaning "command not found" (host PATH resolution
/// failure, or builtin lookup miss with unregistered commands disallowed).
pub const EXIT_CODE_NOT_FOUND: i32 = 127;

/// The outcome of an `Execute` call.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ExecuteResult {
    pub command_name: String,
    pub exit_code: i32,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub output: String,
    pub error: Option<String>,
}

impl ExecuteResult {
    pub fn success(command_name: impl Into<String>, start_time: DateTime<Utc>, output: String) -> Self {
        Self {
            command_name: command_name.into(),
            exit_code: 0,
            start_time,
            end_time: Utc::now(),
            output,
            error: None,
        }
    }

    pub fn failed(
        command_name: impl Into<String>,
        exit_code: i32,
        start_time: DateTime<Utc>,
        output: String,
        error: Option<String>,
    ) -> Self {
        Self {
            command_name: command_name.into(),
            exit_code,
            start_time,
            end_time: Utc::now(),
            output,
            error,
        }
    }
}
