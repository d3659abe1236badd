//! Pipeline executor (C5): `a | b | c` composition over any inner executor.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context as TaskContext, Poll};

use tokio::io::{AsyncRead, ReadBuf};
use tracing::debug;

use super::builtin::BuiltinInfo;
use super::error::{EngineError, EngineResult};
use super::executor::Executor;
use super::types::{Command, ExecuteContext, ExecuteOptions, ExecuteResult};

/// An in-memory byte source satisfying `AsyncRead`, used to feed one
/// pipeline stage's captured output into the next stage's stdin without
/// touching the filesystem.
struct BytesCursor {
    data: Vec<u8>,
    pos: usize,
}

impl BytesCursor {
    fn new(data: Vec<u8>) -> Self {
        Self { data, pos: 0 }
    }
}

impl AsyncRead for BytesCursor {
    fn poll_read(self: Pin<&mut Self>, _cx: &mut TaskContext<'_>, buf: &mut ReadBuf<'_>) -> Poll<std::io::Result<()>> {
        let this = self.get_mut();
        let remaining = &this.data[this.pos..];
        let n = remaining.len().min(buf.remaining());
        buf.put_slice(&remaining[..n]);
        this.pos += n;
        Poll::Ready(Ok(()))
    }
}

/// Parse a raw `a | b | c` line into its constituent commands.
///
/// Splitting is a naive `|` split with no quoting awareness: a `|` inside a
/// quoted argument still breaks the pipeline. This is a frozen behavior, not
/// an oversight (see DESIGN.md's Open Question notes).
pub fn parse(raw: &str) -> EngineResult<Vec<Command>> {
    let segments: Vec<&str> = raw.split('|').collect();
    if segments.len() < 2 {
        return Err(EngineError::Validation(
            "pipeline requires at least two '|'-separated stages".to_string(),
        ));
    }

    let mut commands = Vec::with_capacity(segments.len());
    for segment in segments {
        let trimmed = segment.trim();
        if trimmed.is_empty() {
            return Err(EngineError::Validation("pipeline contains an empty stage".to_string()));
        }
        let tokens = shell_words::split(trimmed)
            .map_err(|err| EngineError::Validation(format!("could not tokenize pipeline stage '{trimmed}': {err}")))?;
        let (name, args) = tokens
            .split_first()
            .ok_or_else(|| EngineError::Validation("pipeline stage has no command".to_string()))?;
        commands.push(Command::new(name.clone(), args.to_vec()));
    }
    Ok(commands)
}

/// Run a parsed (or freshly-parsed) pipeline against `inner`, feeding each
/// stage's captured stdout into the next stage's stdin, and returning the
/// final stage's result (with `command_name` rewritten to the full pipeline
/// text so callers can tell a pipeline result from a plain one).
pub async fn execute_on(inner: &dyn Executor, ctx: ExecuteContext) -> EngineResult<ExecuteResult> {
    let commands = if let Some(pipe_ctx) = ctx.pipe_context.clone() {
        pipe_ctx.commands
    } else {
        parse(ctx.command.name())?
    };

    let mut carried_input: Option<Vec<u8>> = None;
    let mut last_result = None;

    for (idx, command) in commands.iter().enumerate() {
        let mut stage_ctx = ctx.copy();
        stage_ctx.command = command.clone();
        stage_ctx.is_piped = false;
        stage_ctx.pipe_context = None;
        if let Some(bytes) = carried_input.take() {
            stage_ctx.options.stdin = Some(Box::new(BytesCursor::new(bytes)));
        }

        let result = inner.execute(stage_ctx).await?;
        if result.exit_code != 0 {
            debug!(stage = idx, command = command.name(), exit_code = result.exit_code, "pipeline stage exited non-zero, continuing");
        }
        carried_input = Some(result.output.clone().into_bytes());
        last_result = Some(result);
    }

    let mut final_result = last_result.expect("pipeline has at least one stage");
    final_result.command_name = ctx.command.name().to_string();
    Ok(final_result)
}

/// Composite wrapper: makes a pipeline line look like any other executor,
/// for callers that build one explicitly via the builder (C9) rather than
/// relying on an inner executor's own `is_piped` branch.
pub struct PipelineExecutor {
    inner: Arc<dyn Executor>,
}

impl PipelineExecutor {
    pub fn new(inner: Arc<dyn Executor>) -> Arc<Self> {
        Arc::new(Self { inner })
    }
}

#[async_trait::async_trait]
impl Executor for PipelineExecutor {
    fn name(&self) -> &str {
        "pipeline"
    }

    async fn execute(&self, mut ctx: ExecuteContext) -> EngineResult<ExecuteResult> {
        ctx.is_piped = true;
        execute_on(self.inner.as_ref(), ctx).await
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

#[allow(unused)]
fn _assert_options_constructible() -> ExecuteOptions {
    ExecuteOptions::new()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_splits_simple_pipeline() {
        let commands = parse("echo hi | grep h | wc -l").expect("parses");
        assert_eq!(commands.len(), 3);
        assert_eq!(commands[0].name(), "echo");
        assert_eq!(commands[0].args(), &["hi".to_string()]);
        assert_eq!(commands[2].name(), "wc");
        assert_eq!(commands[2].args(), &["-l".to_string()]);
    }

    #[test]
    fn parse_rejects_single_stage() {
        assert!(parse("echo hi").is_err());
    }

    #[test]
    fn parse_rejects_empty_stage() {
        assert!(parse("echo hi | | wc -l").is_err());
    }
}
