//! The polymorphic executor abstraction (C1).

use async_trait::async_trait;

use super::builtin::BuiltinInfo;
use super::error::EngineResult;
use super::types::{ExecuteContext, ExecuteResult};

/// Anything that can run a `Command` implements `Executor`: the local
/// process backend, the container backend, the pipeline wrapper, and the
/// audited decorator all satisfy the same contract so callers never branch
/// on concrete type.
#[async_trait]
pub trait Executor: Send + Sync {
    /// A short, stable identifier used in logs and audit events.
    fn name(&self) -> &str;

    /// Run a single command per `ctx.command`, honoring `ctx.options` and
    /// `ctx.cancel_scope`. Dispatches through the builtin registry and
    /// pipeline parsing the way a top-level caller would.
    async fn execute(&self, ctx: ExecuteContext) -> EngineResult<ExecuteResult>;

    /// Run `ctx.command` unconditionally against this executor's underlying
    /// OS/container process, bypassing the builtin registry and pipeline
    /// dispatch entirely. This is the anti-recursion mechanism builtins that
    /// delegate to themselves (e.g. `readfile` -> `cat`) must call instead of
    /// `execute`, since `execute` would look the rewritten command back up in
    /// the registry and could loop forever if it collided with a builtin
    /// name. The default just forwards to `execute`, which is only correct
    /// for wrappers (pipeline, audit) with no registry of their own to skip;
    /// concrete backends (local, container) must override it.
    async fn execute_command(&self, ctx: ExecuteContext) -> EngineResult<ExecuteResult> {
        self.execute(ctx).await
    }

    /// List the builtins this executor (or its registry) currently knows
    /// about. Executors with no builtin registry of their own (e.g. a bare
    /// pipeline wrapper) delegate to their inner executor.
    fn list_commands(&self) -> Vec<BuiltinInfo>;

    /// Register a builtin at runtime. Returns an error if one is already
    /// registered under the same name and the executor doesn't allow
    /// shadowing.
    fn register_command(&self, info: BuiltinInfo, handler: super::builtin::BuiltinHandlerFn) -> EngineResult<()>;

    /// Remove a previously registered builtin. Not an error if it was never
    /// registered.
    fn unregister_command(&self, name: &str);

    /// Release any resources owned by this executor (container, open
    /// sessions, file handles). Idempotent: calling `close` twice is a no-op
    /// the second time.
    async fn close(&self) -> EngineResult<()>;
}
