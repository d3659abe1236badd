//! Built-in command registry (C2).

use std::sync::Arc;

use dashmap::DashMap;
use futures::future::BoxFuture;

use super::error::{EngineError, EngineResult};
use super::types::{Command, ExecuteContext, ExecuteResult};

/// Metadata describing a registered builtin, returned by `list_commands`.
#[derive(Debug, Clone, serde::Serialize)]
pub struct BuiltinInfo {
    pub name: String,
    pub summary: String,
}

impl BuiltinInfo {
    pub fn new(name: impl Into<String>, summary: impl Into<String>) -> Self {
        Self { name: name.into(), summary: summary.into() }
    }
}

/// A builtin's implementation: takes the (already shallow-copied, if
/// needed) execute context and produces a result.
pub type BuiltinHandlerFn = Arc<dyn Fn(ExecuteContext) -> BoxFuture<'static, EngineResult<ExecuteResult>> + Send + Sync>;

/// Concurrent name -> (info, handler) table shared by an executor and
/// anything that registers/unregisters commands against it at runtime.
///
/// Backed by `DashMap` the way the teacher keeps its server table concurrent
/// (`server::manager::Manager::servers`), since registration can race with
/// in-flight lookups.
#[derive(Default)]
pub struct BuiltinRegistry {
    commands: DashMap<String, (BuiltinInfo, BuiltinHandlerFn)>,
}

impl BuiltinRegistry {
    pub fn new() -> Self {
        Self { commands: DashMap::new() }
    }

    pub fn register(&self, info: BuiltinInfo, handler: BuiltinHandlerFn) -> EngineResult<()> {
        if self.commands.contains_key(&info.name) {
            return Err(EngineError::Validation(format!(
                "builtin '{}' is already registered",
                info.name
            )));
        }
        self.commands.insert(info.name.clone(), (info, handler));
        Ok(())
    }

    pub fn unregister(&self, name: &str) {
        self.commands.remove(name);
    }

    pub fn list(&self) -> Vec<BuiltinInfo> {
        self.commands.iter().map(|entry| entry.value().0.clone()).collect()
    }

    pub fn get(&self, name: &str) -> Option<BuiltinHandlerFn> {
        self.commands.get(name).map(|entry| entry.value().1.clone())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.commands.contains_key(name)
    }
}

/// `pwd` — reports the working directory that would apply to the next
/// command, defaulting to `.` when the context carries none.
pub fn pwd_handler() -> BuiltinHandlerFn {
    Arc::new(|ctx: ExecuteContext| {
        Box::pin(async move {
            let dir = ctx.options.work_dir.clone().unwrap_or_else(|| ".".to_string());
            Ok(ExecuteResult::success("pwd", ctx.start_time, format!("{dir}\n")))
        })
    })
}

/// `readfile <path>` — rewrites itself into `cat <path>` and delegates
/// through the executor back-reference, the pattern spec §4.2 calls out
/// explicitly and §8 tests against infinite recursion for.
pub fn readfile_handler() -> BuiltinHandlerFn {
    Arc::new(|ctx: ExecuteContext| {
        Box::pin(async move {
            let path = ctx
                .command
                .args()
                .first()
                .ok_or_else(|| EngineError::Validation("readfile requires a path argument".to_string()))?
                .clone();

            let executor = ctx
                .executor_back_reference
                .clone()
                .ok_or_else(|| EngineError::Internal("readfile has no executor back-reference".to_string()))?;

            let delegated = ctx.with_command(Command::new("cat", vec![path]));
            executor.execute_command(delegated).await
        })
    })
}
