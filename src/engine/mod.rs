//! The execution engine: executor abstraction, builtins, and the local,
//! container, pipeline, and audited implementations (C1-C9).

pub mod audit;
pub mod builder;
pub mod builtin;
pub mod docker;
pub mod error;
pub mod executor;
pub mod interactive;
pub mod local;
pub mod pipeline;
pub mod types;

pub use error::{EngineError, EngineResult};
pub use executor::Executor;
pub use types::{Command, ExecuteContext, ExecuteOptions, ExecuteResult, InteractiveOptions, PipelineContext};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::local::{LocalConfig, LocalExecutor};
    use tokio_util::sync::CancellationToken;

    #[tokio::test]
    async fn local_executor_runs_a_simple_command() {
        let executor = LocalExecutor::new(LocalConfig::default());
        let ctx = ExecuteContext::new(
            Command::new("echo", vec!["hello".to_string()]),
            ExecuteOptions::new(),
            CancellationToken::new(),
        );
        let result = executor.execute(ctx).await.expect("executes");
        assert_eq!(result.exit_code, 0);
        assert_eq!(result.output.trim(), "hello");
    }

    #[tokio::test]
    async fn local_executor_reports_nonzero_exit() {
        let executor = LocalExecutor::new(LocalConfig::default());
        let ctx = ExecuteContext::new(
            Command::new("sh", vec!["-c".to_string(), "exit 3".to_string()]),
            ExecuteOptions::new(),
            CancellationToken::new(),
        );
        let result = executor.execute(ctx).await.expect("executes");
        assert_eq!(result.exit_code, 3);
    }

    #[tokio::test]
    async fn local_executor_reports_not_found_error() {
        let executor = LocalExecutor::new(LocalConfig::default());
        let ctx = ExecuteContext::new(Command::new("nonexistent_xyz", vec![]), ExecuteOptions::new(), CancellationToken::new());
        let result = executor.execute(ctx).await.expect("executes");
        assert_eq!(result.exit_code, 127);
        assert!(result.error.is_some());
    }

    #[tokio::test]
    async fn builtin_pwd_reports_work_dir() {
        let executor = LocalExecutor::new(LocalConfig::default());
        let mut options = ExecuteOptions::new();
        options.work_dir = Some("/tmp".to_string());
        let ctx = ExecuteContext::new(Command::new("pwd", vec![]), options, CancellationToken::new());
        let result = executor.execute(ctx).await.expect("executes");
        assert_eq!(result.output.trim(), "/tmp");
    }

    #[tokio::test]
    async fn readfile_delegates_to_cat_via_back_reference() {
        let executor = LocalExecutor::new(LocalConfig::default());
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("greeting.txt");
        tokio::fs::write(&path, b"hi there\n").await.expect("write file");

        let ctx = ExecuteContext::new(
            Command::new("readfile", vec![path.to_string_lossy().to_string()]),
            ExecuteOptions::new(),
            CancellationToken::new(),
        );
        let result = executor.execute_via_arc(ctx).await.expect("executes");
        assert_eq!(result.output.trim(), "hi there");
    }

    #[tokio::test]
    async fn pipeline_pipes_stdout_between_stages() {
        let executor = LocalExecutor::new(LocalConfig::default());
        let mut ctx = ExecuteContext::new(
            Command::new("echo hello world | wc -w", vec![]),
            ExecuteOptions::new(),
            CancellationToken::new(),
        );
        ctx.is_piped = true;
        let result = executor.execute(ctx).await.expect("executes");
        assert_eq!(result.exit_code, 0);
        assert_eq!(result.output.trim(), "2");
    }
}
