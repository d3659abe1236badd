//! `exec` subcommand: a one-shot local CLI entry point. This is the
//! minimal sliver of a surrounding command-line driver that this crate
//! carries — it has no engine logic of its own, it just builds a local
//! executor and calls straight into it (SPEC_FULL.md §10.4).

use anyhow::Result;
use tokio_util::sync::CancellationToken;

use crate::engine::local::{LocalConfig, LocalExecutor};
use crate::engine::types::{Command, ExecuteContext, ExecuteOptions};
use crate::engine::executor::Executor;

pub async fn run(command: String, args: Vec<String>) -> Result<i32> {
    let executor = LocalExecutor::new(LocalConfig::default());
    let ctx = ExecuteContext::new(Command::new(command, args), ExecuteOptions::new(), CancellationToken::new());
    let result = executor.execute_via_arc(ctx).await?;

    print!("{}", result.output);
    if let Some(error) = &result.error {
        eprintln!("{error}");
    }
    Ok(result.exit_code)
}
