pub mod cmd;
pub mod config;
pub mod engine;
pub mod server;
pub mod session;

pub use engine::{Command, ExecuteContext, ExecuteOptions, ExecuteResult, Executor};
