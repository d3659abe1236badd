use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "runshelld", version, about = "Remote command-execution engine")]
struct Cli {
    #[arg(long, default_value = "runshell.toml", global = true)]
    config: PathBuf,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Print resolved configuration and probe Docker connectivity.
    Diagnostics,
    /// Run a single command (or `a|b|c` pipeline) locally and exit.
    Exec {
        command: String,
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },
}

fn init_logging() {
    let filter = EnvFilter::try_from_env("RUNSHELL_DEBUG").unwrap_or_else(|_| EnvFilter::new("runshell=info"));

    let subscriber = tracing_subscriber::fmt().with_env_filter(filter);

    if let Ok(path) = std::env::var("RUNSHELL_LOG_FILE") {
        let path = PathBuf::from(path);
        let dir = path.parent().map(|p| p.to_path_buf()).unwrap_or_else(|| PathBuf::from("."));
        let file_name = path.file_name().map(|f| f.to_string_lossy().into_owned()).unwrap_or_else(|| "runshell.log".to_string());
        let file_appender = tracing_appender::rolling::never(dir, file_name);
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
        // Leaked deliberately: the guard must live for the process lifetime
        // to flush buffered log lines on exit, and `main` has no natural
        // place to hold it across the subsequent `.block_on`.
        Box::leak(Box::new(guard));
        subscriber.with_writer(non_blocking).with_ansi(false).init();
    } else {
        subscriber.init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Diagnostics) => runshell::cmd::diagnostics::run(&cli.config).await,
        Some(Commands::Exec { command, args }) => {
            let code = runshell::cmd::exec::run(command, args).await?;
            std::process::exit(code)
        }
        None => runshell::cmd::root::run(&cli.config).await,
    }
}
