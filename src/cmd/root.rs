//! Default subcommand: start the HTTP/WS server long-lived, grounded in
//! the teacher's `cmd::root::run` (config load, router build, graceful
//! shutdown on ctrl_c).

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::Configuration;
use crate::engine::audit::{AuditedExecutor, FileAuditSink};
use crate::engine::builder::{ExecutorBuilder, LocalExecutorBuilder};
use crate::engine::docker::{ContainerConfig, ContainerExecutor};
use crate::engine::executor::Executor;
use crate::engine::local::LocalConfig;
use crate::server::{build_router, run_session_reaper, AppState};
use crate::session::SessionManager;

pub async fn run(config_path: &Path) -> Result<()> {
    let config = Configuration::load(config_path).context("loading configuration")?;

    let local_config = LocalConfig { default_work_dir: None, allow_unregistered: true, output_cap_bytes: 10 * 1024 * 1024, ..LocalConfig::default() };

    let (executor, container_executor): (Arc<dyn Executor>, Option<Arc<ContainerExecutor>>) = if std::env::var("RUNSHELL_BACKEND")
        .map(|v| v == "container")
        .unwrap_or(false)
    {
        let container_config = ContainerConfig {
            image: config.docker.default_image.clone(),
            network: config.docker.network.clone(),
            tmpfs_size_bytes: config.docker.tmpfs_size_bytes,
            ..ContainerConfig::default()
        };
        let docker = bollard::Docker::connect_with_socket(&config.docker.socket, 120, bollard::API_DEFAULT_VERSION)
            .context("connecting to docker")?;
        let container = ContainerExecutor::new(docker, container_config).context("creating container executor")?;
        (container.clone() as Arc<dyn Executor>, Some(container))
    } else {
        (LocalExecutorBuilder::new().with_config(local_config).build(None).await.context("building local executor")?, None)
    };

    let executor: Arc<dyn Executor> = if config.audit.enabled {
        let sink = FileAuditSink::new(config.audit.log_path.clone()).await.context("creating audit sink")?;
        AuditedExecutor::new(executor, sink)
    } else {
        executor
    };

    let idle_ttl = config.session.idle_ttl_secs.map(Duration::from_secs);
    let sessions = SessionManager::new(idle_ttl, config.docker.socket.clone());

    let state = Arc::new(AppState {
        executor,
        container_executor,
        sessions: sessions.clone(),
        ws_jwt_secret: std::env::var("RUNSHELL_WS_JWT_SECRET").ok(),
    });

    let shutdown = CancellationToken::new();
    let reaper_shutdown = shutdown.clone();
    let reaper = tokio::spawn(run_session_reaper(sessions, Duration::from_secs(config.session.reap_interval_secs), reaper_shutdown));

    let router = build_router(state);
    let addr: std::net::SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("parsing bind address")?;
    info!(%addr, "runshell listening");

    let handle = axum_server::Handle::new();
    let shutdown_handle = handle.clone();
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        info!("shutdown signal received");
        shutdown_handle.graceful_shutdown(Some(Duration::from_secs(10)));
    });

    axum_server::bind(addr)
        .handle(handle)
        .serve(router.into_make_service())
        .await
        .context("server error")?;

    shutdown.cancel();
    let _ = reaper.await;
    Ok(())
}
