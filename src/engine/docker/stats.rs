//! Resource stats for a running container (SPEC_FULL.md §11), grounded in
//! the teacher's `docker::service::DockerService::get_container_stats`.

use bollard::container::StatsOptions;
use bollard::Docker;
use futures_util::StreamExt;

use crate::engine::error::{EngineError, EngineResult};

/// A single point-in-time resource snapshot.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ContainerStats {
    pub cpu_percent: f64,
    pub memory_usage_bytes: u64,
    pub memory_limit_bytes: u64,
    pub network_rx_bytes: u64,
    pub network_tx_bytes: u64,
}

/// Calculate CPU percent the way the Docker CLI does: delta of container
/// usage over delta of system usage, scaled by the online CPU count.
fn cpu_percent(stats: &bollard::container::Stats) -> f64 {
    let cpu_delta = stats.cpu_stats.cpu_usage.total_usage as f64
        - stats.precpu_stats.cpu_usage.total_usage as f64;
    let system_delta = stats.cpu_stats.system_cpu_usage.unwrap_or(0) as f64
        - stats.precpu_stats.system_cpu_usage.unwrap_or(0) as f64;
    let online_cpus = stats.cpu_stats.online_cpus.unwrap_or(1).max(1) as f64;

    if system_delta > 0.0 && cpu_delta > 0.0 {
        (cpu_delta / system_delta) * online_cpus * 100.0
    } else {
        0.0
    }
}

/// Pull a single (non-streaming) stats snapshot for `container_id`.
pub async fn collect(docker: &Docker, container_id: &str) -> EngineResult<ContainerStats> {
    let options = Some(StatsOptions { stream: false, one_shot: true });
    let mut stream = docker.stats(container_id, options);

    let stats = stream
        .next()
        .await
        .ok_or_else(|| EngineError::NotFound(format!("no stats available for container '{container_id}'")))?
        .map_err(|err| EngineError::RuntimeSetup(format!("stats query failed: {err}")))?;

    let (rx, tx) = stats
        .networks
        .as_ref()
        .map(|nets| {
            nets.values().fold((0u64, 0u64), |(rx, tx), n| {
                (rx + n.rx_bytes, tx + n.tx_bytes)
            })
        })
        .unwrap_or((0, 0));

    Ok(ContainerStats {
        cpu_percent: cpu_percent(&stats),
        memory_usage_bytes: stats.memory_stats.usage.unwrap_or(0),
        memory_limit_bytes: stats.memory_stats.limit.unwrap_or(0),
        network_rx_bytes: rx,
        network_tx_bytes: tx,
    })
}
