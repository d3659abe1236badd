//! Container creation/destruction helpers (§4.4.1 `ensure_container`).

use std::collections::HashMap;

use bollard::container::{Config, CreateContainerOptions, RemoveContainerOptions};
use bollard::exec::CreateExecOptions;
use bollard::image::CreateImageOptions;
use bollard::models::{HostConfig, Mount, MountTypeEnum};
use bollard::Docker;
use futures_util::TryStreamExt;
use tracing::{debug, info, warn};

use super::config::ContainerConfig;
use crate::engine::error::{EngineError, EngineResult};

/// Pull `image` if the daemon doesn't already have it locally, mirroring
/// the teacher's `ensure_image_exists`/`pull_image` split.
pub async fn ensure_image(docker: &Docker, image: &str) -> EngineResult<()> {
    if docker.inspect_image(image).await.is_ok() {
        return Ok(());
    }

    info!(image, "pulling image");
    let options = Some(CreateImageOptions {
        from_image: image,
        ..Default::default()
    });

    let mut stream = docker.create_image(options, None, None);
    while let Some(progress) = stream
        .try_next()
        .await
        .map_err(|err| EngineError::RuntimeSetup(format!("image pull failed for '{image}': {err}")))?
    {
        if let Some(err) = progress.error {
            return Err(EngineError::RuntimeSetup(format!("image pull failed for '{image}': {err}")));
        }
    }
    Ok(())
}

/// Create a (stopped) container from `config`, named `name`, hardened the
/// way the teacher's `environment/docker/container.rs::create_container`
/// hardens every container it starts: capabilities dropped, no new
/// privileges, no restart policy, bounded tmpfs.
pub async fn create_container(docker: &Docker, config: &ContainerConfig, name: &str) -> EngineResult<String> {
    ensure_image(docker, &config.image).await?;

    let mut mounts: Vec<Mount> = config
        .mounts
        .iter()
        .map(|m| Mount {
            target: Some(m.target.clone()),
            source: Some(m.source.clone()),
            typ: Some(MountTypeEnum::BIND),
            read_only: Some(m.read_only),
            ..Default::default()
        })
        .collect();

    if let Some(raw) = &config.bind_mount {
        let (source, target) = raw
            .split_once(':')
            .ok_or_else(|| EngineError::Validation(format!("bind_mount '{raw}' must be 'src:dest'")))?;
        std::fs::create_dir_all(source)
            .map_err(|err| EngineError::RuntimeSetup(format!("failed to create bind mount source '{source}': {err}")))?;
        mounts.push(Mount {
            target: Some(target.to_string()),
            source: Some(source.to_string()),
            typ: Some(MountTypeEnum::BIND),
            read_only: Some(false),
            ..Default::default()
        });
    }

    let mut tmpfs = HashMap::new();
    tmpfs.insert("/tmp".to_string(), format!("size={}", config.tmpfs_size_bytes));

    let host_config = HostConfig {
        mounts: Some(mounts),
        network_mode: config.network.clone(),
        memory: config.memory_limit_bytes,
        nano_cpus: config.nano_cpus,
        cap_drop: Some(config.drop_capabilities.clone()),
        security_opt: Some(vec!["no-new-privileges".to_string()]),
        tmpfs: Some(tmpfs),
        auto_remove: Some(config.auto_remove),
        restart_policy: Some(bollard::models::RestartPolicy {
            name: Some(bollard::models::RestartPolicyNameEnum::NO),
            ..Default::default()
        }),
        ..Default::default()
    };

    let env: Vec<String> = config.env.iter().map(|(k, v)| format!("{k}={v}")).collect();

    let container_config = Config {
        image: Some(config.image.clone()),
        env: Some(env),
        // Keep the container alive with no command of its own; real work
        // happens through `docker exec` (§4.4.2), matching the "long-lived
        // shell host" role the container plays in this design.
        cmd: Some(vec!["tail".to_string(), "-f".to_string(), "/dev/null".to_string()]),
        tty: Some(false),
        user: config.user.clone(),
        working_dir: config.work_dir.clone(),
        host_config: Some(host_config),
        ..Default::default()
    };

    let created = docker
        .create_container(Some(CreateContainerOptions { name, platform: None }), container_config)
        .await
        .map_err(|err| EngineError::RuntimeSetup(format!("failed to create container '{name}': {err}")))?;

    docker
        .start_container::<String>(&created.id, None)
        .await
        .map_err(|err| EngineError::RuntimeSetup(format!("failed to start container '{name}': {err}")))?;

    if let Some(work_dir) = &config.work_dir {
        validate_work_dir(docker, &created.id, work_dir).await?;
    }

    info!(container_id = %created.id, name, "container running");
    Ok(created.id)
}

/// Make sure `work_dir` exists and is usable inside a just-started
/// container: `mkdir -p`, `chmod 777`, then `ls -la` to confirm it's
/// reachable (§4.4.1 step 6).
async fn validate_work_dir(docker: &Docker, container_id: &str, work_dir: &str) -> EngineResult<()> {
    for cmd in [
        vec!["mkdir".to_string(), "-p".to_string(), work_dir.to_string()],
        vec!["chmod".to_string(), "777".to_string(), work_dir.to_string()],
        vec!["ls".to_string(), "-la".to_string(), work_dir.to_string()],
    ] {
        let exec_options = CreateExecOptions {
            cmd: Some(cmd.clone()),
            attach_stdout: Some(true),
            attach_stderr: Some(true),
            ..Default::default()
        };
        let created = docker
            .create_exec(container_id, exec_options)
            .await
            .map_err(|err| EngineError::RuntimeSetup(format!("failed to validate work_dir '{work_dir}': {err}")))?;
        docker
            .start_exec(&created.id, None)
            .await
            .map_err(|err| EngineError::RuntimeSetup(format!("failed to validate work_dir '{work_dir}': {err}")))?;

        loop {
            let inspect = docker
                .inspect_exec(&created.id)
                .await
                .map_err(|err| EngineError::RuntimeSetup(format!("failed to validate work_dir '{work_dir}': {err}")))?;
            if !inspect.running.unwrap_or(false) {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        }
        debug!(container_id, ?cmd, "work_dir validation step ran");
    }
    Ok(())
}

/// Stop and remove a container, best-effort: failures to stop are logged
/// and removal is still attempted, matching `destroy_container`'s
/// tolerance for a container that already exited on its own.
pub async fn destroy_container(docker: &Docker, id: &str) -> EngineResult<()> {
    if let Err(err) = docker.stop_container(id, None).await {
        warn!(container_id = id, error = %err, "stop_container failed, proceeding to remove");
    }

    docker
        .remove_container(
            id,
            Some(RemoveContainerOptions {
                force: true,
                ..Default::default()
            }),
        )
        .await
        .map_err(|err| EngineError::RuntimeSetup(format!("failed to remove container '{id}': {err}")))?;

    info!(container_id = id, "container removed");
    Ok(())
}
