//! Container executor configuration (C4 data model).

use std::collections::HashMap;

/// Static configuration for a `ContainerExecutor`: the image to run, the
/// resources it gets, and the mounts/env it starts with. Mirrors the
/// teacher's `EnvironmentConfiguration` (`environment/traits.rs`) narrowed
/// to what a single exec-oriented container needs.
#[derive(Debug, Clone, serde::Deserialize)]
#[serde(default)]
pub struct ContainerConfig {
    pub image: String,
    pub name_prefix: String,
    pub network: Option<String>,
    pub env: HashMap<String, String>,
    pub mounts: Vec<MountConfig>,
    /// Extra bind mount given as a single `src:dest` string (§3); the host
    /// directory is created if it doesn't already exist.
    pub bind_mount: Option<String>,
    /// Working directory applied at container creation (`Config.working_dir`)
    /// and used as the exec-time fallback when a per-command `ExecuteOptions`
    /// carries none.
    pub work_dir: Option<String>,
    /// `user[:group]` the container runs as, translated straight into
    /// `Config.user`.
    pub user: Option<String>,
    pub memory_limit_bytes: Option<i64>,
    pub nano_cpus: Option<i64>,
    pub tmpfs_size_bytes: i64,
    pub drop_capabilities: Vec<String>,
    pub auto_remove: bool,
    /// Whether commands run against this container may fall through to the
    /// builtin registry, or must resolve to an in-container binary.
    pub use_builtin_commands: bool,
}

impl Default for ContainerConfig {
    fn default() -> Self {
        Self {
            image: "alpine:latest".to_string(),
            name_prefix: "runshell".to_string(),
            network: None,
            env: HashMap::new(),
            mounts: Vec::new(),
            bind_mount: None,
            work_dir: None,
            user: None,
            memory_limit_bytes: None,
            nano_cpus: None,
            tmpfs_size_bytes: 64 * 1024 * 1024,
            drop_capabilities: vec!["ALL".to_string()],
            auto_remove: false,
            use_builtin_commands: true,
        }
    }
}

/// A single bind mount, following the teacher's `MountConfig` shape.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct MountConfig {
    pub source: String,
    pub target: String,
    pub read_only: bool,
}
