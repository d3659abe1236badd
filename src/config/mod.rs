//! Configuration (SPEC_FULL.md §10.3), loaded from a TOML file the way the
//! teacher's `config::Configuration::load` does.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file '{path}': {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    8080
}
fn default_body_limit() -> usize {
    16 * 1024 * 1024
}
fn default_docker_socket() -> String {
    "unix:///var/run/docker.sock".to_string()
}
fn default_image() -> String {
    "alpine:latest".to_string()
}
fn default_tmpfs_size() -> i64 {
    64 * 1024 * 1024
}
fn default_max_sessions() -> usize {
    256
}
fn default_reap_interval_secs() -> u64 {
    60
}
fn default_audit_enabled() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_body_limit")]
    pub body_limit_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { host: default_host(), port: default_port(), body_limit_bytes: default_body_limit() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DockerConfig {
    #[serde(default = "default_docker_socket")]
    pub socket: String,
    #[serde(default = "default_image")]
    pub default_image: String,
    pub network: Option<String>,
    #[serde(default = "default_tmpfs_size")]
    pub tmpfs_size_bytes: i64,
}

impl Default for DockerConfig {
    fn default() -> Self {
        Self {
            socket: default_docker_socket(),
            default_image: default_image(),
            network: None,
            tmpfs_size_bytes: default_tmpfs_size(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    #[serde(default = "default_max_sessions")]
    pub max_sessions: usize,
    #[serde(default = "default_reap_interval_secs")]
    pub reap_interval_secs: u64,
    pub idle_ttl_secs: Option<u64>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_sessions: default_max_sessions(),
            reap_interval_secs: default_reap_interval_secs(),
            idle_ttl_secs: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditConfig {
    #[serde(default = "default_audit_enabled")]
    pub enabled: bool,
    pub log_path: Option<PathBuf>,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self { enabled: default_audit_enabled(), log_path: None }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Configuration {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub docker: DockerConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub audit: AuditConfig,
}

impl Configuration {
    /// Load configuration from `path`, falling back to defaults for any
    /// section or field the file omits. `RUNSHELL_DEBUG`/`RUNSHELL_LOG_FILE`
    /// are deliberately not part of this struct: they're read straight from
    /// the environment in `main.rs`, per spec §6.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read { path: path.to_path_buf(), source })?;
        toml::from_str(&raw).map_err(|source| ConfigError::Parse { path: path.to_path_buf(), source })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = Configuration::default();
        assert_eq!(config.server.port, 8080);
        assert!(config.audit.enabled);
    }

    #[test]
    fn load_missing_file_errors() {
        let result = Configuration::load(Path::new("/nonexistent/runshell.toml"));
        assert!(matches!(result, Err(ConfigError::Read { .. })));
    }
}
