//! `diagnostics` subcommand: resolved config + Docker reachability probe,
//! grounded in the teacher's `cmd/diagnostics.rs`.

use std::path::Path;

use anyhow::{Context, Result};

use crate::config::Configuration;

pub async fn run(config_path: &Path) -> Result<()> {
    let config = Configuration::load(config_path).context("loading configuration")?;

    println!("runshell {}", env!("CARGO_PKG_VERSION"));
    println!("config file: {}", config_path.display());
    println!("server: {}:{}", config.server.host, config.server.port);
    println!("docker socket: {}", config.docker.socket);

    match bollard::Docker::connect_with_socket(&config.docker.socket, 10, bollard::API_DEFAULT_VERSION) {
        Ok(docker) => match docker.ping().await {
            Ok(_) => println!("docker: reachable"),
            Err(err) => println!("docker: unreachable ({err})"),
        },
        Err(err) => println!("docker: could not connect ({err})"),
    }

    Ok(())
}
