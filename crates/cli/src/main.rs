// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! ghost: command-line client for the Ghost daemon.

mod client;
mod output;

use clap::{Parser, Subcommand};
use client::Client;
use ghost_core::{GhostConfig, ProcessId};
use std::collections::HashMap;

#[derive(Parser)]
#[command(name = "ghost", version, about = "Drive the Ghost supervision daemon")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check daemon liveness
    Ping,
    /// List every registered process
    List,
    /// Show one process
    Status { id: String },
    /// Start a supervised process
    Start { id: String },
    /// Stop a process gracefully, then kill
    Stop {
        id: String,
        /// Graceful-stop timeout in milliseconds
        #[arg(long, default_value_t = 5000)]
        timeout_ms: u64,
    },
    /// Restart a supervised process
    Restart {
        id: String,
        #[arg(long, default_value_t = 5000)]
        timeout_ms: u64,
    },
    /// Discover processes known to the daemon
    Discover,
    /// Start the daemon in the background
    DaemonStart,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = GhostConfig::load()?;

    if let Commands::DaemonStart = cli.command {
        return daemon_start(&config);
    }

    let client = Client::from_config(&config).await?;
    let response = match &cli.command {
        Commands::Ping => client.send("ping", None, HashMap::new()).await?,
        Commands::List => client.send("list", None, HashMap::new()).await?,
        Commands::Discover => client.send("discover", None, HashMap::new()).await?,
        Commands::Status { id } => {
            client.send("status", Some(ProcessId::from_string(id)), HashMap::new()).await?
        }
        Commands::Start { id } => {
            client.send("start", Some(ProcessId::from_string(id)), HashMap::new()).await?
        }
        Commands::Stop { id, timeout_ms } => {
            let mut params = HashMap::new();
            params.insert("timeoutMs".to_string(), timeout_ms.to_string());
            client.send("stop", Some(ProcessId::from_string(id)), params).await?
        }
        Commands::Restart { id, timeout_ms } => {
            let mut params = HashMap::new();
            params.insert("timeoutMs".to_string(), timeout_ms.to_string());
            client.send("restart", Some(ProcessId::from_string(id)), params).await?
        }
        Commands::DaemonStart => unreachable!("handled above"),
    };

    println!("{}", output::render_response(&response));
    if response.success {
        Ok(())
    } else {
        std::process::exit(1);
    }
}

/// Spawn a detached ghostd for this state dir.
fn daemon_start(config: &GhostConfig) -> anyhow::Result<()> {
    let state_dir = config.state_dir();
    std::fs::create_dir_all(&state_dir)?;

    let installed = state_dir.join("bin").join("ghostd");
    let binary = if installed.is_file() {
        installed
    } else {
        std::path::PathBuf::from("ghostd")
    };

    let child = std::process::Command::new(&binary)
        .env(ghost_core::config::ENV_INSTALL, &state_dir)
        .stdin(std::process::Stdio::null())
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .spawn()
        .map_err(|e| anyhow::anyhow!("failed to start {}: {}", binary.display(), e))?;

    println!("started ghostd (pid {})", child.id());
    Ok(())
}

#[cfg(test)]
#[path = "main_tests.rs"]
mod tests;
