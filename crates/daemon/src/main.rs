// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! ghostd: the Ghost supervision daemon.

use ghost_core::GhostConfig;
use ghost_daemon::lifecycle;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> std::process::ExitCode {
    let ghost = match GhostConfig::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("ghostd: {}", e);
            return std::process::ExitCode::FAILURE;
        }
    };

    let config = lifecycle::Config::from_ghost(&ghost);
    if let Err(e) = std::fs::create_dir_all(&config.state_dir) {
        eprintln!("ghostd: cannot create state dir {}: {}", config.state_dir.display(), e);
        return std::process::ExitCode::FAILURE;
    }

    // Log to a file under the state dir; RUST_LOG controls verbosity.
    let appender = tracing_appender::rolling::never(
        &config.state_dir,
        ghost_core::config::LOG_FILE,
    );
    let (writer, _guard) = tracing_appender::non_blocking(appender);
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(writer)
        .with_ansi(false)
        .init();

    let daemon = match lifecycle::startup(&ghost).await {
        Ok(daemon) => daemon,
        Err(e) => {
            error!(error = %e, "startup failed");
            eprintln!("ghostd: {}", e);
            return std::process::ExitCode::FAILURE;
        }
    };

    // Readiness marker for wrappers that watch stdout
    println!("READY");
    info!("ghostd ready");

    wait_for_shutdown_signal().await;
    daemon.shutdown().await;
    std::process::ExitCode::SUCCESS
}

#[cfg(unix)]
async fn wait_for_shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};
    let mut term = match signal(SignalKind::terminate()) {
        Ok(term) => term,
        Err(e) => {
            error!(error = %e, "SIGTERM handler install failed");
            let _ = tokio::signal::ctrl_c().await;
            return;
        }
    };
    tokio::select! {
        _ = tokio::signal::ctrl_c() => info!("interrupt received"),
        _ = term.recv() => info!("SIGTERM received"),
    }
}

#[cfg(not(unix))]
async fn wait_for_shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
