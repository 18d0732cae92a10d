// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Analysis Runner Daemon (arnd)
//!
//! Background process owning the process-wide announcer and worker
//! supervisor, and a control-plane listener front ends talk to in order
//! to start and manage analyses (spec.md §4).

use std::sync::Arc;

use tokio::signal::unix::{signal, SignalKind};
use tracing::{error, info};

use arn_announcer::TcpAnnounceBus;
use arn_daemon::config::Config;
use arn_daemon::{control::ControlService, logging_sink};
use arn_supervisor::WorkerSupervisor;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    if let Some(arg) = std::env::args().nth(1) {
        match arg.as_str() {
            "--version" | "-V" | "-v" => {
                println!("arnd {}", env!("CARGO_PKG_VERSION"));
                return Ok(());
            }
            "--help" | "-h" | "help" => {
                println!("arnd {}", env!("CARGO_PKG_VERSION"));
                println!("Analysis Runner Daemon - background process driving analyses over a worker pool");
                println!();
                println!("USAGE:");
                println!("    arnd");
                println!();
                println!("Configuration is read entirely from ARN_* environment variables;");
                println!("see DESIGN.md for the full list.");
                return Ok(());
            }
            _ => {
                eprintln!("error: unexpected argument '{arg}'");
                eprintln!("Usage: arnd [--help | --version]");
                std::process::exit(1);
            }
        }
    }

    let config = Config::load()?;
    setup_logging();

    std::fs::create_dir_all(config.workspace_dir())?;

    info!(control_bind = %config.control_bind, "starting arnd");

    let announce_bus = Arc::new(TcpAnnounceBus::bind().await?);
    let announce_endpoint = announce_bus.subscriber_endpoint();

    let supervisor = WorkerSupervisor::new(config.supervisor_config());
    supervisor
        .start(&announce_endpoint, &config.image_provider_endpoint)
        .await?;

    let control_service = ControlService::new(
        config.workspace_dir(),
        Arc::clone(&announce_bus) as Arc<dyn arn_announcer::AnnounceBus>,
        Arc::clone(&supervisor),
        logging_sink(),
    );

    let control_bind = config.control_bind;
    let control_task = tokio::spawn(async move {
        if let Err(e) = control_service.serve(control_bind).await {
            error!(error = %e, "control plane listener failed");
        }
    });

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;

    info!("arnd ready");

    tokio::select! {
        _ = sigterm.recv() => info!("received SIGTERM, shutting down"),
        _ = sigint.recv() => info!("received SIGINT, shutting down"),
        _ = control_task => error!("control plane task exited unexpectedly"),
    }

    supervisor.shutdown().await;
    info!("arnd stopped");
    Ok(())
}

fn setup_logging() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .init();
}
