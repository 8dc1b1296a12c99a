// ABOUTME: Sofia AI HTTP server binary
// ABOUTME: Loads configuration, opens the database, wires resources and serves the API
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Sofia AI

//! # Sofia AI Server Binary
//!
//! Starts the chat API. Every setting comes from the environment; the two
//! command line flags override the listen port and database URL.

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use sofia_ai_server::{
    config::ServerConfig, database::Database, logging, resources::ServerResources,
    routes::build_router,
};
use tokio::net::TcpListener;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "sofia-server")]
#[command(about = "Sofia AI - chat backend with model fallback, quotas and retrieval context")]
pub struct Args {
    /// Override HTTP port
    #[arg(long)]
    http_port: Option<u16>,

    /// Override database URL
    #[arg(long)]
    database_url: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    logging::init_from_env()?;

    let mut config = ServerConfig::from_env()?;
    if let Some(http_port) = args.http_port {
        config.http_port = http_port;
    }
    if let Some(database_url) = args.database_url {
        config.database_url = database_url;
    }

    ensure_database_dir(&config.database_url)?;
    let database = Database::new(&config.database_url)
        .await
        .context("Failed to open database")?;

    let http_port = config.http_port;
    let (resources, log_worker) = ServerResources::new(database, config);
    let resources = Arc::new(resources);
    let app = build_router(&resources);
    drop(resources);

    let addr = SocketAddr::from(([0, 0, 0, 0], http_port));
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!(%addr, "Sofia AI listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;

    // The router owned the last resource handles; the log worker drains and exits
    if let Err(e) = log_worker.await {
        warn!(error = %e, "Interaction log worker ended abnormally");
    }
    info!("Shutdown complete");
    Ok(())
}

/// Create the parent directory of a file-backed `SQLite` URL
fn ensure_database_dir(database_url: &str) -> Result<()> {
    let Some(path) = database_url.strip_prefix("sqlite:") else {
        return Ok(());
    };
    let path = path.trim_start_matches("//");
    let path = path.split('?').next().unwrap_or(path);
    if path.starts_with(":memory:") || path.is_empty() {
        return Ok(());
    }

    if let Some(parent) = Path::new(path).parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
