//! Entitlement server binary.
//!
//! Usage:
//!   entitle-server --port 6699 --db entitle.db

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use entitle_license::LicenseEngine;
use entitle_notify::{LogMailer, Mailer, QueueConfig, SendQueue};
use entitle_server::{AppState, build_router};
use entitle_store::{Store, StoreConfig};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "entitle-server")]
#[command(about = "License issuance, activation and usage server")]
struct Args {
    /// HTTP port to listen on
    #[arg(short, long, env = "ENTITLE_PORT", default_value = "6699")]
    port: u16,

    /// Path to the SQLite database
    #[arg(long, env = "ENTITLE_DB", default_value = "entitle.db")]
    db: PathBuf,

    /// Number of pooled database connections
    #[arg(long, default_value = "4")]
    pool_size: usize,

    /// Milliseconds to wait on a locked database
    #[arg(long, default_value = "5000")]
    busy_timeout_ms: u64,

    /// Shared secret for interop tokens; interop is off when unset
    #[arg(long, env = "ENTITLE_INTEROP_SECRET", hide_env_values = true)]
    interop_secret: Option<String>,

    /// Bearer token for /admin routes; they answer 401 when unset
    #[arg(long, env = "ENTITLE_ADMIN_TOKEN", hide_env_values = true)]
    admin_token: Option<String>,

    /// Enable verbose debug logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let default_level = if args.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();

    info!("entitle-server starting...");

    let store_config = StoreConfig {
        pool_size: args.pool_size,
        busy_timeout: Duration::from_millis(args.busy_timeout_ms),
    };
    let store = Arc::new(
        Store::open(&args.db, &store_config)
            .with_context(|| format!("failed to open database {}", args.db.display()))?,
    );

    let recovered = store
        .recover_interrupted_notify_tasks(Utc::now())
        .context("failed to recover interrupted notification tasks")?;
    if recovered > 0 {
        warn!("Closed {} notification task(s) interrupted by a restart", recovered);
    }

    let interop_enabled = args.interop_secret.is_some();
    let mut engine = LicenseEngine::new(store.clone());
    match args.interop_secret.as_deref() {
        Some(secret) => {
            engine = engine
                .with_interop_secret(secret)
                .context("invalid interop secret")?;
        }
        None => info!("No interop secret configured; interop tokens disabled"),
    }
    if args.admin_token.is_none() {
        warn!("No admin token configured; /admin routes will reject every request");
    }

    let mailer: Arc<dyn Mailer> = Arc::new(LogMailer);
    let queue = SendQueue::new(store, mailer.clone(), QueueConfig::default());

    let state = Arc::new(AppState {
        engine,
        queue,
        mailer,
        admin_token: args.admin_token,
    });
    let app = build_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], args.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    println!("\n========================================");
    println!("  Entitlement Server Running");
    println!("========================================");
    println!("  HTTP:      {}", addr);
    println!("  Database:  {}", args.db.display());
    println!("  Interop:   {}", if interop_enabled { "enabled" } else { "disabled" });
    println!("========================================\n");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("HTTP server failed")?;

    info!("entitle-server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
