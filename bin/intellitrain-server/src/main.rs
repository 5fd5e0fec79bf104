//! intellitrain-server entry point.
//!
//! Startup order:
//! 1. Configuration from environment variables, then command-line overrides.
//! 2. Structured tracing (JSON or pretty, optional daily log file).
//! 3. SQLite database and migrations; leftover jobs are marked interrupted.
//! 4. Feature extractors.
//! 5. Axum router and HTTP server with graceful shutdown.

use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use intellitrain_server::entities::TaskStore;
use intellitrain_server::{AppState, Config, SqliteStore, build_router};
use tracing::{info, warn};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

#[derive(Debug, Parser)]
#[command(name = "intellitrain-server", version, about = "Audio and image classifier training server")]
struct Args {
    /// Address to listen on; overrides INTELLITRAIN_BIND.
    #[arg(long)]
    bind: Option<String>,

    /// SQLite URL; overrides INTELLITRAIN_DATABASE_URL.
    #[arg(long)]
    database_url: Option<String>,

    /// Emit JSON logs.
    #[arg(long)]
    log_json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── 1. Configuration ───────────────────────────────────────────────────────
    let args = Args::parse();
    let mut cfg = Config::from_env();
    if let Some(bind) = args.bind {
        cfg.bind_address = bind;
    }
    if let Some(url) = args.database_url {
        cfg.database_url = url;
    }
    cfg.log_json |= args.log_json;

    // ── 2. Tracing ─────────────────────────────────────────────────────────────
    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(f) => f,
        Err(_) => match cfg.log_level.parse::<EnvFilter>() {
            Ok(f) => f,
            Err(e) => {
                eprintln!(
                    "WARN: INTELLITRAIN_LOG='{}' is not a valid tracing filter ({}); falling back to 'info'",
                    cfg.log_level, e
                );
                EnvFilter::new("info")
            }
        },
    };

    let stdout_layer = if cfg.log_json {
        fmt::layer().json().with_target(true).with_thread_ids(true).boxed()
    } else {
        fmt::layer().with_target(true).with_thread_ids(true).boxed()
    };

    // The guard must live until shutdown so buffered lines are flushed.
    let (file_layer, _log_guard) = match &cfg.log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "intellitrain-server.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (Some(fmt::layer().json().with_ansi(false).with_writer(writer)), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(stdout_layer)
        .with(file_layer)
        .init();

    info!(version = env!("CARGO_PKG_VERSION"), "intellitrain-server starting");

    // ── 3. Database ────────────────────────────────────────────────────────────
    let store = SqliteStore::connect(&cfg.database_url).await?;
    let interrupted = store.interrupt_running_tasks().await?;
    if interrupted > 0 {
        warn!(count = interrupted, "marked jobs left over from a previous run as interrupted");
    }
    info!(database_url = %cfg.database_url, "database ready");

    // ── 4. Feature extractors ──────────────────────────────────────────────────
    let state = Arc::new(AppState::new(cfg.clone(), store)?);
    info!(
        audio_extractor = state.embedder.name(),
        image_extractor = state.backbone.name(),
        "feature extractors loaded"
    );

    // ── 5. HTTP server with graceful shutdown ──────────────────────────────────
    let app = build_router(Arc::clone(&state));
    let addr: SocketAddr = cfg.bind_address.parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "HTTP server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("intellitrain-server stopped");
    Ok(())
}

/// Resolves when SIGINT (Ctrl-C) or SIGTERM is received.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to install CTRL+C signal handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut s) => {
                s.recv().await;
            }
            Err(e) => warn!(error = %e, "failed to install SIGTERM handler"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    info!("shutdown signal received; starting graceful shutdown");
}
