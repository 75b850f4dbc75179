mod errors;
mod layers;
mod models;
mod routers;
mod services;
mod utils;

use crate::routers::router;
use crate::services::accounts::AccountService;
use crate::services::invites::InviteService;
use crate::services::media::JellyfinClient;
use crate::services::notifier::Notifier;
use crate::services::ombi::OmbiClient;
use clap::Parser;
use services::states::LobbyState;
use services::states::config::AppConfig;
use services::states::db::DataBaseState;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[cfg(all(target_os = "windows", feature = "alternative-allocator"))]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[cfg(all(
    any(
        target_os = "linux",
        target_os = "macos",
        target_os = "freebsd",
        target_os = "openbsd",
        target_os = "netbsd"
    ),
    feature = "alternative-allocator"
))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

fn tracing_init(level: &str) {
    use std::io::stdout;
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::{EnvFilter, Layer};
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_writer(stdout)
        .with_filter(EnvFilter::new(level));
    tracing_subscriber::registry().with(fmt_layer).init();
}

#[cfg_attr(test, ctor::ctor)]
fn init() {
    tracing_init("info,lobby=debug");
}

pub mod shadow {
    use shadow_rs::shadow;
    shadow!(build_info);
}

#[derive(clap::Parser, Debug)]
#[clap(
    name = "lobby",
    version = shadow::build_info::VERSION,
    long_version = shadow::build_info::CLAP_LONG_VERSION
)]
pub struct Cli {
    #[clap(short, long, help = "Path to config file", default_value = "lobby.toml")]
    config: String,
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};
        match (
            signal(SignalKind::interrupt()),
            signal(SignalKind::terminate()),
        ) {
            (Ok(mut sigint), Ok(mut sigterm)) => {
                tokio::select! {
                    _ = sigint.recv() => {},
                    _ = sigterm.recv() => {},
                }
            }
            (Err(e), _) | (_, Err(e)) => {
                tracing::error!("Failed to install signal handlers: {}", e);
                futures::future::pending::<()>().await;
            }
        }
    }
    #[cfg(windows)]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
    #[cfg(not(any(unix, windows)))]
    {
        tracing::warn!("Graceful shutdown is not supported on this platform.");
        futures::future::pending::<()>().await;
    }
    tracing::warn!("Received shutdown signal, shutting down gracefully...");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = Arc::new(AppConfig::load(&cli.config)?);
    tracing_init(&config.common.log_level);
    let sqlx_opt = SqliteConnectOptions::from_str(&config.db.db_url)?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal);
    let sqlx_pool = SqlitePoolOptions::new()
        .max_connections(config.db.sqlite_connection_nums)
        .connect_with(sqlx_opt)
        .await?;
    let db = DataBaseState::new(sqlx_pool);
    #[cfg(feature = "migrate")]
    {
        tracing::info!("Preparing to run embed migrations...");
        db.migrate().await.inspect_err(|e| {
            tracing::error!("Failed to run migrations: {}", e);
        })?;
        tracing::info!("Migrations completed successfully.");
    }
    let state = Arc::new(LobbyState::new(db, config.clone()));
    tracing::info!("Initializing runtime settings...");
    let seeded = state.settings.initialise().await?;
    tracing::debug!("Seeded {} runtime setting(s) with defaults", seeded);

    let media = Arc::new(JellyfinClient::new(&config.jellyfin)?);
    let ombi = Arc::new(OmbiClient::new(&config.ombi)?);
    let notifier = Notifier::new(services::mailer::create_mailer(&config.smtp)?);
    let invites = Arc::new(InviteService::new(state.clone(), notifier.clone()));
    let accounts = Arc::new(AccountService::new(
        state.clone(),
        invites.clone(),
        media,
        ombi,
        notifier,
    ));

    let cancel = CancellationToken::new();
    let housekeeping = invites.clone().spawn_housekeeping(
        Duration::from_secs(config.invites.sweep_interval_secs),
        cancel.clone(),
    );

    let addr = format!("{}:{}", config.common.host, config.common.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(
        "Starting server at {}:{}",
        config.common.host,
        config.common.port
    );
    axum::serve(listener, router(state.clone(), invites, accounts))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    cancel.cancel();
    if let Some(handle) = housekeeping {
        if let Err(e) = handle.await {
            tracing::error!("Housekeeping task ended abnormally: {}", e);
        }
    }
    tracing::info!("Trying to close database connections...");
    match tokio::time::timeout(Duration::from_secs(15), state.db.close_conn()).await {
        Ok(_) => tracing::info!("Database connections closed."),
        Err(_) => tracing::error!("Timed out while closing database connections."),
    }
    Ok(())
}
