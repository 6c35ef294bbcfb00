#![forbid(unsafe_code)]
#![warn(clippy::pedantic)]
// easier to use when using the functions as callback of foreign functions
#![allow(clippy::needless_pass_by_value)]

use anyhow::Context;
use anyhow::Result;
use axum::Extension;
use axum::Router;
use tokio::net::TcpListener;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing_subscriber::prelude::*;

use crate::api::router;
use crate::assets::Assets;
use crate::broadcaster::Broadcaster;
use crate::config::Config;
use crate::repository::Reminders;
use crate::scheduler::Lifecycle;
use crate::scheduler::Scheduler;
use crate::storage::FileStore;

mod api;
mod assets;
mod broadcaster;
mod config;
mod graceful_shutdown;
mod reminder;
mod repository;
mod scheduler;
mod storage;
mod utils;

const DEFAULT_RUST_LOG: &str = "nudge=debug,tower_http=debug";

#[tokio::main]
async fn main() -> Result<()> {
    setup_environment();
    setup_tracing();

    let config = Config::from_env()?;

    let app = setup_app(&config)?;

    let listener = TcpListener::bind(config.address).await?;
    tracing::info!("Listening on {}", config.address);

    axum::serve(listener, app.router)
        .with_graceful_shutdown(graceful_shutdown::handler())
        .await?;

    Ok(())
}

/// The wired-up application
pub struct App {
    /// All HTTP and WebSocket routes
    pub router: Router,

    /// The due check, also driven directly by tests
    #[cfg_attr(not(test), expect(dead_code))]
    pub scheduler: Scheduler,

    /// Where due reminders are published
    #[cfg_attr(not(test), expect(dead_code))]
    pub broadcaster: Broadcaster,
}

/// Create and setup the app with its dependencies
///
/// The scheduler is not started here, that happens when the first client subscribes
///
/// # Errors
///
/// Will return `Err` if the audio directories can not be created
pub fn setup_app(config: &Config) -> Result<App> {
    tracing::debug!("Using config: {config:?}");

    let assets = Assets::new(&config.default_audio_folder, &config.upload_folder)
        .context("Could not create audio folders")?;

    let reminders = Reminders::new(FileStore::new(&config.data_file), assets.clone());
    let broadcaster = Broadcaster::new();
    let scheduler = Scheduler::new(reminders.clone(), broadcaster.clone(), config.tick_interval);
    let lifecycle = Lifecycle::new(scheduler.clone());

    let router = Router::new()
        .merge(router())
        .fallback_service(ServeDir::new(&config.static_folder))
        .layer(TraceLayer::new_for_http())
        .layer(Extension(reminders))
        .layer(Extension(assets))
        .layer(Extension(broadcaster.clone()))
        .layer(Extension(lifecycle));

    Ok(App {
        router,
        scheduler,
        broadcaster,
    })
}

fn setup_environment() {
    dotenvy::dotenv().ok();
}

fn setup_tracing() {
    use tracing_subscriber::EnvFilter;
    use tracing_subscriber::fmt;
    use tracing_subscriber::registry;

    registry()
        .with(EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| DEFAULT_RUST_LOG.into()),
        ))
        .with(fmt::layer())
        .init();
}
