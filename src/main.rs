mod bot;
mod config;
mod platform;
mod registry;
mod replies;
mod scheduler;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::bot::AppState;
use crate::config::Config;
use crate::platform::line::LineClient;
use crate::platform::Messenger;
use crate::registry::RecipientRegistry;
use crate::scheduler::broadcast::{BroadcastJob, BroadcastSchedule, Broadcaster};
use crate::scheduler::tasks::register_builtin_tasks;
use crate::scheduler::Scheduler;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,lusmall=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("config.toml"));

    info!("Loading configuration from: {}", config_path.display());
    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;

    let tz = config.broadcast.timezone()?;
    let times = config.broadcast.trigger_times()?;

    info!("Configuration loaded successfully");
    info!("  Listen: {}", config.listen_addr());
    info!("  Addressing: {}", config.registry.addressing);
    info!(
        "  Broadcast: {:?} ({}), polled on '{}'",
        config.broadcast.times, tz, config.broadcast.poll_cron
    );
    if config.uses_placeholder_credentials() {
        warn!(
            "LINE credentials are placeholders; set LINE_CHANNEL_ACCESS_TOKEN and LINE_CHANNEL_SECRET"
        );
    }

    let messenger: Arc<dyn Messenger> =
        Arc::new(LineClient::new(&config.line, config.http.timeout())?);
    let registry = RecipientRegistry::new();

    // Broadcast scheduler
    let broadcast = Arc::new(BroadcastJob::new(
        BroadcastSchedule::new(tz, &times, Utc::now()),
        Broadcaster::new(registry.clone(), messenger.clone()),
    ));
    let scheduler = Scheduler::new().await?;
    register_builtin_tasks(&scheduler, &config.broadcast.poll_cron, broadcast).await?;
    scheduler.start().await?;

    // Webhook server
    let state = Arc::new(AppState::new(
        config.line.channel_secret.clone(),
        config.registry.addressing,
        registry,
        messenger,
    ));
    let app = bot::router(state);

    let addr = config.listen_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {addr}"))?;

    info!("Bot is listening on {}", addr);
    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}
