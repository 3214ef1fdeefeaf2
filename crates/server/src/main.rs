mod bootstrap;
mod health;
mod telegram;

use anyhow::Result;
use aquashop_core::config::{AppConfig, LoadOptions};

fn init_logging(config: &AppConfig) {
    use aquashop_core::config::LogFormat::*;
    use tracing::Level;

    let log_level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);

    match config.logging.format {
        Compact => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).compact().init();
        }
        Pretty => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).pretty().init();
        }
        Json => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).json().init();
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    run().await
}

pub async fn run() -> Result<()> {
    // A missing .env file is fine; real environment variables still apply.
    dotenvy::dotenv().ok();

    let config = AppConfig::load(LoadOptions::default())?;
    init_logging(&config);

    let app = bootstrap::bootstrap_with_config(config).await?;

    health::spawn(
        &app.config.server.bind_address,
        app.config.server.health_check_port,
        app.db_pool.clone(),
        app.credentials.clone(),
    )
    .await?;

    tracing::info!(
        event_name = "system.server.started",
        correlation_id = "bootstrap",
        max_active_users = app.config.dispatch.max_active_users,
        "aquashop-server started"
    );

    // A runner that gave up on Telegram ends the process non-zero, after the
    // lanes have drained, so a supervisor can restart it.
    let outcome: Result<()> = tokio::select! {
        result = app.runner.start() => result.map_err(anyhow::Error::from),
        result = wait_for_shutdown() => result,
    };

    tracing::info!(
        event_name = "system.server.stopping",
        correlation_id = "shutdown",
        runner_failed = outcome.is_err(),
        "aquashop-server stopping; draining user lanes"
    );
    app.lanes.wait_idle().await;
    app.db_pool.close().await;

    outcome
}

async fn wait_for_shutdown() -> Result<()> {
    tokio::signal::ctrl_c().await?;
    Ok(())
}
