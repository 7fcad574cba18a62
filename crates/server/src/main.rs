mod audit;
mod bootstrap;
mod health;
mod service;

use anyhow::Result;
use raidbook_core::config::{AppConfig, LoadOptions};

fn init_logging(config: &AppConfig) {
    use raidbook_core::config::LogFormat::*;
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
    let config = AppConfig::load(LoadOptions::default())?;
    init_logging(&config);

    let app = bootstrap::bootstrap_with_config(config).await?;

    health::spawn(
        &app.config.server.bind_address,
        app.config.server.health_check_port,
        app.db_pool.clone(),
    )
    .await?;

    tracing::info!(
        event_name = "system.server.slack_transport_mode",
        transport_mode = app.slack_runner.transport_mode(),
        correlation_id = "bootstrap",
        "slack runner transport mode initialized"
    );

    tracing::info!(
        event_name = "system.server.started",
        correlation_id = "bootstrap",
        "raidbook-server started"
    );

    tokio::select! {
        result = app.slack_runner.start() => {
            result?;
            tracing::warn!(
                event_name = "system.server.slack_runner_stopped",
                correlation_id = "shutdown",
                "slack runner stopped; waiting for shutdown signal"
            );
            wait_for_shutdown().await?;
        }
        result = wait_for_shutdown() => result?,
    }

    tracing::info!(
        event_name = "system.server.stopping",
        correlation_id = "shutdown",
        "raidbook-server stopping"
    );
    app.db_pool.close().await;

    Ok(())
}

async fn wait_for_shutdown() -> Result<()> {
    tokio::signal::ctrl_c().await?;
    Ok(())
}
