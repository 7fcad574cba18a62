use std::sync::Arc;

use raidbook_core::config::{AppConfig, ConfigError};
use raidbook_core::items::{CatalogError, ItemCatalog};
use raidbook_db::{connect_with_settings, migrations, DbPool, SqlRaidRepository};
use raidbook_slack::events::raid_dispatcher;
use raidbook_slack::socket::{ReconnectPolicy, SocketModeRunner};
use raidbook_slack::socket_mode::SlackSocketTransport;
use raidbook_slack::web::ReqwestSlackClient;
use thiserror::Error;
use tracing::info;

use crate::audit::TracingAuditSink;
use crate::service::RaidService;

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub slack_runner: SocketModeRunner,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );

    let db_pool = connect_with_settings(
        &config.database.url,
        config.database.max_connections,
        config.database.timeout_secs,
    )
    .await
    .map_err(BootstrapError::DatabaseConnect)?;
    info!(
        event_name = "system.bootstrap.database_connected",
        correlation_id = "bootstrap",
        "database connection established"
    );

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(
        event_name = "system.bootstrap.migrations_applied",
        correlation_id = "bootstrap",
        "database migrations applied"
    );

    let catalog = match &config.items.catalog_path {
        Some(path) => ItemCatalog::load(path)?,
        None => ItemCatalog::default(),
    };
    info!(
        event_name = "system.bootstrap.catalog_loaded",
        correlation_id = "bootstrap",
        item_count = catalog.len(),
        "item catalog loaded"
    );

    let service = Arc::new(RaidService::new(
        Arc::new(SqlRaidRepository::new(db_pool.clone())),
        Arc::new(ReqwestSlackClient::new(config.slack.bot_token.clone())),
        Arc::new(catalog),
        Arc::new(TracingAuditSink),
        config.raid.clone(),
    ));
    let slack_runner = SocketModeRunner::new(
        Arc::new(SlackSocketTransport::new(config.slack.app_token.clone())),
        raid_dispatcher(service),
        ReconnectPolicy::default(),
    );

    Ok(Application { config, db_pool, slack_runner })
}
