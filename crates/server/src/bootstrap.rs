use std::sync::Arc;

use aquashop_bot::{EventDispatcher, HandlerRegistry, LaneRouter, PollingRunner, ReconnectPolicy};
use aquashop_catalog::ElasticPathClient;
use aquashop_core::catalog::CatalogError;
use aquashop_core::config::{AppConfig, ConfigError, LoadOptions};
use aquashop_core::credentials::CredentialCache;
use aquashop_db::{connect_with_config, migrations, DbPool, SqlSessionRepository};
use thiserror::Error;
use tracing::{info, warn};

use crate::telegram::TelegramTransport;

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub credentials: Arc<CredentialCache>,
    pub lanes: Arc<LaneRouter>,
    pub runner: PollingRunner,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
    #[error("catalog client setup failed: {0}")]
    Catalog(#[source] CatalogError),
    #[error("telegram transport setup failed: {0}")]
    Transport(#[source] reqwest::Error),
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );

    let db_pool =
        connect_with_config(&config.database).await.map_err(BootstrapError::DatabaseConnect)?;
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

    let catalog =
        Arc::new(ElasticPathClient::from_config(&config.catalog).map_err(BootstrapError::Catalog)?);
    let credentials = Arc::new(CredentialCache::new(catalog.clone()));
    match credentials.get_valid_token().await {
        Ok(_) => info!(
            event_name = "system.bootstrap.credential_ready",
            correlation_id = "bootstrap",
            "catalog credential fetched"
        ),
        Err(error) => warn!(
            event_name = "system.bootstrap.credential_ready",
            correlation_id = "bootstrap",
            error = %error,
            "catalog credential unavailable at startup; retrying on first event"
        ),
    }

    let telegram = Arc::new(
        TelegramTransport::from_config(&config.telegram).map_err(BootstrapError::Transport)?,
    );
    let dispatcher = Arc::new(EventDispatcher::new(
        Arc::new(SqlSessionRepository::new(db_pool.clone())),
        credentials.clone(),
        HandlerRegistry::new(catalog),
        telegram.clone(),
    ));
    let lanes = Arc::new(LaneRouter::new(dispatcher, config.dispatch.max_active_users));
    let runner = PollingRunner::new(telegram, lanes.clone(), ReconnectPolicy::default());

    Ok(Application { config, db_pool, credentials, lanes, runner })
}

#[cfg(test)]
mod tests {
    use aquashop_core::config::{ConfigOverrides, LoadOptions};

    use crate::bootstrap::bootstrap;

    #[tokio::test]
    async fn bootstrap_fails_fast_with_malformed_telegram_token() {
        let result = bootstrap(LoadOptions {
            overrides: ConfigOverrides {
                database_url: Some("sqlite::memory:".to_string()),
                telegram_bot_token: Some("not-a-bot-token".to_string()),
                catalog_client_id: Some("client".to_string()),
                catalog_client_secret: Some("secret".to_string()),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        })
        .await;

        let message = result.err().expect("error").to_string();
        assert!(message.contains("telegram.bot_token"));
    }

    #[tokio::test]
    async fn bootstrap_prepares_session_schema_even_when_catalog_is_unreachable() {
        let app = bootstrap(LoadOptions {
            overrides: ConfigOverrides {
                database_url: Some("sqlite::memory:?cache=shared".to_string()),
                telegram_bot_token: Some("123456:test-token".to_string()),
                catalog_base_url: Some("http://127.0.0.1:9".to_string()),
                catalog_client_id: Some("client".to_string()),
                catalog_client_secret: Some("secret".to_string()),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        })
        .await
        .expect("bootstrap should succeed with valid overrides");

        let (table_count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'dialogue_sessions'",
        )
        .fetch_one(&app.db_pool)
        .await
        .expect("session table lookup");
        assert_eq!(table_count, 1);
        assert_eq!(app.credentials.expires_at().await, None);
        assert_eq!(app.lanes.active_lanes().await, 0);

        app.db_pool.close().await;
    }
}
