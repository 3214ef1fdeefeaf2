use std::sync::Arc;

use aquashop_core::credentials::CredentialCache;
use aquashop_db::DbPool;
use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use chrono::Utc;
use serde::Serialize;
use tracing::{error, info};

#[derive(Clone)]
pub struct HealthState {
    db_pool: DbPool,
    credentials: Arc<CredentialCache>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthCheck {
    pub status: &'static str,
    pub detail: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: HealthCheck,
    pub database: HealthCheck,
    /// Informational; a missing or expired token is fetched on the next event.
    pub catalog_credential: HealthCheck,
    pub checked_at: String,
}

pub fn router(db_pool: DbPool, credentials: Arc<CredentialCache>) -> Router {
    Router::new().route("/health", get(health)).with_state(HealthState { db_pool, credentials })
}

pub async fn spawn(
    bind_address: &str,
    port: u16,
    db_pool: DbPool,
    credentials: Arc<CredentialCache>,
) -> std::io::Result<()> {
    let address = format!("{bind_address}:{port}");
    let listener = tokio::net::TcpListener::bind(&address).await?;

    info!(
        event_name = "system.health.start",
        correlation_id = "bootstrap",
        bind_address = %address,
        "health endpoint started"
    );

    tokio::spawn(async move {
        if let Err(error) = axum::serve(listener, router(db_pool, credentials)).await {
            error!(
                event_name = "system.health.error",
                correlation_id = "bootstrap",
                error = %error,
                "health endpoint server terminated unexpectedly"
            );
        }
    });

    Ok(())
}

pub async fn health(State(state): State<HealthState>) -> (StatusCode, Json<HealthResponse>) {
    let database = database_check(&state.db_pool).await;
    let ready = database.status == "ready";

    let payload = HealthResponse {
        status: if ready { "ready" } else { "degraded" },
        service: HealthCheck {
            status: "ready",
            detail: "aquashop-server runtime initialized".to_string(),
        },
        database,
        catalog_credential: credential_check(&state.credentials).await,
        checked_at: Utc::now().to_rfc3339(),
    };

    let status_code = if ready { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (status_code, Json(payload))
}

async fn database_check(pool: &DbPool) -> HealthCheck {
    match sqlx::query_scalar::<_, i64>("SELECT 1").fetch_one(pool).await {
        Ok(_) => HealthCheck { status: "ready", detail: "database query succeeded".to_string() },
        Err(error) => {
            HealthCheck { status: "degraded", detail: format!("database query failed: {error}") }
        }
    }
}

async fn credential_check(credentials: &CredentialCache) -> HealthCheck {
    match credentials.expires_at().await {
        Some(expires_at) if expires_at > Utc::now() => HealthCheck {
            status: "ready",
            detail: format!("token valid until {}", expires_at.to_rfc3339()),
        },
        Some(expires_at) => HealthCheck {
            status: "stale",
            detail: format!("token expired at {}", expires_at.to_rfc3339()),
        },
        None => HealthCheck { status: "pending", detail: "no token fetched yet".to_string() },
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use aquashop_core::catalog::InMemoryCatalog;
    use aquashop_core::credentials::CredentialCache;
    use aquashop_db::connect_with_settings;
    use axum::{body::Body, extract::State, http::Request, http::StatusCode, Json};
    use tower::ServiceExt;

    use crate::health::{health, router, HealthState};

    fn credentials() -> Arc<CredentialCache> {
        Arc::new(CredentialCache::new(Arc::new(InMemoryCatalog::new())))
    }

    #[tokio::test]
    async fn health_returns_ready_when_database_is_reachable() {
        let pool = connect_with_settings("sqlite::memory:?cache=shared", 1, 5)
            .await
            .expect("pool should connect");
        let credentials = credentials();

        let (status, Json(payload)) =
            health(State(HealthState { db_pool: pool.clone(), credentials: credentials.clone() }))
                .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(payload.status, "ready");
        assert_eq!(payload.database.status, "ready");
        assert_eq!(payload.catalog_credential.status, "pending");

        credentials.get_valid_token().await.expect("token");
        let (_, Json(after_fetch)) =
            health(State(HealthState { db_pool: pool.clone(), credentials })).await;
        assert_eq!(after_fetch.catalog_credential.status, "ready");

        pool.close().await;
    }

    #[tokio::test]
    async fn health_returns_service_unavailable_when_database_is_unavailable() {
        let pool = connect_with_settings("sqlite::memory:?cache=shared", 1, 5)
            .await
            .expect("pool should connect");
        pool.close().await;

        let (status, Json(payload)) =
            health(State(HealthState { db_pool: pool, credentials: credentials() })).await;

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(payload.status, "degraded");
        assert_eq!(payload.database.status, "degraded");
        assert_eq!(payload.service.status, "ready");
    }

    #[tokio::test]
    async fn router_serves_health_route() {
        let pool = connect_with_settings("sqlite::memory:", 1, 5).await.expect("pool should connect");

        let response = router(pool, credentials())
            .oneshot(Request::builder().uri("/health").body(Body::empty()).expect("request"))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
    }
}
