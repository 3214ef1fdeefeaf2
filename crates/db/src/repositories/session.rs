use chrono::Utc;
use sqlx::Row;
use tracing::debug;

use aquashop_core::domain::session::{Session, UserId};

use super::{RepositoryError, SessionRepository};
use crate::DbPool;

/// Sessions in the `dialogue_sessions` table. The state column holds the
/// textual tag, so rows written by older deployments (`HANDLE_MENU`, ...) and
/// unknown tags still load, resolving to MENU when unrecognized.
pub struct SqlSessionRepository {
    pool: DbPool,
}

impl SqlSessionRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl SessionRepository for SqlSessionRepository {
    async fn get_state(&self, user_id: &UserId) -> Result<Option<Session>, RepositoryError> {
        let row = sqlx::query(
            "SELECT state, pending_product_id FROM dialogue_sessions WHERE user_id = ?",
        )
        .bind(&user_id.0)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let state: String =
            row.try_get("state").map_err(|e| RepositoryError::Decode(e.to_string()))?;
        let pending_product_id: Option<String> = row
            .try_get("pending_product_id")
            .map_err(|e| RepositoryError::Decode(e.to_string()))?;

        Ok(Some(Session::restore(user_id.clone(), Some(&state), pending_product_id)))
    }

    async fn set_state(&self, session: &Session) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO dialogue_sessions (user_id, state, pending_product_id, updated_at)
             VALUES (?, ?, ?, ?)
             ON CONFLICT(user_id) DO UPDATE SET
                 state = excluded.state,
                 pending_product_id = excluded.pending_product_id,
                 updated_at = excluded.updated_at",
        )
        .bind(&session.user_id.0)
        .bind(session.state_tag())
        .bind(session.pending_product_id.as_ref().map(|id| id.0.as_str()))
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;

        debug!(
            event_name = "session.state_persisted",
            user_id = %session.user_id,
            state = session.state_tag(),
            "dialogue session persisted"
        );
        Ok(())
    }
}
