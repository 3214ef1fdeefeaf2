use async_trait::async_trait;
use thiserror::Error;

use aquashop_core::domain::session::{Session, UserId};

pub mod memory;
pub mod session;

pub use memory::InMemorySessionRepository;
pub use session::SqlSessionRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
}

/// Per-user dialogue position. Absence is reported as `None`; callers treat it
/// as a fresh session in MENU.
#[async_trait]
pub trait SessionRepository: Send + Sync {
    async fn get_state(&self, user_id: &UserId) -> Result<Option<Session>, RepositoryError>;
    async fn set_state(&self, session: &Session) -> Result<(), RepositoryError>;

    async fn load_or_default(&self, user_id: &UserId) -> Result<Session, RepositoryError> {
        Ok(self.get_state(user_id).await?.unwrap_or_else(|| Session::new(user_id.clone())))
    }
}
