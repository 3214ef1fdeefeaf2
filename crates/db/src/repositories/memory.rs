use std::collections::HashMap;

use tokio::sync::RwLock;

use aquashop_core::domain::session::{Session, UserId};

use super::{RepositoryError, SessionRepository};

#[derive(Default)]
pub struct InMemorySessionRepository {
    sessions: RwLock<HashMap<UserId, Session>>,
}

impl InMemorySessionRepository {
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}

#[async_trait::async_trait]
impl SessionRepository for InMemorySessionRepository {
    async fn get_state(&self, user_id: &UserId) -> Result<Option<Session>, RepositoryError> {
        let sessions = self.sessions.read().await;
        Ok(sessions.get(user_id).cloned())
    }

    async fn set_state(&self, session: &Session) -> Result<(), RepositoryError> {
        let mut sessions = self.sessions.write().await;
        sessions.insert(session.user_id.clone(), session.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use aquashop_core::domain::product::ProductId;
    use aquashop_core::domain::session::{Session, UserId};
    use aquashop_core::flows::DialogueState;

    use super::InMemorySessionRepository;
    use crate::repositories::SessionRepository;

    #[tokio::test]
    async fn absent_user_loads_as_fresh_menu_session() {
        let repo = InMemorySessionRepository::default();
        let user = UserId("42".to_string());

        assert_eq!(repo.get_state(&user).await.expect("get"), None);
        let session = repo.load_or_default(&user).await.expect("load");
        assert_eq!(session.state, DialogueState::Menu);
        assert!(repo.is_empty().await);
    }

    #[tokio::test]
    async fn set_state_overwrites_previous_value() {
        let repo = InMemorySessionRepository::default();
        let user = UserId("42".to_string());

        let mut session = Session::new(user.clone());
        session.state = DialogueState::Description;
        session.pending_product_id = Some(ProductId("p1".to_string()));
        repo.set_state(&session).await.expect("first save");

        session.state = DialogueState::Cart;
        session.pending_product_id = None;
        repo.set_state(&session).await.expect("second save");

        assert_eq!(repo.get_state(&user).await.expect("get"), Some(session));
        assert_eq!(repo.len().await, 1);
    }
}
