use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::product::ProductId;
use crate::flows::states::{DialogueState, TransitionOutcome};

/// Opaque identity of a chat user as delivered by the transport.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UserId(pub String);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Persisted dialogue position of one user.
///
/// `pending_product_id` only carries a value while `state` is
/// [`DialogueState::Description`]; [`Session::advance`] clears it on every
/// transition that leaves that state.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub user_id: UserId,
    pub state: DialogueState,
    pub pending_product_id: Option<ProductId>,
}

impl Session {
    pub fn new(user_id: UserId) -> Self {
        Self { user_id, state: DialogueState::Menu, pending_product_id: None }
    }

    /// Rebuilds a session from its stored textual form. Missing or unknown
    /// state tags resolve to [`DialogueState::Menu`].
    pub fn restore(
        user_id: UserId,
        stored_state: Option<&str>,
        pending_product_id: Option<String>,
    ) -> Self {
        let state = DialogueState::from_stored(stored_state);
        let pending_product_id = match state {
            DialogueState::Description => pending_product_id.map(ProductId),
            _ => None,
        };
        Self { user_id, state, pending_product_id }
    }

    /// Applies the result of a handled event and returns the session to persist.
    pub fn advance(&self, outcome: &TransitionOutcome) -> Self {
        let pending_product_id = match outcome.to {
            DialogueState::Description => outcome.pending_product_id.clone(),
            _ => None,
        };
        Self { user_id: self.user_id.clone(), state: outcome.to, pending_product_id }
    }

    pub fn state_tag(&self) -> &'static str {
        self.state.as_tag()
    }
}

#[cfg(test)]
mod tests {
    use super::{Session, UserId};
    use crate::domain::product::ProductId;
    use crate::flows::states::{DialogueEvent, DialogueState, TransitionOutcome};

    fn user() -> UserId {
        UserId("1001".to_owned())
    }

    #[test]
    fn absent_state_restores_as_menu() {
        let session = Session::restore(user(), None, None);
        assert_eq!(session, Session::new(user()));
    }

    #[test]
    fn unknown_state_tag_fails_open_to_menu() {
        let session = Session::restore(user(), Some("HANDLE_CHECKOUT"), Some("p1".to_owned()));
        assert_eq!(session.state, DialogueState::Menu);
        assert_eq!(session.pending_product_id, None);
    }

    #[test]
    fn pending_product_is_restored_only_in_description() {
        let described = Session::restore(user(), Some("DESCRIPTION"), Some("p1".to_owned()));
        assert_eq!(described.pending_product_id, Some(ProductId("p1".to_owned())));

        let in_cart = Session::restore(user(), Some("CART"), Some("p1".to_owned()));
        assert_eq!(in_cart.pending_product_id, None);
    }

    #[test]
    fn leaving_description_clears_pending_product() {
        let session = Session {
            user_id: user(),
            state: DialogueState::Description,
            pending_product_id: Some(ProductId("p1".to_owned())),
        };
        let outcome = TransitionOutcome {
            from: DialogueState::Description,
            to: DialogueState::Cart,
            event: DialogueEvent::OpenCart,
            actions: Vec::new(),
            pending_product_id: Some(ProductId("p1".to_owned())),
        };

        let next = session.advance(&outcome);
        assert_eq!(next.state, DialogueState::Cart);
        assert_eq!(next.pending_product_id, None);
        assert_eq!(next.state_tag(), "CART");
    }
}
