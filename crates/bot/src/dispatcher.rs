use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use aquashop_core::credentials::CredentialCache;
use aquashop_core::domain::session::Session;
use aquashop_core::errors::ApplicationError;
use aquashop_core::flows::{DialogueState, TransitionOutcome};
use aquashop_db::{RepositoryError, SessionRepository};

use crate::events::{InboundEvent, InboundHandler};
use crate::handlers::{HandlerRegistry, HandlerRequest};
use crate::replies::ReplySink;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DispatchOutcome {
    Transitioned { from: DialogueState, to: DialogueState },
    /// The event was discarded and the stored session left untouched.
    Dropped { error_class: &'static str },
}

/// Runs one inbound event through load, token check, handler, delivery and
/// persist. The session is written only after every reply went out.
pub struct EventDispatcher {
    sessions: Arc<dyn SessionRepository>,
    credentials: Arc<CredentialCache>,
    registry: HandlerRegistry,
    replies: Arc<dyn ReplySink>,
}

impl EventDispatcher {
    pub fn new(
        sessions: Arc<dyn SessionRepository>,
        credentials: Arc<CredentialCache>,
        registry: HandlerRegistry,
        replies: Arc<dyn ReplySink>,
    ) -> Self {
        Self { sessions, credentials, registry, replies }
    }

    pub async fn dispatch(&self, event: &InboundEvent) -> DispatchOutcome {
        let context = event.context();
        match self.process(event).await {
            Ok(outcome) => {
                info!(
                    event_name = "dialogue.transition_applied",
                    user_id = %event.user_id,
                    correlation_id = %context.correlation_id,
                    payload_kind = event.payload.kind(),
                    from = %outcome.from,
                    to = %outcome.to,
                    "dialogue transition applied"
                );
                DispatchOutcome::Transitioned { from: outcome.from, to: outcome.to }
            }
            Err(error) => {
                warn!(
                    event_name = "dialogue.event_dropped",
                    user_id = %event.user_id,
                    correlation_id = %context.correlation_id,
                    payload_kind = event.payload.kind(),
                    error_class = error.error_class(),
                    transient = error.is_transient(),
                    error = %error,
                    "event dropped; session state unchanged"
                );
                DispatchOutcome::Dropped { error_class: error.error_class() }
            }
        }
    }

    async fn process(&self, event: &InboundEvent) -> Result<TransitionOutcome, ApplicationError> {
        let dialogue_event = event.dialogue_event();
        let session = if dialogue_event.is_start() {
            Session::new(event.user_id.clone())
        } else {
            self.sessions.load_or_default(&event.user_id).await.map_err(persistence)?
        };

        let token = self.credentials.get_valid_token().await?;
        let reply = self
            .registry
            .resolve(session.state)
            .handle(HandlerRequest {
                event,
                dialogue_event: &dialogue_event,
                session: &session,
                token: &token,
            })
            .await?;

        for message in &reply.messages {
            self.replies
                .deliver(message)
                .await
                .map_err(|error| ApplicationError::Delivery(error.to_string()))?;
        }

        self.sessions.set_state(&session.advance(&reply.outcome)).await.map_err(persistence)?;
        Ok(reply.outcome)
    }
}

fn persistence(error: RepositoryError) -> ApplicationError {
    ApplicationError::Persistence(error.to_string())
}

#[async_trait]
impl InboundHandler for EventDispatcher {
    async fn handle(&self, event: InboundEvent) {
        self.dispatch(&event).await;
    }
}
