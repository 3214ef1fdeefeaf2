use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use aquashop_core::cart::{apply_toggle, summarize, ToggleOutcome};
use aquashop_core::catalog::{CatalogError, CatalogService};
use aquashop_core::credentials::AccessToken;
use aquashop_core::domain::cart::{Cart, CartId};
use aquashop_core::domain::customer::NewCustomer;
use aquashop_core::domain::product::ProductId;
use aquashop_core::domain::session::Session;
use aquashop_core::errors::ApplicationError;
use aquashop_core::flows::{
    DialogueAction, DialogueContext, DialogueEvent, DialogueState, FlowEngine, StorefrontFlow,
    TransitionOutcome,
};
use aquashop_core::messages;

use crate::events::InboundEvent;
use crate::keyboards;
use crate::replies::OutboundMessage;

/// Everything a handler needs for one event. The token was obtained by the
/// dispatcher right before the handler runs.
pub struct HandlerRequest<'a> {
    pub event: &'a InboundEvent,
    pub dialogue_event: &'a DialogueEvent,
    pub session: &'a Session,
    pub token: &'a AccessToken,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HandlerReply {
    pub outcome: TransitionOutcome,
    pub messages: Vec<OutboundMessage>,
}

#[async_trait]
pub trait StateHandler: Send + Sync {
    /// The dialogue state this handler is bound to.
    fn state(&self) -> DialogueState;

    async fn handle(&self, request: HandlerRequest<'_>) -> Result<HandlerReply, ApplicationError>;
}

/// Executes dialogue actions against the catalog and renders the resulting
/// views. Shared by all state handlers.
pub struct Storefront {
    catalog: Arc<dyn CatalogService>,
    engine: FlowEngine<StorefrontFlow>,
}

impl Storefront {
    pub fn new(catalog: Arc<dyn CatalogService>) -> Self {
        Self { catalog, engine: FlowEngine::default() }
    }

    async fn respond(
        &self,
        state: DialogueState,
        request: HandlerRequest<'_>,
    ) -> Result<HandlerReply, ApplicationError> {
        let context =
            DialogueContext { pending_product_id: request.session.pending_product_id.clone() };
        let outcome = self.engine.apply(state, request.dialogue_event, &context);

        let mut replies = Vec::with_capacity(outcome.actions.len());
        for action in &outcome.actions {
            if let Some(reply) = self.perform(action, &request).await? {
                replies.push(reply);
            }
        }

        Ok(HandlerReply { outcome, messages: replies })
    }

    async fn perform(
        &self,
        action: &DialogueAction,
        request: &HandlerRequest<'_>,
    ) -> Result<Option<OutboundMessage>, CatalogError> {
        let event = request.event;
        let token = request.token;
        let cart_id = CartId::from(&event.user_id);

        match action {
            DialogueAction::RenderMenu => {
                let products = self.catalog.list_products(token).await?;
                Ok(Some(
                    OutboundMessage::text(
                        event.chat_id,
                        messages::welcome_text(event.first_name.as_deref()),
                    )
                    .keyboard(keyboards::menu_keyboard(&products)),
                ))
            }
            DialogueAction::ShowProduct(product_id) => {
                self.product_view(token, product_id, event).await.map(Some)
            }
            DialogueAction::AddToCart { product_id, quantity } => {
                let product = self.catalog.get_product(token, product_id).await?;
                self.catalog.add_cart_item(token, &cart_id, product_id, *quantity).await?;
                Ok(Some(OutboundMessage::text(
                    event.chat_id,
                    messages::added_to_cart(&product, *quantity),
                )))
            }
            DialogueAction::RemoveIfInCart(product_id) => {
                let outcome =
                    apply_toggle(self.catalog.as_ref(), token, &cart_id, product_id).await?;
                debug!(
                    user_id = %event.user_id,
                    product_id = %product_id,
                    removed = matches!(outcome, ToggleOutcome::Removed(_)),
                    "cart toggle applied"
                );
                Ok(None)
            }
            DialogueAction::RenderCart => self.cart_view(token, &cart_id, event).await.map(Some),
            DialogueAction::PromptEmail => Ok(Some(
                OutboundMessage::text(
                    event.chat_id,
                    messages::email_prompt(event.first_name.as_deref()),
                )
                .keyboard(keyboards::email_keyboard()),
            )),
            DialogueAction::RegisterCustomer { email } => {
                let new_customer = NewCustomer { name: event.user_id.0.clone(), email: email.clone() };
                let customer_id = self.catalog.create_customer(token, &new_customer).await?;
                let customer = self.catalog.get_customer(token, &customer_id).await?;
                Ok(Some(
                    OutboundMessage::text(event.chat_id, messages::order_confirmation(&customer))
                        .keyboard(keyboards::confirmation_keyboard()),
                ))
            }
        }
    }

    async fn product_view(
        &self,
        token: &AccessToken,
        product_id: &ProductId,
        event: &InboundEvent,
    ) -> Result<OutboundMessage, CatalogError> {
        let product = self.catalog.get_product(token, product_id).await?;
        let message = OutboundMessage::text(event.chat_id, messages::product_card(&product))
            .keyboard(keyboards::description_keyboard())
            .replacing(event.replaceable_message());

        let Some(image) = product.main_image.as_ref() else {
            return Ok(message);
        };
        match self.catalog.file_link(token, image).await {
            Ok(link) => Ok(message.photo(link)),
            Err(CatalogError::NotFound { .. }) => {
                debug!(product_id = %product_id, "product image is missing; sending text card");
                Ok(message)
            }
            Err(error) => Err(error),
        }
    }

    async fn cart_view(
        &self,
        token: &AccessToken,
        cart_id: &CartId,
        event: &InboundEvent,
    ) -> Result<OutboundMessage, CatalogError> {
        let items = self.catalog.get_cart_items(token, cart_id).await?;
        let totals = self.catalog.get_cart(token, cart_id).await?;
        let cart = Cart::assemble(totals, items);
        let summary = summarize(&cart);
        if let Some(reported) = summary.disagreeing_total(cart.total_price.as_deref()) {
            warn!(
                cart_id = %cart_id.0,
                reported,
                computed = %summary.formatted_total(),
                "catalog cart total differs from its line items"
            );
        }

        let text = if summary.is_empty() {
            format!("{}\n{}", messages::empty_cart_text(), summary.total_line())
        } else {
            summary.render()
        };
        Ok(OutboundMessage::text(event.chat_id, text)
            .keyboard(keyboards::cart_keyboard(&cart.items))
            .replacing(event.replaceable_message()))
    }
}

/// Handler bound to a single dialogue state.
pub struct ViewHandler {
    state: DialogueState,
    storefront: Arc<Storefront>,
}

impl ViewHandler {
    pub fn new(state: DialogueState, storefront: Arc<Storefront>) -> Self {
        Self { state, storefront }
    }
}

#[async_trait]
impl StateHandler for ViewHandler {
    fn state(&self) -> DialogueState {
        self.state
    }

    async fn handle(&self, request: HandlerRequest<'_>) -> Result<HandlerReply, ApplicationError> {
        self.storefront.respond(self.state, request).await
    }
}

/// One handler per dialogue state; lookups are total over the state enum.
pub struct HandlerRegistry {
    menu: Arc<dyn StateHandler>,
    description: Arc<dyn StateHandler>,
    cart: Arc<dyn StateHandler>,
    waiting_email: Arc<dyn StateHandler>,
}

impl HandlerRegistry {
    pub fn new(catalog: Arc<dyn CatalogService>) -> Self {
        let storefront = Arc::new(Storefront::new(catalog));
        let bind = |state: DialogueState| -> Arc<dyn StateHandler> {
            Arc::new(ViewHandler::new(state, storefront.clone()))
        };
        Self {
            menu: bind(DialogueState::Menu),
            description: bind(DialogueState::Description),
            cart: bind(DialogueState::Cart),
            waiting_email: bind(DialogueState::WaitingEmail),
        }
    }

    pub fn resolve(&self, state: DialogueState) -> &dyn StateHandler {
        match state {
            DialogueState::Menu => self.menu.as_ref(),
            DialogueState::Description => self.description.as_ref(),
            DialogueState::Cart => self.cart.as_ref(),
            DialogueState::WaitingEmail => self.waiting_email.as_ref(),
        }
    }

    pub fn handler_count(&self) -> usize {
        DialogueState::ALL.len()
    }
}
