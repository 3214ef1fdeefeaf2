use crate::domain::product::ProductId;
use crate::flows::states::{
    parse_quantity, DialogueAction, DialogueContext, DialogueEvent, DialogueState,
    TransitionOutcome,
};

pub trait FlowDefinition {
    fn initial_state(&self) -> DialogueState;
    fn transition(
        &self,
        current: DialogueState,
        event: &DialogueEvent,
        context: &DialogueContext,
    ) -> TransitionOutcome;
}

/// The storefront conversation: browse the menu, inspect a product, fill the
/// cart, leave an email at checkout.
#[derive(Clone, Debug, Default)]
pub struct StorefrontFlow;

impl FlowDefinition for StorefrontFlow {
    fn initial_state(&self) -> DialogueState {
        DialogueState::Menu
    }

    fn transition(
        &self,
        current: DialogueState,
        event: &DialogueEvent,
        context: &DialogueContext,
    ) -> TransitionOutcome {
        transition_storefront(current, event, context)
    }
}

pub struct FlowEngine<F> {
    flow: F,
}

impl<F> FlowEngine<F>
where
    F: FlowDefinition,
{
    pub fn new(flow: F) -> Self {
        Self { flow }
    }

    pub fn initial_state(&self) -> DialogueState {
        self.flow.initial_state()
    }

    pub fn apply(
        &self,
        current: DialogueState,
        event: &DialogueEvent,
        context: &DialogueContext,
    ) -> TransitionOutcome {
        self.flow.transition(current, event, context)
    }

    /// Folds a sequence of events over the initial state, carrying the pending
    /// product between steps the way the session store does.
    pub fn replay<'a, I>(&self, events: I) -> (DialogueState, DialogueContext)
    where
        I: IntoIterator<Item = &'a DialogueEvent>,
    {
        let mut state = self.initial_state();
        let mut context = DialogueContext::default();
        for event in events {
            let current = if event.is_start() { self.initial_state() } else { state };
            let outcome = self.apply(current, event, &context);
            context.pending_product_id = match outcome.to {
                DialogueState::Description => outcome.pending_product_id,
                _ => None,
            };
            state = outcome.to;
        }
        (state, context)
    }
}

impl Default for FlowEngine<StorefrontFlow> {
    fn default() -> Self {
        Self::new(StorefrontFlow)
    }
}

fn transition_storefront(
    current: DialogueState,
    event: &DialogueEvent,
    context: &DialogueContext,
) -> TransitionOutcome {
    use DialogueAction::{
        AddToCart, PromptEmail, RegisterCustomer, RemoveIfInCart, RenderCart, RenderMenu,
        ShowProduct,
    };
    use DialogueEvent::{Back, Button, Checkout, OpenCart, Start, Text};
    use DialogueState::{Cart, Description, Menu, WaitingEmail};

    let pending = context.pending_product_id.clone();

    let (to, actions, pending_product_id) = match (current, event) {
        (_, Start) => (Description, vec![RenderMenu], None),

        (Menu, OpenCart) => (Cart, vec![RenderCart], None),
        (Menu, _) => (Description, vec![RenderMenu], None),

        (Description, Back) => (Menu, vec![RenderMenu], None),
        (Description, OpenCart) => (Cart, vec![RenderCart], None),
        (Description, Button(payload)) => match (parse_quantity(payload), pending) {
            (Some(quantity), Some(product_id)) => (
                Description,
                vec![AddToCart { product_id: product_id.clone(), quantity }],
                Some(product_id),
            ),
            (Some(_), None) => (Description, vec![RenderMenu], None),
            (None, _) => {
                let product_id = ProductId(payload.clone());
                (Description, vec![ShowProduct(product_id.clone())], Some(product_id))
            }
        },
        (Description, Checkout | Text(_)) => match pending {
            Some(product_id) => {
                (Description, vec![ShowProduct(product_id.clone())], Some(product_id))
            }
            None => (Description, vec![RenderMenu], None),
        },

        (Cart, Button(payload)) => (
            Cart,
            vec![RemoveIfInCart(ProductId(payload.clone())), RenderCart],
            None,
        ),
        (Cart, Back) => (Menu, vec![RenderMenu], None),
        (Cart, Checkout) => (WaitingEmail, vec![PromptEmail], None),
        (Cart, OpenCart | Text(_)) => (Cart, vec![RenderCart], None),

        (WaitingEmail, Text(email)) => {
            (Menu, vec![RegisterCustomer { email: email.clone() }], None)
        }
        (WaitingEmail, Back) => (Cart, vec![RenderCart], None),
        (WaitingEmail, OpenCart | Checkout | Button(_)) => (WaitingEmail, vec![PromptEmail], None),
    };

    TransitionOutcome { from: current, to, event: event.clone(), actions, pending_product_id }
}
