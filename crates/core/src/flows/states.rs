use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::domain::product::ProductId;

pub const BACK_PAYLOAD: &str = "back";
pub const CART_PAYLOAD: &str = "cart";
pub const CHECKOUT_PAYLOAD: &str = "checkout";
pub const START_COMMAND: &str = "start";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DialogueState {
    Menu,
    Description,
    Cart,
    WaitingEmail,
}

impl DialogueState {
    pub const ALL: [Self; 4] = [Self::Menu, Self::Description, Self::Cart, Self::WaitingEmail];

    pub fn as_tag(&self) -> &'static str {
        match self {
            Self::Menu => "MENU",
            Self::Description => "DESCRIPTION",
            Self::Cart => "CART",
            Self::WaitingEmail => "WAITING_EMAIL",
        }
    }

    /// Resolves a stored tag, treating both absence and unknown values as the
    /// initial state so a user can never get stuck on a stale tag.
    pub fn from_stored(tag: Option<&str>) -> Self {
        let Some(tag) = tag else {
            return Self::Menu;
        };

        match tag.parse() {
            Ok(state) => state,
            Err(error) => {
                warn!(
                    event_name = "dialogue.unknown_state",
                    stored_tag = tag,
                    error = %error,
                    "stored dialogue state is not recognized; resolving to MENU"
                );
                Self::Menu
            }
        }
    }
}

impl fmt::Display for DialogueState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_tag())
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("unknown dialogue state tag `{0}`")]
pub struct UnknownStateTag(pub String);

impl FromStr for DialogueState {
    type Err = UnknownStateTag;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_uppercase();
        let tag = normalized.strip_prefix("HANDLE_").unwrap_or(&normalized);
        match tag {
            "MENU" => Ok(Self::Menu),
            "DESCRIPTION" => Ok(Self::Description),
            "CART" => Ok(Self::Cart),
            "WAITING_EMAIL" => Ok(Self::WaitingEmail),
            _ => Err(UnknownStateTag(value.to_owned())),
        }
    }
}

/// An inbound user action, classified independently of the current state.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DialogueEvent {
    Start,
    Back,
    OpenCart,
    Checkout,
    /// Any other button payload: a product id or a quantity, depending on state.
    Button(String),
    Text(String),
}

impl DialogueEvent {
    pub fn from_button(payload: &str) -> Self {
        match payload.trim() {
            BACK_PAYLOAD => Self::Back,
            CART_PAYLOAD => Self::OpenCart,
            CHECKOUT_PAYLOAD => Self::Checkout,
            other => Self::Button(other.to_owned()),
        }
    }

    /// `command` is the bare command name, without the leading slash.
    pub fn from_command(command: &str, arguments: &str) -> Self {
        if command.eq_ignore_ascii_case(START_COMMAND) {
            return Self::Start;
        }
        let text = if arguments.is_empty() {
            format!("/{command}")
        } else {
            format!("/{command} {arguments}")
        };
        Self::Text(text)
    }

    pub fn from_text(text: &str) -> Self {
        match split_command(text) {
            Some((command, arguments)) => Self::from_command(command, arguments),
            None => Self::Text(text.trim().to_owned()),
        }
    }

    pub fn is_start(&self) -> bool {
        matches!(self, Self::Start)
    }
}

/// Splits `/name@bot args` into `("name", "args")`. Returns `None` for plain
/// text and for a bare `/`.
pub fn split_command(text: &str) -> Option<(&str, &str)> {
    let rest = text.trim().strip_prefix('/')?;
    let mut parts = rest.splitn(2, char::is_whitespace);
    let head = parts.next().unwrap_or_default();
    let command = head.split('@').next().unwrap_or(head);
    if command.is_empty() {
        return None;
    }
    Some((command, parts.next().unwrap_or_default().trim()))
}

/// Parses a quantity button payload; only positive integers qualify.
pub fn parse_quantity(payload: &str) -> Option<u32> {
    let trimmed = payload.trim();
    if trimmed.is_empty() || !trimmed.bytes().all(|byte| byte.is_ascii_digit()) {
        return None;
    }
    trimmed.parse::<u32>().ok().filter(|quantity| *quantity > 0)
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct DialogueContext {
    pub pending_product_id: Option<ProductId>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DialogueAction {
    RenderMenu,
    ShowProduct(ProductId),
    AddToCart { product_id: ProductId, quantity: u32 },
    RemoveIfInCart(ProductId),
    RenderCart,
    PromptEmail,
    RegisterCustomer { email: String },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionOutcome {
    pub from: DialogueState,
    pub to: DialogueState,
    pub event: DialogueEvent,
    pub actions: Vec<DialogueAction>,
    pub pending_product_id: Option<ProductId>,
}

#[cfg(test)]
mod tests {
    use super::{parse_quantity, split_command, DialogueEvent, DialogueState};

    #[test]
    fn state_tags_round_trip_through_storage_form() {
        for state in DialogueState::ALL {
            assert_eq!(state.as_tag().parse::<DialogueState>(), Ok(state));
        }
    }

    #[test]
    fn legacy_handler_prefixed_tags_are_accepted() {
        assert_eq!("HANDLE_DESCRIPTION".parse::<DialogueState>(), Ok(DialogueState::Description));
        assert_eq!("handle_cart".parse::<DialogueState>(), Ok(DialogueState::Cart));
    }

    #[test]
    fn unknown_stored_tag_resolves_to_menu() {
        assert_eq!(DialogueState::from_stored(Some("SHIPPING")), DialogueState::Menu);
        assert_eq!(DialogueState::from_stored(None), DialogueState::Menu);
    }

    #[test]
    fn reserved_button_payloads_are_classified() {
        assert_eq!(DialogueEvent::from_button("back"), DialogueEvent::Back);
        assert_eq!(DialogueEvent::from_button("cart"), DialogueEvent::OpenCart);
        assert_eq!(DialogueEvent::from_button("checkout"), DialogueEvent::Checkout);
        assert_eq!(DialogueEvent::from_button("p1"), DialogueEvent::Button("p1".to_owned()));
    }

    #[test]
    fn start_command_is_recognized_in_text_form() {
        assert_eq!(DialogueEvent::from_text("/start"), DialogueEvent::Start);
        assert_eq!(DialogueEvent::from_text("/start@aquashop_bot"), DialogueEvent::Start);
        assert_eq!(DialogueEvent::from_text(" /start deep-link "), DialogueEvent::Start);
        assert_eq!(DialogueEvent::from_text("/help"), DialogueEvent::Text("/help".to_owned()));
        assert_eq!(
            DialogueEvent::from_text("buyer@example.com"),
            DialogueEvent::Text("buyer@example.com".to_owned())
        );
    }

    #[test]
    fn commands_drop_slash_and_bot_suffix() {
        assert_eq!(split_command("/start@aquashop_bot promo"), Some(("start", "promo")));
        assert_eq!(split_command("/help"), Some(("help", "")));
        assert_eq!(split_command("hello"), None);
        assert_eq!(split_command("/"), None);
    }

    #[test]
    fn quantities_must_be_positive_integers() {
        assert_eq!(parse_quantity("5"), Some(5));
        assert_eq!(parse_quantity(" 10 "), Some(10));
        assert_eq!(parse_quantity("0"), None);
        assert_eq!(parse_quantity("-1"), None);
        assert_eq!(parse_quantity("p1"), None);
        assert_eq!(parse_quantity("+3"), None);
    }
}
