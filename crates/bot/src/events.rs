use async_trait::async_trait;

use aquashop_core::domain::session::UserId;
use aquashop_core::flows::{split_command, DialogueEvent};

/// One update from the messaging transport, already reduced to what the
/// dialogue needs.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InboundEvent {
    pub update_id: i64,
    pub user_id: UserId,
    pub first_name: Option<String>,
    pub chat_id: i64,
    pub payload: EventPayload,
    /// Message that carried the pressed button, if any.
    pub origin_message_id: Option<i64>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EventPayload {
    /// `name` has no leading slash and no `@bot` suffix.
    Command { name: String, arguments: String },
    Button { payload: String, callback_id: String },
    Text(String),
}

impl EventPayload {
    /// Classifies a typed chat message as a command or free text.
    pub fn from_message_text(text: String) -> Self {
        match split_command(&text) {
            Some((name, arguments)) => {
                Self::Command { name: name.to_owned(), arguments: arguments.to_owned() }
            }
            None => Self::Text(text),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Command { .. } => "command",
            Self::Button { .. } => "button",
            Self::Text(_) => "text",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EventContext {
    pub correlation_id: String,
}

impl InboundEvent {
    pub fn dialogue_event(&self) -> DialogueEvent {
        match &self.payload {
            EventPayload::Command { name, arguments } => {
                DialogueEvent::from_command(name, arguments)
            }
            EventPayload::Button { payload, .. } => DialogueEvent::from_button(payload),
            EventPayload::Text(text) => DialogueEvent::from_text(text),
        }
    }

    pub fn context(&self) -> EventContext {
        EventContext { correlation_id: self.update_id.to_string() }
    }

    /// Message to replace when the reply re-renders the view the user clicked in.
    pub fn replaceable_message(&self) -> Option<i64> {
        match self.payload {
            EventPayload::Button { .. } => self.origin_message_id,
            _ => None,
        }
    }

    pub fn callback_id(&self) -> Option<&str> {
        match &self.payload {
            EventPayload::Button { callback_id, .. } => Some(callback_id),
            _ => None,
        }
    }
}

/// Consumer of inbound events. Implementations swallow and log their own
/// failures; the transport loop never sees them.
#[async_trait]
pub trait InboundHandler: Send + Sync {
    async fn handle(&self, event: InboundEvent);
}

#[cfg(test)]
mod tests {
    use aquashop_core::domain::session::UserId;
    use aquashop_core::flows::DialogueEvent;

    use super::{EventPayload, InboundEvent};

    fn event(payload: EventPayload) -> InboundEvent {
        InboundEvent {
            update_id: 7,
            user_id: UserId("42".to_owned()),
            first_name: Some("Ann".to_owned()),
            chat_id: 42,
            payload,
            origin_message_id: Some(900),
        }
    }

    #[test]
    fn payload_kinds_map_to_dialogue_events() {
        let start = event(EventPayload::Command {
            name: "start".to_owned(),
            arguments: String::new(),
        });
        assert_eq!(start.dialogue_event(), DialogueEvent::Start);

        let button = event(EventPayload::Button {
            payload: "cart".to_owned(),
            callback_id: "cb-1".to_owned(),
        });
        assert_eq!(button.dialogue_event(), DialogueEvent::OpenCart);

        let text = event(EventPayload::Text("ann@example.com".to_owned()));
        assert_eq!(text.dialogue_event(), DialogueEvent::Text("ann@example.com".to_owned()));
    }

    #[test]
    fn typed_commands_are_split_from_free_text() {
        assert_eq!(
            EventPayload::from_message_text("/start@aquashop_bot promo".to_owned()),
            EventPayload::Command { name: "start".to_owned(), arguments: "promo".to_owned() }
        );
        assert_eq!(
            EventPayload::from_message_text("ann@example.com".to_owned()),
            EventPayload::Text("ann@example.com".to_owned())
        );
    }

    #[test]
    fn only_button_presses_replace_their_origin_message() {
        let button = event(EventPayload::Button {
            payload: "p1".to_owned(),
            callback_id: "cb-1".to_owned(),
        });
        assert_eq!(button.replaceable_message(), Some(900));
        assert_eq!(button.callback_id(), Some("cb-1"));

        let text = event(EventPayload::Text("hello".to_owned()));
        assert_eq!(text.replaceable_message(), None);
        assert_eq!(text.context().correlation_id, "7");
    }
}
