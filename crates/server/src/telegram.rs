//! Telegram Bot API transport: long-polls `getUpdates` for inbound events and
//! delivers replies with `sendMessage` / `sendPhoto`.
//!
//! The bot token is part of every request path, so request errors are logged
//! and returned with their URL stripped.

use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

use aquashop_bot::{
    Button, DeliveryError, EventPayload, InboundEvent, OutboundMessage, ReplySink, TransportError,
    UpdateTransport,
};
use aquashop_core::config::TelegramConfig;
use aquashop_core::domain::session::UserId;
use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, warn};

/// Extra time granted to a long poll beyond its server-side timeout.
const POLL_GRACE_SECS: u64 = 10;

/// Bot API limit for photo captions, in characters.
const MAX_CAPTION_CHARS: usize = 1024;

pub struct TelegramTransport {
    http: reqwest::Client,
    api_base_url: String,
    bot_token: SecretString,
    poll_timeout_secs: u64,
    next_offset: AtomicI64,
}

#[derive(Debug, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
struct ApiResponse<T> {
    ok: bool,
    #[serde(default)]
    result: Option<T>,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Update {
    update_id: i64,
    #[serde(default)]
    message: Option<Message>,
    #[serde(default)]
    callback_query: Option<CallbackQuery>,
}

#[derive(Debug, Deserialize)]
struct Message {
    message_id: i64,
    chat: Chat,
    #[serde(default)]
    from: Option<User>,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Chat {
    id: i64,
}

#[derive(Debug, Deserialize)]
struct User {
    id: i64,
    #[serde(default)]
    first_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CallbackQuery {
    id: String,
    from: User,
    #[serde(default)]
    message: Option<Message>,
    #[serde(default)]
    data: Option<String>,
}

#[derive(Debug, Serialize)]
struct InlineButton<'a> {
    text: &'a str,
    callback_data: &'a str,
}

#[derive(Debug, Serialize)]
struct InlineKeyboard<'a> {
    inline_keyboard: Vec<Vec<InlineButton<'a>>>,
}

impl<'a> InlineKeyboard<'a> {
    fn from_rows(rows: &'a [Vec<Button>]) -> Option<Self> {
        if rows.is_empty() {
            return None;
        }
        let inline_keyboard = rows
            .iter()
            .map(|row| {
                row.iter()
                    .map(|button| InlineButton { text: &button.label, callback_data: &button.payload })
                    .collect()
            })
            .collect();
        Some(Self { inline_keyboard })
    }
}

impl TelegramTransport {
    pub fn new(
        api_base_url: impl Into<String>,
        bot_token: SecretString,
        poll_timeout_secs: u64,
    ) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(poll_timeout_secs + POLL_GRACE_SECS))
            .build()?;
        Ok(Self {
            http,
            api_base_url: api_base_url.into().trim_end_matches('/').to_owned(),
            bot_token,
            poll_timeout_secs,
            next_offset: AtomicI64::new(0),
        })
    }

    pub fn from_config(config: &TelegramConfig) -> Result<Self, reqwest::Error> {
        Self::new(config.api_base_url.clone(), config.bot_token.clone(), config.poll_timeout_secs)
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.api_base_url, self.bot_token.expose_secret(), method)
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        body: serde_json::Value,
    ) -> Result<T, String> {
        let response = self
            .http
            .post(self.method_url(method))
            .json(&body)
            .send()
            .await
            .map_err(|error| error.without_url().to_string())?;
        let status = response.status();
        let payload: ApiResponse<T> =
            response.json().await.map_err(|error| error.without_url().to_string())?;

        match (payload.ok, payload.result) {
            (true, Some(result)) => Ok(result),
            _ => Err(format!(
                "{method} failed with status {}: {}",
                status.as_u16(),
                payload.description.unwrap_or_else(|| "no description".to_owned())
            )),
        }
    }
}

/// Maps an update to an inbound event. Updates without a sender, text or
/// button data (joins, stickers, edits) yield `None`.
fn to_event(update: Update) -> Option<InboundEvent> {
    if let Some(query) = update.callback_query {
        let message = query.message?;
        let payload = query.data?;
        return Some(InboundEvent {
            update_id: update.update_id,
            user_id: UserId(query.from.id.to_string()),
            first_name: query.from.first_name,
            chat_id: message.chat.id,
            payload: EventPayload::Button { payload, callback_id: query.id },
            origin_message_id: Some(message.message_id),
        });
    }

    let message = update.message?;
    let from = message.from?;
    let text = message.text?;
    let payload = EventPayload::from_message_text(text);
    Some(InboundEvent {
        update_id: update.update_id,
        user_id: UserId(from.id.to_string()),
        first_name: from.first_name,
        chat_id: message.chat.id,
        payload,
        origin_message_id: Some(message.message_id),
    })
}

#[async_trait]
impl UpdateTransport for TelegramTransport {
    async fn connect(&self) -> Result<(), TransportError> {
        let me: serde_json::Value =
            self.call("getMe", json!({})).await.map_err(TransportError::Connect)?;
        debug!(bot_username = me["username"].as_str().unwrap_or("unknown"), "telegram bot identified");
        Ok(())
    }

    async fn next_batch(&self) -> Result<Option<Vec<InboundEvent>>, TransportError> {
        let offset = self.next_offset.load(Ordering::SeqCst);
        let updates: Vec<Update> = self
            .call(
                "getUpdates",
                json!({
                    "offset": offset,
                    "timeout": self.poll_timeout_secs,
                    "allowed_updates": ["message", "callback_query"],
                }),
            )
            .await
            .map_err(TransportError::Receive)?;

        if let Some(last) = updates.iter().map(|update| update.update_id).max() {
            self.next_offset.store(last + 1, Ordering::SeqCst);
        }
        Ok(Some(updates.into_iter().filter_map(to_event).collect()))
    }

    async fn acknowledge(&self, event: &InboundEvent) -> Result<(), TransportError> {
        let Some(callback_id) = event.callback_id() else {
            return Ok(());
        };
        self.call::<bool>("answerCallbackQuery", json!({ "callback_query_id": callback_id }))
            .await
            .map(|_| ())
            .map_err(TransportError::Acknowledge)
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        Ok(())
    }
}

#[async_trait]
impl ReplySink for TelegramTransport {
    async fn deliver(&self, message: &OutboundMessage) -> Result<(), DeliveryError> {
        let (method, mut body) = match &message.photo_url {
            Some(photo) => (
                "sendPhoto",
                json!({
                    "chat_id": message.chat_id,
                    "photo": photo,
                    "caption": caption(&message.text),
                }),
            ),
            None => ("sendMessage", json!({ "chat_id": message.chat_id, "text": message.text })),
        };
        if let Some(markup) = InlineKeyboard::from_rows(&message.keyboard) {
            body["reply_markup"] = json!(markup);
        }

        self.call::<serde_json::Value>(method, body).await.map_err(DeliveryError::Rejected)?;

        // The old view goes only once its replacement is on screen.
        if let Some(message_id) = message.replace_message_id {
            let deleted = self
                .call::<bool>(
                    "deleteMessage",
                    json!({ "chat_id": message.chat_id, "message_id": message_id }),
                )
                .await;
            if let Err(error) = deleted {
                warn!(chat_id = message.chat_id, message_id, error = %error, "could not delete replaced message");
            }
        }
        Ok(())
    }
}

fn caption(text: &str) -> String {
    match text.char_indices().nth(MAX_CAPTION_CHARS) {
        Some((cut, _)) => text[..cut].to_owned(),
        None => text.to_owned(),
    }
}
