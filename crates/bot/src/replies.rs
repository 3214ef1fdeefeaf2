use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::Mutex;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Button {
    pub label: String,
    pub payload: String,
}

impl Button {
    pub fn new(label: impl Into<String>, payload: impl Into<String>) -> Self {
        Self { label: label.into(), payload: payload.into() }
    }
}

/// A reply to one chat. With `photo_url` set, `text` becomes the caption.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct OutboundMessage {
    pub chat_id: i64,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub photo_url: Option<String>,
    /// Rows of inline buttons.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub keyboard: Vec<Vec<Button>>,
    /// Message deleted before this one is sent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub replace_message_id: Option<i64>,
}

impl OutboundMessage {
    pub fn text(chat_id: i64, text: impl Into<String>) -> Self {
        Self {
            chat_id,
            text: text.into(),
            photo_url: None,
            keyboard: Vec::new(),
            replace_message_id: None,
        }
    }

    pub fn photo(mut self, url: impl Into<String>) -> Self {
        self.photo_url = Some(url.into());
        self
    }

    pub fn keyboard(mut self, rows: Vec<Vec<Button>>) -> Self {
        self.keyboard = rows;
        self
    }

    pub fn replacing(mut self, message_id: Option<i64>) -> Self {
        self.replace_message_id = message_id;
        self
    }

    pub fn button_payloads(&self) -> impl Iterator<Item = &str> {
        self.keyboard.iter().flatten().map(|button| button.payload.as_str())
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DeliveryError {
    #[error("reply request failed: {0}")]
    Request(String),
    #[error("reply rejected by transport: {0}")]
    Rejected(String),
}

#[async_trait]
pub trait ReplySink: Send + Sync {
    async fn deliver(&self, message: &OutboundMessage) -> Result<(), DeliveryError>;
}

/// Keeps every delivered message in memory; can be told to reject deliveries.
#[derive(Default)]
pub struct RecordingSink {
    delivered: Mutex<Vec<OutboundMessage>>,
    failure: Mutex<Option<DeliveryError>>,
}

impl RecordingSink {
    pub async fn delivered(&self) -> Vec<OutboundMessage> {
        self.delivered.lock().await.clone()
    }

    pub async fn take(&self) -> Vec<OutboundMessage> {
        std::mem::take(&mut *self.delivered.lock().await)
    }

    pub async fn fail_with(&self, error: Option<DeliveryError>) {
        *self.failure.lock().await = error;
    }
}

#[async_trait]
impl ReplySink for RecordingSink {
    async fn deliver(&self, message: &OutboundMessage) -> Result<(), DeliveryError> {
        if let Some(error) = self.failure.lock().await.clone() {
            return Err(error);
        }
        self.delivered.lock().await.push(message.clone());
        Ok(())
    }
}
