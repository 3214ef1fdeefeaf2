use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::events::{InboundEvent, InboundHandler};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("transport failed to connect: {0}")]
    Connect(String),
    #[error("transport read failed: {0}")]
    Receive(String),
    #[error("transport ack failed: {0}")]
    Acknowledge(String),
    #[error("transport disconnect failed: {0}")]
    Disconnect(String),
}

/// Raised when the transport stays down for longer than the retry budget.
/// The binary exits non-zero on it so a supervisor can restart the process.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RunnerError {
    #[error("update transport gave up after {attempts} consecutive failures: {last_error}")]
    RetriesExhausted { attempts: u32, last_error: TransportError },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self { max_retries: 5, base_delay_ms: 250, max_delay_ms: 5_000 }
    }
}

impl ReconnectPolicy {
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.min(16);
        let multiplier = 1_u64 << exponent;
        let delay_ms = self.base_delay_ms.saturating_mul(multiplier).min(self.max_delay_ms);
        Duration::from_millis(delay_ms)
    }
}

/// Source of inbound updates. `next_batch` returns `Ok(None)` once the stream
/// is closed and an empty batch when a poll timed out without updates.
#[async_trait]
pub trait UpdateTransport: Send + Sync {
    async fn connect(&self) -> Result<(), TransportError>;
    async fn next_batch(&self) -> Result<Option<Vec<InboundEvent>>, TransportError>;
    /// Confirms receipt of one update, e.g. answering a button press.
    async fn acknowledge(&self, event: &InboundEvent) -> Result<(), TransportError>;
    async fn disconnect(&self) -> Result<(), TransportError>;
}

#[derive(Default)]
pub struct NoopUpdateTransport;

#[async_trait]
impl UpdateTransport for NoopUpdateTransport {
    async fn connect(&self) -> Result<(), TransportError> {
        Ok(())
    }

    async fn next_batch(&self) -> Result<Option<Vec<InboundEvent>>, TransportError> {
        Ok(None)
    }

    async fn acknowledge(&self, _event: &InboundEvent) -> Result<(), TransportError> {
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        Ok(())
    }
}

pub struct PollingRunner {
    transport: Arc<dyn UpdateTransport>,
    handler: Arc<dyn InboundHandler>,
    reconnect_policy: ReconnectPolicy,
}

impl PollingRunner {
    pub fn new(
        transport: Arc<dyn UpdateTransport>,
        handler: Arc<dyn InboundHandler>,
        reconnect_policy: ReconnectPolicy,
    ) -> Self {
        Self { transport, handler, reconnect_policy }
    }

    /// Pumps updates until the transport closes. A successful batch resets the
    /// retry budget; exhausting it is an error.
    pub async fn start(&self) -> Result<(), RunnerError> {
        let mut attempt = 0;
        loop {
            match self.connect_and_pump(attempt).await {
                Ok(()) => return Ok(()),
                Err((transport_error, made_progress)) => {
                    if made_progress {
                        attempt = 0;
                    }
                    warn!(
                        attempt,
                        max_retries = self.reconnect_policy.max_retries,
                        error = %transport_error,
                        "update transport failed"
                    );

                    if attempt >= self.reconnect_policy.max_retries {
                        error!(
                            max_retries = self.reconnect_policy.max_retries,
                            error = %transport_error,
                            "update transport retries exhausted; stopping runner"
                        );
                        return Err(RunnerError::RetriesExhausted {
                            attempts: attempt + 1,
                            last_error: transport_error,
                        });
                    }

                    let delay = self.reconnect_policy.backoff(attempt);
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                    attempt += 1;
                }
            }
        }
    }

    async fn connect_and_pump(&self, attempt: u32) -> Result<(), (TransportError, bool)> {
        info!(attempt, "opening update transport");
        self.transport.connect().await.map_err(|error| (error, false))?;
        info!(attempt, "update transport connected");

        let mut made_progress = false;
        loop {
            let batch = self.transport.next_batch().await.map_err(|error| (error, made_progress))?;
            let Some(batch) = batch else {
                info!(attempt, "update transport stream closed");
                self.transport.disconnect().await.map_err(|error| (error, made_progress))?;
                return Ok(());
            };
            made_progress = true;

            for event in batch {
                info!(
                    event_name = "ingress.telegram.update_received",
                    update_id = event.update_id,
                    correlation_id = %event.update_id,
                    user_id = %event.user_id,
                    payload_kind = event.payload.kind(),
                    "received update"
                );

                if let Err(error) = self.transport.acknowledge(&event).await {
                    warn!(
                        event_name = "ingress.telegram.ack_sent",
                        correlation_id = %event.update_id,
                        error = %error,
                        "failed to acknowledge update"
                    );
                } else {
                    debug!(
                        event_name = "ingress.telegram.ack_sent",
                        correlation_id = %event.update_id,
                        "acknowledged update"
                    );
                }

                self.handler.handle(event).await;
            }
        }
    }
}
