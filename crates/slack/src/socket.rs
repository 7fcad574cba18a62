use std::{sync::Arc, time::Duration};

use anyhow::Result;
use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::blocks;
use crate::events::{
    EphemeralReply, EventContext, EventDispatcher, HandlerResult, SlackEnvelope,
    SlackEvent,
};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("transport failed to connect: {0}")]
    Connect(String),
    #[error("transport read failed: {0}")]
    Receive(String),
    #[error("transport ack failed: {0}")]
    Acknowledge(String),
    #[error("transport reply failed: {0}")]
    Respond(String),
    #[error("transport disconnect failed: {0}")]
    Disconnect(String),
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
    fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.min(16);
        let multiplier = 1_u64 << exponent;
        let delay_ms = self.base_delay_ms.saturating_mul(multiplier).min(self.max_delay_ms);
        Duration::from_millis(delay_ms)
    }
}

#[async_trait]
pub trait SocketTransport: Send + Sync {
    /// Short label for startup logs.
    fn mode(&self) -> &'static str;
    async fn connect(&self) -> Result<(), TransportError>;
    async fn next_envelope(&self) -> Result<Option<SlackEnvelope>, TransportError>;
    async fn acknowledge(&self, envelope_id: &str) -> Result<(), TransportError>;
    async fn respond(
        &self,
        envelope: &SlackEnvelope,
        reply: &EphemeralReply,
    ) -> Result<(), TransportError>;
    async fn disconnect(&self) -> Result<(), TransportError>;
}

/// Transport that never yields an envelope. Used when no app token is configured.
#[derive(Default)]
pub struct NoopSocketTransport;

#[async_trait]
impl SocketTransport for NoopSocketTransport {
    fn mode(&self) -> &'static str {
        "noop"
    }

    async fn connect(&self) -> Result<(), TransportError> {
        Ok(())
    }

    async fn next_envelope(&self) -> Result<Option<SlackEnvelope>, TransportError> {
        Ok(None)
    }

    async fn acknowledge(&self, _envelope_id: &str) -> Result<(), TransportError> {
        Ok(())
    }

    async fn respond(
        &self,
        _envelope: &SlackEnvelope,
        _reply: &EphemeralReply,
    ) -> Result<(), TransportError> {
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        Ok(())
    }
}

struct SessionFailure {
    established: bool,
    error: TransportError,
}

impl SessionFailure {
    fn before_connect(error: TransportError) -> Self {
        Self { established: false, error }
    }

    fn after_connect(error: TransportError) -> Self {
        Self { established: true, error }
    }
}

pub struct SocketModeRunner {
    transport: Arc<dyn SocketTransport>,
    dispatcher: EventDispatcher,
    reconnect_policy: ReconnectPolicy,
}

impl SocketModeRunner {
    pub fn new(
        transport: Arc<dyn SocketTransport>,
        dispatcher: EventDispatcher,
        reconnect_policy: ReconnectPolicy,
    ) -> Self {
        Self { transport, dispatcher, reconnect_policy }
    }

    pub fn transport_mode(&self) -> &'static str {
        self.transport.mode()
    }

    /// Pumps envelopes until the transport closes cleanly. Failed sessions are retried with
    /// backoff; a session that managed to connect resets the retry budget.
    pub async fn start(&self) -> Result<()> {
        let mut attempt = 0_u32;
        loop {
            match self.connect_and_pump(attempt).await {
                Ok(()) => return Ok(()),
                Err(SessionFailure { established, error }) => {
                    if established {
                        attempt = 0;
                    }
                    warn!(
                        attempt,
                        max_retries = self.reconnect_policy.max_retries,
                        established,
                        error = %error,
                        "socket mode transport failed"
                    );

                    if attempt >= self.reconnect_policy.max_retries {
                        warn!(
                            max_retries = self.reconnect_policy.max_retries,
                            "socket mode retries exhausted; continuing process without crash"
                        );
                        return Ok(());
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

    async fn connect_and_pump(&self, attempt: u32) -> Result<(), SessionFailure> {
        info!(attempt, mode = self.transport.mode(), "opening socket mode transport connection");
        self.transport.connect().await.map_err(SessionFailure::before_connect)?;
        info!(attempt, "socket mode transport connected");

        loop {
            let envelope =
                self.transport.next_envelope().await.map_err(SessionFailure::after_connect)?;
            let Some(envelope) = envelope else {
                info!(attempt, "socket mode transport stream closed");
                self.transport.disconnect().await.map_err(SessionFailure::after_connect)?;
                return Ok(());
            };
            self.handle_envelope(&envelope).await;
        }
    }

    async fn handle_envelope(&self, envelope: &SlackEnvelope) {
        let (channel_id, user_id) = correlation_fields(envelope);

        info!(
            event_name = "ingress.slack.envelope_received",
            envelope_id = %envelope.envelope_id,
            event_type = ?envelope.event.event_type(),
            correlation_id = %envelope.envelope_id,
            channel_id = channel_id.unwrap_or("unknown"),
            user_id = user_id.unwrap_or("unknown"),
            "received slack envelope"
        );

        if let Err(error) = self.transport.acknowledge(&envelope.envelope_id).await {
            warn!(
                event_name = "ingress.slack.ack_sent",
                envelope_id = %envelope.envelope_id,
                correlation_id = %envelope.envelope_id,
                channel_id = channel_id.unwrap_or("unknown"),
                error = %error,
                "failed to acknowledge slack envelope"
            );
        } else {
            debug!(
                event_name = "ingress.slack.ack_sent",
                envelope_id = %envelope.envelope_id,
                correlation_id = %envelope.envelope_id,
                channel_id = channel_id.unwrap_or("unknown"),
                "acknowledged slack envelope"
            );
        }

        let context = EventContext { correlation_id: envelope.envelope_id.clone() };
        let reply = match self.dispatcher.dispatch(envelope, &context).await {
            Ok(HandlerResult::Responded(reply)) => reply,
            Ok(HandlerResult::Processed | HandlerResult::Ignored) => return,
            Err(error) => {
                warn!(
                    envelope_id = %envelope.envelope_id,
                    correlation_id = %envelope.envelope_id,
                    channel_id = channel_id.unwrap_or("unknown"),
                    user_id = user_id.unwrap_or("unknown"),
                    error = %error,
                    "event dispatch failed; continuing socket loop"
                );
                EphemeralReply::Post(blocks::error_message(
                    "Something went wrong handling that request.",
                    &context.correlation_id,
                ))
            }
        };

        if let Err(error) = self.transport.respond(envelope, &reply).await {
            warn!(
                event_name = "egress.slack.reply_failed",
                envelope_id = %envelope.envelope_id,
                correlation_id = %envelope.envelope_id,
                error = %error,
                "failed to deliver ephemeral reply"
            );
        }
    }
}

fn correlation_fields(envelope: &SlackEnvelope) -> (Option<&str>, Option<&str>) {
    match &envelope.event {
        SlackEvent::SlashCommand(payload) => (Some(&payload.channel_id), Some(&payload.user_id)),
        SlackEvent::BlockAction(event) => (Some(&event.channel_id), Some(&event.user_id)),
        SlackEvent::FileShared(event) => (Some(&event.channel_id), Some(&event.user_id)),
        SlackEvent::Unsupported { .. } => (None, None),
    }
}
