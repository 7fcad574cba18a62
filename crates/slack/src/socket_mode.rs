//! Slack Socket Mode transport over a websocket.
//!
//! The app token opens a connection URL through `apps.connections.open`; every frame
//! carrying an `envelope_id` must be acknowledged within three seconds.

use async_trait::async_trait;
use futures_util::{
    stream::{SplitSink, SplitStream},
    SinkExt, StreamExt,
};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::Value;
use tokio::{net::TcpStream, sync::Mutex};
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tracing::{debug, warn};

use crate::{
    commands::SlashCommandPayload,
    events::{BlockActionEvent, EphemeralReply, FileSharedEvent, SlackEnvelope, SlackEvent},
    socket::{SocketTransport, TransportError},
};

pub const DEFAULT_API_BASE_URL: &str = "https://slack.com/api";

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

pub struct SlackSocketTransport {
    http: reqwest::Client,
    app_token: SecretString,
    api_base_url: String,
    reader: Mutex<Option<SplitStream<WsStream>>>,
    writer: Mutex<Option<SplitSink<WsStream, Message>>>,
}

impl SlackSocketTransport {
    pub fn new(app_token: SecretString) -> Self {
        Self::with_base_url(app_token, DEFAULT_API_BASE_URL)
    }

    pub fn with_base_url(app_token: SecretString, api_base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            app_token,
            api_base_url: api_base_url.into(),
            reader: Mutex::new(None),
            writer: Mutex::new(None),
        }
    }

    async fn open_connection_url(&self) -> Result<String, TransportError> {
        #[derive(Deserialize)]
        struct ConnectionsOpen {
            ok: bool,
            url: Option<String>,
            error: Option<String>,
        }

        let response: ConnectionsOpen = self
            .http
            .post(format!("{}/apps.connections.open", self.api_base_url))
            .bearer_auth(self.app_token.expose_secret())
            .send()
            .await
            .map_err(|error| TransportError::Connect(error.to_string()))?
            .json()
            .await
            .map_err(|error| TransportError::Connect(error.to_string()))?;

        match (response.ok, response.url) {
            (true, Some(url)) => Ok(url),
            _ => Err(TransportError::Connect(format!(
                "apps.connections.open rejected: {}",
                response.error.as_deref().unwrap_or("missing url")
            ))),
        }
    }
}

#[async_trait]
impl SocketTransport for SlackSocketTransport {
    fn mode(&self) -> &'static str {
        "socket_mode"
    }

    async fn connect(&self) -> Result<(), TransportError> {
        let url = self.open_connection_url().await?;
        let (stream, _) =
            connect_async(url.as_str()).await.map_err(|error| TransportError::Connect(error.to_string()))?;
        let (write, read) = stream.split();
        *self.writer.lock().await = Some(write);
        *self.reader.lock().await = Some(read);
        Ok(())
    }

    async fn next_envelope(&self) -> Result<Option<SlackEnvelope>, TransportError> {
        let mut guard = self.reader.lock().await;
        let reader =
            guard.as_mut().ok_or_else(|| TransportError::Receive("not connected".to_owned()))?;

        loop {
            let message = match reader.next().await {
                Some(Ok(message)) => message,
                Some(Err(error)) => return Err(TransportError::Receive(error.to_string())),
                None => return Err(TransportError::Receive("socket closed".to_owned())),
            };

            let text = match message {
                Message::Text(text) => text,
                Message::Close(frame) => {
                    return Err(TransportError::Receive(format!("socket closed by server: {frame:?}")))
                }
                _ => continue,
            };

            match decode_frame(&text) {
                Frame::Hello => debug!("socket mode hello received"),
                Frame::Disconnect { reason } => {
                    return Err(TransportError::Receive(format!("server requested disconnect: {reason}")))
                }
                Frame::Envelope(envelope) => return Ok(Some(envelope)),
                Frame::Unknown { frame_type } => debug!(frame_type = %frame_type, "skipping socket mode frame"),
            }
        }
    }

    async fn acknowledge(&self, envelope_id: &str) -> Result<(), TransportError> {
        let mut guard = self.writer.lock().await;
        let writer =
            guard.as_mut().ok_or_else(|| TransportError::Acknowledge("not connected".to_owned()))?;
        let ack = serde_json::json!({ "envelope_id": envelope_id }).to_string();
        writer.send(Message::Text(ack)).await.map_err(|error| TransportError::Acknowledge(error.to_string()))
    }

    async fn respond(
        &self,
        envelope: &SlackEnvelope,
        reply: &EphemeralReply,
    ) -> Result<(), TransportError> {
        let Some(response_url) = envelope.response_url.as_deref() else {
            debug!(envelope_id = %envelope.envelope_id, "no response url; dropping ephemeral reply");
            return Ok(());
        };

        self.http
            .post(response_url)
            .json(&response_body(reply))
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|error| TransportError::Respond(error.to_string()))?;
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        self.reader.lock().await.take();
        if let Some(mut writer) = self.writer.lock().await.take() {
            writer.close().await.map_err(|error| TransportError::Disconnect(error.to_string()))?;
        }
        Ok(())
    }
}

pub fn response_body(reply: &EphemeralReply) -> Value {
    match reply {
        EphemeralReply::Post(message) => {
            let mut body = message.to_payload();
            body["response_type"] = Value::from("ephemeral");
            body
        }
        EphemeralReply::Replace(message) => {
            let mut body = message.to_payload();
            body["replace_original"] = Value::Bool(true);
            body
        }
        EphemeralReply::Delete => serde_json::json!({ "delete_original": true }),
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum Frame {
    Hello,
    Disconnect { reason: String },
    Envelope(SlackEnvelope),
    Unknown { frame_type: String },
}

#[derive(Deserialize)]
struct RawFrame {
    #[serde(rename = "type")]
    frame_type: String,
    envelope_id: Option<String>,
    #[serde(default)]
    payload: Value,
    reason: Option<String>,
}

#[derive(Deserialize)]
struct RawSlashCommand {
    command: String,
    #[serde(default)]
    text: String,
    channel_id: String,
    user_id: String,
    #[serde(default)]
    user_name: String,
    #[serde(default)]
    trigger_id: String,
    response_url: Option<String>,
}

#[derive(Deserialize)]
struct RawInteraction {
    #[serde(rename = "type")]
    interaction_type: String,
    user: RawUser,
    channel: Option<RawChannel>,
    container: Option<RawContainer>,
    response_url: Option<String>,
    #[serde(default)]
    actions: Vec<RawAction>,
}

#[derive(Deserialize)]
struct RawUser {
    id: String,
    username: Option<String>,
    name: Option<String>,
}

#[derive(Deserialize)]
struct RawChannel {
    id: String,
}

#[derive(Deserialize)]
struct RawContainer {
    message_ts: Option<String>,
    channel_id: Option<String>,
}

#[derive(Deserialize)]
struct RawAction {
    action_id: String,
    value: Option<String>,
    selected_option: Option<RawOption>,
    action_ts: Option<String>,
}

#[derive(Deserialize)]
struct RawOption {
    value: String,
}

#[derive(Deserialize)]
struct RawEventCallback {
    event: RawEvent,
}

#[derive(Deserialize)]
struct RawEvent {
    #[serde(rename = "type")]
    event_type: String,
    file_id: Option<String>,
    user_id: Option<String>,
    channel_id: Option<String>,
}

/// Decodes one Socket Mode text frame. Frames with an envelope always decode to an
/// envelope so they can be acknowledged, even when the payload is not understood.
pub fn decode_frame(text: &str) -> Frame {
    let raw: RawFrame = match serde_json::from_str(text) {
        Ok(raw) => raw,
        Err(error) => {
            warn!(error = %error, "undecodable socket mode frame");
            return Frame::Unknown { frame_type: "invalid".to_owned() };
        }
    };

    match (raw.frame_type.as_str(), raw.envelope_id) {
        ("hello", _) => Frame::Hello,
        ("disconnect", _) => {
            Frame::Disconnect { reason: raw.reason.unwrap_or_else(|| "unspecified".to_owned()) }
        }
        (frame_type, Some(envelope_id)) => {
            let (event, response_url) = decode_payload(frame_type, &envelope_id, raw.payload);
            Frame::Envelope(SlackEnvelope { envelope_id, response_url, event })
        }
        (frame_type, None) => Frame::Unknown { frame_type: frame_type.to_owned() },
    }
}

fn decode_payload(frame_type: &str, envelope_id: &str, payload: Value) -> (SlackEvent, Option<String>) {
    let decoded = match frame_type {
        "slash_commands" => serde_json::from_value::<RawSlashCommand>(payload).map(|raw| {
            let event = SlackEvent::SlashCommand(SlashCommandPayload {
                command: raw.command,
                text: raw.text,
                channel_id: raw.channel_id,
                user_id: raw.user_id,
                user_name: raw.user_name,
                trigger_ts: raw.trigger_id,
                request_id: envelope_id.to_owned(),
            });
            (event, raw.response_url)
        }),
        "interactive" => serde_json::from_value::<RawInteraction>(payload).map(interaction_event),
        "events_api" => serde_json::from_value::<RawEventCallback>(payload).map(|raw| (api_event(raw.event), None)),
        other => return (SlackEvent::Unsupported { event_type: other.to_owned() }, None),
    };

    decoded.unwrap_or_else(|error| {
        warn!(envelope_id, frame_type, error = %error, "unrecognized socket mode payload");
        (SlackEvent::Unsupported { event_type: frame_type.to_owned() }, None)
    })
}

fn interaction_event(raw: RawInteraction) -> (SlackEvent, Option<String>) {
    let channel_id = raw
        .channel
        .map(|channel| channel.id)
        .or_else(|| raw.container.as_ref().and_then(|container| container.channel_id.clone()));
    let action = raw.actions.into_iter().next();

    let (Some(channel_id), Some(action)) = (channel_id, action) else {
        return (SlackEvent::Unsupported { event_type: raw.interaction_type }, raw.response_url);
    };
    if raw.interaction_type != "block_actions" {
        return (SlackEvent::Unsupported { event_type: raw.interaction_type }, raw.response_url);
    }

    let user_name = raw.user.username.or(raw.user.name).unwrap_or_else(|| raw.user.id.clone());
    let event = SlackEvent::BlockAction(BlockActionEvent {
        channel_id,
        message_ts: raw.container.and_then(|container| container.message_ts),
        user_id: raw.user.id,
        user_name,
        action_id: action.action_id,
        value: action.selected_option.map(|option| option.value).or(action.value),
        request_id: action.action_ts,
    });
    (event, raw.response_url)
}

fn api_event(raw: RawEvent) -> SlackEvent {
    match (raw.event_type.as_str(), raw.file_id, raw.user_id, raw.channel_id) {
        ("file_shared", Some(file_id), Some(user_id), Some(channel_id)) => {
            SlackEvent::FileShared(FileSharedEvent { channel_id, user_id, file_id })
        }
        _ => SlackEvent::Unsupported { event_type: raw.event_type },
    }
}
