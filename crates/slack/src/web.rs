use std::sync::Mutex;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use crate::blocks::MessageTemplate;
use crate::socket_mode::DEFAULT_API_BASE_URL;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum WebApiError {
    #[error("slack request failed: {0}")]
    Transport(String),
    #[error("slack method `{method}` returned error `{error}`")]
    Api { method: &'static str, error: String },
    #[error("slack response missing `{field}` for `{method}`")]
    MissingField { method: &'static str, field: &'static str },
}

/// Metadata of a file shared into a channel.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SharedFile {
    pub id: String,
    pub name: String,
    pub size: u64,
    pub url_private: String,
}

#[async_trait]
pub trait SlackWebApi: Send + Sync {
    /// Posts a channel message and returns its timestamp.
    async fn post_message(&self, channel_id: &str, message: &MessageTemplate) -> Result<String, WebApiError>;
    async fn update_message(
        &self,
        channel_id: &str,
        ts: &str,
        message: &MessageTemplate,
    ) -> Result<(), WebApiError>;
    async fn post_ephemeral(
        &self,
        channel_id: &str,
        user_id: &str,
        message: &MessageTemplate,
    ) -> Result<(), WebApiError>;
    /// Opens (or reuses) the direct message channel with a user.
    async fn open_direct_channel(&self, user_id: &str) -> Result<String, WebApiError>;
    async fn upload_file(
        &self,
        channel_id: &str,
        filename: &str,
        content: &[u8],
        comment: &str,
    ) -> Result<(), WebApiError>;
    async fn file_info(&self, file_id: &str) -> Result<SharedFile, WebApiError>;
    async fn download_file(&self, url_private: &str) -> Result<Vec<u8>, WebApiError>;
}

pub struct ReqwestSlackClient {
    http: reqwest::Client,
    bot_token: SecretString,
    api_base_url: String,
}

impl ReqwestSlackClient {
    pub fn new(bot_token: SecretString) -> Self {
        Self::with_base_url(bot_token, DEFAULT_API_BASE_URL)
    }

    pub fn with_base_url(bot_token: SecretString, api_base_url: impl Into<String>) -> Self {
        Self { http: reqwest::Client::new(), bot_token, api_base_url: api_base_url.into() }
    }

    async fn call(&self, method: &'static str, body: Value) -> Result<Value, WebApiError> {
        let response: Value = self
            .http
            .post(format!("{}/{method}", self.api_base_url))
            .bearer_auth(self.bot_token.expose_secret())
            .json(&body)
            .send()
            .await
            .map_err(|error| WebApiError::Transport(error.to_string()))?
            .json()
            .await
            .map_err(|error| WebApiError::Transport(error.to_string()))?;
        check_ok(method, response)
    }

    async fn call_form(
        &self,
        method: &'static str,
        form: &[(&str, &str)],
    ) -> Result<Value, WebApiError> {
        let response: Value = self
            .http
            .post(format!("{}/{method}", self.api_base_url))
            .bearer_auth(self.bot_token.expose_secret())
            .form(form)
            .send()
            .await
            .map_err(|error| WebApiError::Transport(error.to_string()))?
            .json()
            .await
            .map_err(|error| WebApiError::Transport(error.to_string()))?;
        check_ok(method, response)
    }
}

fn check_ok(method: &'static str, response: Value) -> Result<Value, WebApiError> {
    if response.get("ok").and_then(Value::as_bool) == Some(true) {
        return Ok(response);
    }
    let error = response.get("error").and_then(Value::as_str).unwrap_or("unknown_error").to_owned();
    Err(WebApiError::Api { method, error })
}

fn string_field(
    value: &Value,
    pointer: &str,
    method: &'static str,
    field: &'static str,
) -> Result<String, WebApiError> {
    value
        .pointer(pointer)
        .and_then(Value::as_str)
        .map(str::to_owned)
        .ok_or(WebApiError::MissingField { method, field })
}

#[derive(Deserialize)]
struct RawFile {
    id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    size: u64,
    #[serde(default)]
    url_private: String,
}

#[async_trait]
impl SlackWebApi for ReqwestSlackClient {
    async fn post_message(&self, channel_id: &str, message: &MessageTemplate) -> Result<String, WebApiError> {
        let mut body = message.to_payload();
        body["channel"] = Value::from(channel_id);
        let response = self.call("chat.postMessage", body).await?;
        string_field(&response, "/ts", "chat.postMessage", "ts")
    }

    async fn update_message(
        &self,
        channel_id: &str,
        ts: &str,
        message: &MessageTemplate,
    ) -> Result<(), WebApiError> {
        let mut body = message.to_payload();
        body["channel"] = Value::from(channel_id);
        body["ts"] = Value::from(ts);
        self.call("chat.update", body).await.map(drop)
    }

    async fn post_ephemeral(
        &self,
        channel_id: &str,
        user_id: &str,
        message: &MessageTemplate,
    ) -> Result<(), WebApiError> {
        let mut body = message.to_payload();
        body["channel"] = Value::from(channel_id);
        body["user"] = Value::from(user_id);
        self.call("chat.postEphemeral", body).await.map(drop)
    }

    async fn open_direct_channel(&self, user_id: &str) -> Result<String, WebApiError> {
        let response = self.call("conversations.open", serde_json::json!({ "users": user_id })).await?;
        string_field(&response, "/channel/id", "conversations.open", "channel.id")
    }

    async fn upload_file(
        &self,
        channel_id: &str,
        filename: &str,
        content: &[u8],
        comment: &str,
    ) -> Result<(), WebApiError> {
        let length = content.len().to_string();
        let ticket = self
            .call_form("files.getUploadURLExternal", &[("filename", filename), ("length", length.as_str())])
            .await?;
        let upload_url = string_field(&ticket, "/upload_url", "files.getUploadURLExternal", "upload_url")?;
        let file_id = string_field(&ticket, "/file_id", "files.getUploadURLExternal", "file_id")?;

        self.http
            .post(&upload_url)
            .body(content.to_vec())
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|error| WebApiError::Transport(error.to_string()))?;

        self.call(
            "files.completeUploadExternal",
            serde_json::json!({
                "files": [{ "id": file_id, "title": filename }],
                "channel_id": channel_id,
                "initial_comment": comment,
            }),
        )
        .await
        .map(drop)
    }

    async fn file_info(&self, file_id: &str) -> Result<SharedFile, WebApiError> {
        let response = self.call_form("files.info", &[("file", file_id)]).await?;
        let file = response
            .get("file")
            .cloned()
            .ok_or(WebApiError::MissingField { method: "files.info", field: "file" })?;
        let raw: RawFile = serde_json::from_value(file)
            .map_err(|_| WebApiError::MissingField { method: "files.info", field: "file.id" })?;
        Ok(SharedFile { id: raw.id, name: raw.name, size: raw.size, url_private: raw.url_private })
    }

    async fn download_file(&self, url_private: &str) -> Result<Vec<u8>, WebApiError> {
        let bytes = self
            .http
            .get(url_private)
            .bearer_auth(self.bot_token.expose_secret())
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|error| WebApiError::Transport(error.to_string()))?
            .bytes()
            .await
            .map_err(|error| WebApiError::Transport(error.to_string()))?;
        Ok(bytes.to_vec())
    }
}

/// A call recorded by [`InMemorySlackWebApi`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WebApiCall {
    PostMessage { channel_id: String, ts: String, message: MessageTemplate },
    UpdateMessage { channel_id: String, ts: String, message: MessageTemplate },
    PostEphemeral { channel_id: String, user_id: String, message: MessageTemplate },
    UploadFile { channel_id: String, filename: String, content: Vec<u8>, comment: String },
}

/// Recording Web API used by tests and offline runs. Shared files are served from an
/// in-memory table.
#[derive(Default)]
pub struct InMemorySlackWebApi {
    calls: Mutex<Vec<WebApiCall>>,
    files: Mutex<Vec<(SharedFile, Vec<u8>)>>,
}

impl InMemorySlackWebApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<WebApiCall> {
        self.calls.lock().map(|calls| calls.clone()).unwrap_or_default()
    }

    /// Makes a file available to `file_info` and `download_file`.
    pub fn share_file(&self, id: &str, name: &str, content: Vec<u8>) {
        let file = SharedFile {
            id: id.to_owned(),
            name: name.to_owned(),
            size: content.len() as u64,
            url_private: format!("https://files.slack.test/{id}/{name}"),
        };
        if let Ok(mut files) = self.files.lock() {
            files.push((file, content));
        }
    }

    fn record(&self, call: WebApiCall) -> Result<usize, WebApiError> {
        let mut calls =
            self.calls.lock().map_err(|_| WebApiError::Transport("call log poisoned".to_owned()))?;
        calls.push(call);
        Ok(calls.len())
    }

    fn find_file<T>(&self, select: impl Fn(&(SharedFile, Vec<u8>)) -> Option<T>) -> Option<T> {
        self.files.lock().ok()?.iter().find_map(select)
    }
}

#[async_trait]
impl SlackWebApi for InMemorySlackWebApi {
    async fn post_message(&self, channel_id: &str, message: &MessageTemplate) -> Result<String, WebApiError> {
        let sequence = self.calls().len() + 1;
        let ts = format!("1700000000.{sequence:06}");
        self.record(WebApiCall::PostMessage {
            channel_id: channel_id.to_owned(),
            ts: ts.clone(),
            message: message.clone(),
        })?;
        Ok(ts)
    }

    async fn update_message(
        &self,
        channel_id: &str,
        ts: &str,
        message: &MessageTemplate,
    ) -> Result<(), WebApiError> {
        self.record(WebApiCall::UpdateMessage {
            channel_id: channel_id.to_owned(),
            ts: ts.to_owned(),
            message: message.clone(),
        })
        .map(drop)
    }

    async fn post_ephemeral(
        &self,
        channel_id: &str,
        user_id: &str,
        message: &MessageTemplate,
    ) -> Result<(), WebApiError> {
        self.record(WebApiCall::PostEphemeral {
            channel_id: channel_id.to_owned(),
            user_id: user_id.to_owned(),
            message: message.clone(),
        })
        .map(drop)
    }

    async fn open_direct_channel(&self, user_id: &str) -> Result<String, WebApiError> {
        Ok(format!("D-{user_id}"))
    }

    async fn upload_file(
        &self,
        channel_id: &str,
        filename: &str,
        content: &[u8],
        comment: &str,
    ) -> Result<(), WebApiError> {
        self.record(WebApiCall::UploadFile {
            channel_id: channel_id.to_owned(),
            filename: filename.to_owned(),
            content: content.to_vec(),
            comment: comment.to_owned(),
        })
        .map(drop)
    }

    async fn file_info(&self, file_id: &str) -> Result<SharedFile, WebApiError> {
        self.find_file(|(file, _)| (file.id == file_id).then(|| file.clone()))
            .ok_or_else(|| WebApiError::Api { method: "files.info", error: "file_not_found".to_owned() })
    }

    async fn download_file(&self, url_private: &str) -> Result<Vec<u8>, WebApiError> {
        self.find_file(|(file, content)| (file.url_private == url_private).then(|| content.clone()))
            .ok_or_else(|| WebApiError::Transport(format!("404 for {url_private}")))
    }
}
