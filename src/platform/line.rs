//! LINE Messaging API: webhook payloads, signature validation and the
//! reply/push client.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use tracing::debug;

use crate::config::LineConfig;
use crate::platform::{IncomingMessage, MessageSource, Messenger};

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_HEADER: &str = "x-line-signature";

/// Check `signature` (base64 HMAC-SHA256 of the raw body keyed by the
/// channel secret). Comparison is constant-time.
pub fn verify_signature(channel_secret: &str, body: &[u8], signature: &str) -> bool {
    let expected = match BASE64.decode(signature.trim()) {
        Ok(bytes) => bytes,
        Err(_) => return false,
    };
    let mut mac = match HmacSha256::new_from_slice(channel_secret.as_bytes()) {
        Ok(mac) => mac,
        Err(_) => return false,
    };
    mac.update(body);
    mac.verify_slice(&expected).is_ok()
}

#[cfg(test)]
pub(crate) fn sign(channel_secret: &str, body: &[u8]) -> String {
    let mut mac = HmacSha256::new_from_slice(channel_secret.as_bytes()).unwrap();
    mac.update(body);
    BASE64.encode(mac.finalize().into_bytes())
}

// ── Webhook payload ────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct WebhookPayload {
    /// The bot's own user ID. Informational; only logged.
    #[serde(default)]
    pub destination: Option<String>,
    #[serde(default)]
    pub events: Vec<WebhookEvent>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(default)]
    pub reply_token: Option<String>,
    #[serde(default)]
    pub source: Option<EventSource>,
    #[serde(default)]
    pub message: Option<EventMessage>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventSource {
    #[serde(rename = "type")]
    pub source_type: String,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub group_id: Option<String>,
    #[serde(default)]
    pub room_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct EventMessage {
    #[serde(rename = "type")]
    pub message_type: String,
    #[serde(default)]
    pub text: Option<String>,
}

impl WebhookPayload {
    pub fn parse(body: &[u8]) -> Result<Self> {
        serde_json::from_slice(body).context("Failed to parse webhook payload")
    }
}

impl EventSource {
    fn to_source(&self) -> Option<MessageSource> {
        match self.source_type.as_str() {
            "user" => Some(MessageSource::User {
                user_id: self.user_id.clone()?,
            }),
            "group" => Some(MessageSource::Group {
                group_id: self.group_id.clone()?,
                user_id: self.user_id.clone(),
            }),
            "room" => Some(MessageSource::Room {
                room_id: self.room_id.clone()?,
                user_id: self.user_id.clone(),
            }),
            _ => None,
        }
    }
}

impl WebhookEvent {
    /// The text message carried by this event, if it is one.
    pub fn as_text_message(&self) -> Option<IncomingMessage> {
        if self.event_type != "message" {
            return None;
        }
        let message = self.message.as_ref()?;
        if message.message_type != "text" {
            return None;
        }
        Some(IncomingMessage {
            source: self.source.as_ref()?.to_source()?,
            reply_token: self.reply_token.clone()?,
            text: message.text.clone()?,
        })
    }
}

// ── Outbound API ───────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct TextMessage<'a> {
    #[serde(rename = "type")]
    message_type: &'static str,
    text: &'a str,
}

impl<'a> TextMessage<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            message_type: "text",
            text,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ReplyRequest<'a> {
    reply_token: &'a str,
    messages: Vec<TextMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct PushRequest<'a> {
    to: &'a str,
    messages: Vec<TextMessage<'a>>,
}

pub struct LineClient {
    client: reqwest::Client,
    base_url: String,
    access_token: String,
}

impl LineClient {
    pub fn new(config: &LineConfig, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            client,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            access_token: config.channel_access_token.clone(),
        })
    }

    async fn post<T: Serialize>(&self, path: &str, body: &T) -> Result<()> {
        let url = format!("{}{}", self.base_url, path);

        debug!("Sending request to LINE: {}", url);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.access_token)
            .json(body)
            .send()
            .await
            .with_context(|| format!("Failed to send request to {}", url))?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            anyhow::bail!("LINE API error ({}): {}", status, error_body);
        }
        Ok(())
    }
}

#[async_trait]
impl Messenger for LineClient {
    async fn reply_text(&self, reply_token: &str, text: &str) -> Result<()> {
        let request = ReplyRequest {
            reply_token,
            messages: vec![TextMessage::new(text)],
        };
        self.post("/v2/bot/message/reply", &request).await
    }

    async fn push_text(&self, to: &str, text: &str) -> Result<()> {
        let request = PushRequest {
            to,
            messages: vec![TextMessage::new(text)],
        };
        self.post("/v2/bot/message/push", &request).await
    }
}
