//! Webhook routes.
//!
//! `POST /webhook` accepts a JSON message (media base64-encoded), injects it
//! into the webhook channel and answers `202 Accepted`. The bot's replies
//! queue per chat and are drained with `GET /webhook/replies/{chat_id}`.
//!
//! With a shared secret configured, both routes require `X-Signature:
//! sha256=<hex>`: over the raw body for `POST`, over the chat id for the
//! drain.

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::Json;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use tightfit_core::{Channel, ChannelId, ChannelMessage, MediaAttachment, OutboundMessage};

use crate::SharedState;

/// Header carrying `sha256=<hex>` of the raw body.
pub const SIGNATURE_HEADER: &str = "x-signature";

type ApiError = (StatusCode, Json<serde_json::Value>);

fn reject(status: StatusCode, message: impl Into<String>) -> ApiError {
    (status, Json(serde_json::json!({ "error": message.into() })))
}

/// Inbound webhook body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookPayload {
    pub sender_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender_name: Option<String>,
    /// Defaults to `sender_id` (a direct chat).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chat_id: Option<String>,
    #[serde(default)]
    pub is_group: bool,
    #[serde(default)]
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media: Option<MediaPayload>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaPayload {
    pub mime_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    pub data_base64: String,
}

impl WebhookPayload {
    pub fn into_message(self, channel_id: ChannelId) -> Result<ChannelMessage, String> {
        if self.sender_id.trim().is_empty() {
            return Err("sender_id must not be empty".into());
        }

        let media = match self.media {
            None => None,
            Some(media) => {
                let data = BASE64
                    .decode(media.data_base64.trim())
                    .map_err(|e| format!("media.data_base64 is not valid base64: {e}"))?;
                if data.is_empty() {
                    return Err("media is empty".into());
                }
                Some(MediaAttachment {
                    mime_type: media.mime_type,
                    filename: media.filename,
                    data,
                })
            }
        };

        let mut msg = ChannelMessage::text(channel_id, self.sender_id, self.text);
        if let Some(chat_id) = self.chat_id.filter(|c| !c.trim().is_empty()) {
            msg.chat_id = chat_id;
        }
        msg.sender_name = self.sender_name;
        msg.is_group = self.is_group;
        msg.reply_to_message_id = self.message_id;
        msg.media = media;
        Ok(msg)
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AcceptedResponse {
    pub accepted: bool,
    pub chat_id: String,
}

/// One queued reply, as returned to the HTTP client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ReplyPayload {
    Text {
        text: String,
    },
    Media {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        caption: Option<String>,
        mime_type: String,
        filename: String,
        size_bytes: u64,
        data_base64: String,
    },
}

impl From<&OutboundMessage> for ReplyPayload {
    fn from(message: &OutboundMessage) -> Self {
        match message {
            OutboundMessage::Text(text) => Self::Text { text: text.clone() },
            OutboundMessage::Media { artifact, caption } => Self::Media {
                caption: caption.clone(),
                mime_type: artifact.mime_type().to_string(),
                filename: artifact.suggested_filename().to_string(),
                size_bytes: artifact.size_bytes(),
                data_base64: BASE64.encode(artifact.bytes()),
            },
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RepliesResponse {
    pub chat_id: String,
    pub replies: Vec<ReplyPayload>,
}

pub(crate) async fn webhook_handler(
    State(state): State<SharedState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, Json<AcceptedResponse>), ApiError> {
    let webhook = &state.webhook;

    if webhook.requires_signature() {
        let signature = headers
            .get(SIGNATURE_HEADER)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();
        if !webhook.validate_signature(&body, signature) {
            warn!("Webhook signature missing or invalid");
            return Err(reject(StatusCode::UNAUTHORIZED, "invalid signature"));
        }
    }

    let payload: WebhookPayload = serde_json::from_slice(&body)
        .map_err(|e| reject(StatusCode::BAD_REQUEST, format!("invalid payload: {e}")))?;

    if !webhook.is_allowed(&payload.sender_id) {
        warn!(sender_id = %payload.sender_id, "Webhook sender not allowed");
        return Err(reject(StatusCode::FORBIDDEN, "sender not allowed"));
    }

    let msg = payload
        .into_message(webhook.id().clone())
        .map_err(|reason| reject(StatusCode::BAD_REQUEST, reason))?;
    let chat_id = msg.chat_id.clone();

    info!(
        chat_id = %chat_id,
        has_media = msg.media.is_some(),
        "Webhook message received"
    );

    webhook.inject_message(msg).await.map_err(|e| {
        warn!(error = %e, "Webhook channel unavailable");
        reject(StatusCode::SERVICE_UNAVAILABLE, e.to_string())
    })?;

    Ok((
        StatusCode::ACCEPTED,
        Json(AcceptedResponse {
            accepted: true,
            chat_id,
        }),
    ))
}

pub(crate) async fn replies_handler(
    State(state): State<SharedState>,
    Path(chat_id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<RepliesResponse>, ApiError> {
    // Draining hands out the chat's files, so it is signed like the inbound
    // route. The signed payload is the chat id.
    if state.webhook.requires_signature() {
        let signature = headers
            .get(SIGNATURE_HEADER)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();
        if !state.webhook.validate_signature(chat_id.as_bytes(), signature) {
            warn!(chat_id = %chat_id, "Reply drain signature missing or invalid");
            return Err(reject(StatusCode::UNAUTHORIZED, "invalid signature"));
        }
    }

    let replies = state
        .webhook
        .take_replies(&chat_id)
        .iter()
        .map(ReplyPayload::from)
        .collect();
    Ok(Json(RepliesResponse { chat_id, replies }))
}
