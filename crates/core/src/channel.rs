//! Channel trait: the abstraction over chat transports.
//!
//! A Channel connects tightfit to a messaging surface (terminal, webhook,
//! a chat platform bridge). It receives messages, possibly carrying media,
//! and delivers text or file replies back to the same chat.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::artifact::Artifact;
use crate::error::ChannelError;

/// Unique identifier for a channel instance.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChannelId(pub String);

impl std::fmt::Display for ChannelId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A message received from a channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelMessage {
    /// The channel this message belongs to
    pub channel_id: ChannelId,

    /// Sender identifier (platform-specific user ID)
    pub sender_id: String,

    /// Human-readable sender name (if available)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender_name: Option<String>,

    /// The text content
    #[serde(default)]
    pub content: String,

    /// The chat/group/DM identifier within the channel
    pub chat_id: String,

    /// Whether the chat is a group conversation
    #[serde(default)]
    pub is_group: bool,

    /// Whether this is a reply to a specific message
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_to_message_id: Option<String>,

    /// Downloaded media, if the message carried a file
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media: Option<MediaAttachment>,

    /// Platform-specific metadata
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl ChannelMessage {
    /// A plain text message in a direct chat.
    pub fn text(
        channel_id: ChannelId,
        sender_id: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        let sender_id = sender_id.into();
        Self {
            channel_id,
            chat_id: sender_id.clone(),
            sender_id,
            sender_name: None,
            content: content.into(),
            is_group: false,
            reply_to_message_id: None,
            media: None,
            metadata: serde_json::Map::new(),
        }
    }

    pub fn with_media(mut self, media: MediaAttachment) -> Self {
        self.media = Some(media);
        self
    }
}

/// A downloaded file attached to an inbound message.
#[derive(Clone, Serialize, Deserialize)]
pub struct MediaAttachment {
    pub mime_type: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,

    pub data: Vec<u8>,
}

impl std::fmt::Debug for MediaAttachment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediaAttachment")
            .field("mime_type", &self.mime_type)
            .field("filename", &self.filename)
            .field("size_bytes", &self.data.len())
            .finish()
    }
}

/// A reply to deliver back to a chat.
#[derive(Debug, Clone)]
pub enum OutboundMessage {
    Text(String),
    Media {
        artifact: Artifact,
        caption: Option<String>,
    },
}

impl OutboundMessage {
    pub fn text(content: impl Into<String>) -> Self {
        Self::Text(content.into())
    }

    /// The human-readable part: the text, or the caption of a file.
    pub fn caption(&self) -> Option<&str> {
        match self {
            Self::Text(t) => Some(t),
            Self::Media { caption, .. } => caption.as_deref(),
        }
    }
}

/// The core Channel trait.
///
/// Implementations handle platform-specific connection logic, media
/// download/upload and authentication.
#[async_trait]
pub trait Channel: Send + Sync {
    /// Human-readable channel name (e.g., "cli", "webhook").
    fn name(&self) -> &str;

    /// Unique ID for this channel instance.
    fn id(&self) -> &ChannelId;

    /// Start listening for incoming messages.
    async fn start(
        &self,
    ) -> std::result::Result<
        tokio::sync::mpsc::Receiver<std::result::Result<ChannelMessage, ChannelError>>,
        ChannelError,
    >;

    /// Send a reply to a specific chat.
    async fn send(
        &self,
        chat_id: &str,
        message: &OutboundMessage,
        reply_to: Option<&str>,
    ) -> std::result::Result<(), ChannelError>;

    /// Check if a sender is allowed (allowlist check).
    fn is_allowed(&self, sender_id: &str) -> bool;

    /// Stop the channel gracefully.
    async fn stop(&self) -> std::result::Result<(), ChannelError> {
        Ok(())
    }

    /// Health check: is the channel connected and operational?
    async fn health_check(&self) -> std::result::Result<bool, ChannelError> {
        Ok(true)
    }
}
