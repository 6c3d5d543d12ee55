//! Webhook channel adapter.
//!
//! Inbound HTTP POSTs (decoded by the gateway) are injected into this
//! channel's stream. Replies are queued per chat in an outbox that the HTTP
//! client drains. An optional HMAC-SHA256 shared secret authenticates
//! payloads.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use tightfit_core::channel::{Channel, ChannelId, ChannelMessage, OutboundMessage};
use tightfit_core::error::ChannelError;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

type HmacSha256 = Hmac<Sha256>;

/// Webhook channel configuration.
#[derive(Debug, Clone)]
pub struct WebhookConfig {
    /// HMAC shared secret for signature validation. Empty = no validation.
    pub shared_secret: Option<String>,
    /// Allowed sender identifiers. Empty = deny all, ["*"] = allow all.
    pub allowed_senders: Vec<String>,
    /// Replies kept per chat before the oldest is dropped.
    pub outbox_limit: usize,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            shared_secret: None,
            allowed_senders: vec!["*".into()],
            outbox_limit: 32,
        }
    }
}

/// Webhook channel adapter.
pub struct WebhookChannel {
    config: WebhookConfig,
    channel_id: ChannelId,
    inject_tx: tokio::sync::Mutex<Option<mpsc::Sender<Result<ChannelMessage, ChannelError>>>>,
    outbox: Mutex<HashMap<String, VecDeque<OutboundMessage>>>,
}

impl WebhookChannel {
    pub fn new(config: WebhookConfig) -> Self {
        Self {
            config,
            channel_id: ChannelId("webhook".into()),
            inject_tx: tokio::sync::Mutex::new(None),
            outbox: Mutex::new(HashMap::new()),
        }
    }

    /// Whether payloads must carry a signature.
    pub fn requires_signature(&self) -> bool {
        self.config
            .shared_secret
            .as_deref()
            .is_some_and(|s| !s.is_empty())
    }

    /// Inject a webhook message (called by the HTTP handler).
    pub async fn inject_message(&self, msg: ChannelMessage) -> Result<(), ChannelError> {
        let guard = self.inject_tx.lock().await;
        if let Some(tx) = guard.as_ref() {
            tx.send(Ok(msg))
                .await
                .map_err(|_| ChannelError::ConnectionLost("Message channel closed".into()))
        } else {
            Err(ChannelError::ConnectionLost(
                "Webhook channel not started".into(),
            ))
        }
    }

    /// Validate an HMAC-SHA256 signature against the shared secret.
    ///
    /// Accepts `sha256=<hex_digest>` or a bare `<hex_digest>`. The comparison
    /// is constant-time.
    pub fn validate_signature(&self, payload: &[u8], signature: &str) -> bool {
        match &self.config.shared_secret {
            None => true,
            Some(secret) if secret.is_empty() => true,
            Some(secret) => {
                let sig_hex = signature.trim().strip_prefix("sha256=").unwrap_or(signature.trim());
                let Ok(provided) = hex::decode(sig_hex) else {
                    return false;
                };
                let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
                    return false;
                };
                mac.update(payload);
                mac.verify_slice(&provided).is_ok()
            }
        }
    }

    /// Drain the replies queued for `chat_id`, oldest first.
    pub fn take_replies(&self, chat_id: &str) -> Vec<OutboundMessage> {
        let mut outbox = self.outbox.lock().unwrap_or_else(|e| e.into_inner());
        outbox
            .remove(chat_id)
            .map(Vec::from)
            .unwrap_or_default()
    }

    /// Number of chats with undelivered replies.
    pub fn pending_chats(&self) -> usize {
        self.outbox.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

/// The `sha256=<hex>` signature a client sends for `payload`.
pub fn sign_payload(secret: &str, payload: &[u8]) -> Option<String> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).ok()?;
    mac.update(payload);
    Some(format!("sha256={}", hex::encode(mac.finalize().into_bytes())))
}

#[async_trait]
impl Channel for WebhookChannel {
    fn name(&self) -> &str {
        "webhook"
    }

    fn id(&self) -> &ChannelId {
        &self.channel_id
    }

    async fn start(
        &self,
    ) -> Result<mpsc::Receiver<Result<ChannelMessage, ChannelError>>, ChannelError> {
        info!("Webhook channel starting");
        let (tx, rx) = mpsc::channel(64);
        *self.inject_tx.lock().await = Some(tx);
        Ok(rx)
    }

    async fn send(
        &self,
        chat_id: &str,
        message: &OutboundMessage,
        _reply_to: Option<&str>,
    ) -> Result<(), ChannelError> {
        let mut outbox = self.outbox.lock().unwrap_or_else(|e| e.into_inner());
        let queue = outbox.entry(chat_id.to_string()).or_default();
        if queue.len() >= self.config.outbox_limit.max(1) {
            warn!(chat_id = %chat_id, "Webhook outbox full, dropping oldest reply");
            queue.pop_front();
        }
        queue.push_back(message.clone());
        debug!(chat_id = %chat_id, queued = queue.len(), "Webhook reply queued");
        Ok(())
    }

    fn is_allowed(&self, sender_id: &str) -> bool {
        if self.config.allowed_senders.is_empty() {
            return false;
        }
        if self.config.allowed_senders.iter().any(|s| s == "*") {
            return true;
        }
        self.config.allowed_senders.iter().any(|s| s == sender_id)
    }

    async fn stop(&self) -> Result<(), ChannelError> {
        self.inject_tx.lock().await.take();
        Ok(())
    }

    async fn health_check(&self) -> Result<bool, ChannelError> {
        Ok(self.inject_tx.lock().await.is_some())
    }
}
