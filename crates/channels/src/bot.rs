//! The compression bot: per-message chat behaviour.
//!
//! - group chats are ignored
//! - the enable phrase opts a chat in
//! - chats that never opted in are ignored silently
//! - media from opted-in chats is compressed and sent back
//!
//! Each media message runs under its own cancel handle. A newer file from the
//! same chat supersedes (cancels) the one still in flight.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use tightfit_config::BotConfig;
use tightfit_core::{
    CancelHandle, ChannelMessage, CompressionRequest, MediaAttachment, OutboundMessage,
    SessionStore,
};
use tightfit_engine::Compressor;

/// What the bot did with one inbound message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BotOutcome {
    IgnoredGroup,
    IgnoredNotEnabled,
    /// Opted-in chat, but nothing to compress.
    IgnoredNoMedia,
    Enabled,
    Compressed,
    Failed,
    /// Cancelled or superseded before a result was delivered.
    Cancelled,
}

/// Result of [`CompressionBot::admit`].
#[derive(Debug)]
pub enum Admission {
    Done(BotOutcome),
    Compress(CompressionJob),
}

/// An admitted file waiting to be compressed.
#[derive(Debug)]
pub struct CompressionJob {
    chat_id: String,
    request: CompressionRequest,
}

impl CompressionJob {
    fn new(chat_id: &str, media: &MediaAttachment) -> Self {
        let filename = media
            .filename
            .clone()
            .filter(|f| !f.trim().is_empty())
            .unwrap_or_else(|| "file".to_string());
        Self {
            chat_id: chat_id.to_string(),
            request: CompressionRequest::new(media.data.clone(), media.mime_type.clone(), filename),
        }
    }

    pub fn chat_id(&self) -> &str {
        &self.chat_id
    }
}

pub struct CompressionBot {
    compressor: Arc<Compressor>,
    sessions: Arc<dyn SessionStore>,
    config: BotConfig,
    in_flight: Mutex<HashMap<String, (u64, CancelHandle)>>,
    next_job: AtomicU64,
}

impl CompressionBot {
    pub fn new(compressor: Arc<Compressor>, sessions: Arc<dyn SessionStore>, config: BotConfig) -> Self {
        Self {
            compressor,
            sessions,
            config,
            in_flight: Mutex::new(HashMap::new()),
            next_job: AtomicU64::new(0),
        }
    }

    pub fn sessions(&self) -> &Arc<dyn SessionStore> {
        &self.sessions
    }

    /// Handle a message and collect every reply.
    pub async fn handle(&self, msg: &ChannelMessage) -> (BotOutcome, Vec<OutboundMessage>) {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let outcome = self.handle_streaming(msg, &tx).await;
        drop(tx);

        let mut replies = Vec::new();
        while let Some(reply) = rx.recv().await {
            replies.push(reply);
        }
        (outcome, replies)
    }

    /// Handle a message, emitting replies as they become available (the
    /// progress note goes out before compression starts).
    pub async fn handle_streaming(
        &self,
        msg: &ChannelMessage,
        replies: &mpsc::UnboundedSender<OutboundMessage>,
    ) -> BotOutcome {
        match self.admit(msg, replies).await {
            Admission::Done(outcome) => outcome,
            Admission::Compress(job) => self.run_job(job, replies).await,
        }
    }

    /// The cheap, ordered part of handling a message: gating, opt-in and the
    /// progress note. Returns the compression work still to do, if any.
    pub async fn admit(
        &self,
        msg: &ChannelMessage,
        replies: &mpsc::UnboundedSender<OutboundMessage>,
    ) -> Admission {
        if msg.is_group && self.config.ignore_groups {
            debug!(chat_id = %msg.chat_id, "Ignoring group message");
            return Admission::Done(BotOutcome::IgnoredGroup);
        }

        if self.is_enable_phrase(&msg.content) {
            let outcome = match self.sessions.enable(&msg.chat_id).await {
                Ok(newly) => {
                    info!(chat_id = %msg.chat_id, newly, "Compression enabled for chat");
                    send(replies, OutboundMessage::text(&self.config.enabled_text));
                    BotOutcome::Enabled
                }
                Err(e) => {
                    warn!(chat_id = %msg.chat_id, error = %e, "Failed to enable chat");
                    send(replies, OutboundMessage::text(&self.config.failure_text));
                    BotOutcome::Failed
                }
            };
            return Admission::Done(outcome);
        }

        match self.sessions.is_enabled(&msg.chat_id).await {
            Ok(true) => {}
            Ok(false) => {
                debug!(chat_id = %msg.chat_id, "Chat not enabled, ignoring");
                return Admission::Done(BotOutcome::IgnoredNotEnabled);
            }
            Err(e) => {
                warn!(chat_id = %msg.chat_id, error = %e, "Session lookup failed, ignoring");
                return Admission::Done(BotOutcome::IgnoredNotEnabled);
            }
        }

        let Some(media) = &msg.media else {
            return Admission::Done(BotOutcome::IgnoredNoMedia);
        };

        send(replies, OutboundMessage::text(&self.config.progress_text));
        Admission::Compress(CompressionJob::new(&msg.chat_id, media))
    }

    /// Compress an admitted file and emit the result (or the failure note).
    pub async fn run_job(
        &self,
        job: CompressionJob,
        replies: &mpsc::UnboundedSender<OutboundMessage>,
    ) -> BotOutcome {
        let CompressionJob { chat_id, request } = job;
        let chat_id = chat_id.as_str();

        let job = self.next_job.fetch_add(1, Ordering::Relaxed);
        let (handle, token) = CancelHandle::new();
        {
            let mut in_flight = self.in_flight.lock().unwrap_or_else(|e| e.into_inner());
            if let Some((_, previous)) = in_flight.insert(chat_id.to_string(), (job, handle)) {
                debug!(chat_id, "Superseding in-flight compression");
                previous.cancel();
            }
        }

        let result = self.compressor.compress_with_cancel(&request, &token).await;

        {
            let mut in_flight = self.in_flight.lock().unwrap_or_else(|e| e.into_inner());
            if in_flight.get(chat_id).is_some_and(|(id, _)| *id == job) {
                in_flight.remove(chat_id);
            }
        }

        if token.is_cancelled() {
            info!(chat_id, "Compression cancelled, no reply sent");
            return BotOutcome::Cancelled;
        }

        match result {
            Ok(artifact) => {
                info!(
                    chat_id,
                    filename = %artifact.suggested_filename(),
                    size_bytes = artifact.size_bytes(),
                    "Sending compressed file"
                );
                send(
                    replies,
                    OutboundMessage::Media {
                        artifact,
                        caption: Some(self.config.success_caption.clone()),
                    },
                );
                BotOutcome::Compressed
            }
            Err(e) => {
                warn!(chat_id, error = %e, "Compression rejected");
                send(replies, OutboundMessage::text(&self.config.failure_text));
                BotOutcome::Failed
            }
        }
    }

    /// Cancel the compression running for `chat_id`, if any.
    pub fn cancel(&self, chat_id: &str) -> bool {
        let mut in_flight = self.in_flight.lock().unwrap_or_else(|e| e.into_inner());
        match in_flight.remove(chat_id) {
            Some((_, handle)) => {
                handle.cancel();
                true
            }
            None => false,
        }
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    fn is_enable_phrase(&self, content: &str) -> bool {
        content.trim().eq_ignore_ascii_case(self.config.enable_phrase.trim())
    }
}

fn send(replies: &mpsc::UnboundedSender<OutboundMessage>, message: OutboundMessage) {
    if replies.send(message).is_err() {
        debug!("Reply receiver dropped");
    }
}
