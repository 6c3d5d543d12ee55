//! The set of transports the runner serves.
//!
//! The runner sees one merged inbound stream tagged with the channel name,
//! gates each sender through the channel it arrived on, and routes the bot's
//! replies back the same way.

use std::collections::HashMap;
use std::sync::Arc;

use tightfit_core::channel::{Channel, ChannelMessage, OutboundMessage};
use tightfit_core::error::ChannelError;
use tokio::sync::mpsc;
use tracing::{info, warn};

/// One inbound item: the channel it came from and what it yielded.
pub type Inbound = (String, Result<ChannelMessage, ChannelError>);

const MERGED_BUFFER: usize = 256;

#[derive(Default)]
pub struct ChannelRegistry {
    channels: HashMap<String, Arc<dyn Channel>>,
}

impl ChannelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a transport. A later channel with the same name replaces the earlier one.
    pub fn register(&mut self, channel: Arc<dyn Channel>) {
        let name = channel.name().to_string();
        info!(channel = %name, "Registered channel");
        self.channels.insert(name, channel);
    }

    /// Start every channel and forward their streams into one receiver.
    ///
    /// The receiver closes once every channel's own stream has closed.
    pub async fn start_all(&self) -> Result<mpsc::Receiver<Inbound>, ChannelError> {
        let (merged_tx, merged_rx) = mpsc::channel(MERGED_BUFFER);

        for (name, channel) in &self.channels {
            let mut rx = channel.start().await?;
            let tx = merged_tx.clone();
            let name = name.clone();
            info!(channel = %name, "Started channel");

            tokio::spawn(async move {
                while let Some(item) = rx.recv().await {
                    if tx.send((name.clone(), item)).await.is_err() {
                        break;
                    }
                }
            });
        }

        Ok(merged_rx)
    }

    /// Whether `sender_id` may talk to the bot over `channel_name`.
    /// Unknown channels admit nobody.
    pub fn admits(&self, channel_name: &str, sender_id: &str) -> bool {
        self.channels
            .get(channel_name)
            .is_some_and(|channel| channel.is_allowed(sender_id))
    }

    /// Deliver one bot reply to the chat it answers.
    pub async fn send_to(
        &self,
        channel_name: &str,
        chat_id: &str,
        reply: &OutboundMessage,
        reply_to: Option<&str>,
    ) -> Result<(), ChannelError> {
        let channel = self.channels.get(channel_name).ok_or_else(|| {
            ChannelError::NotConfigured(format!("no channel named '{channel_name}'"))
        })?;
        channel.send(chat_id, reply, reply_to).await
    }

    pub async fn stop_all(&self) {
        for (name, channel) in &self.channels {
            if let Err(e) = channel.stop().await {
                warn!(channel = %name, error = %e, "Failed to stop channel");
            }
        }
    }

    /// Channel name to liveness, for the gateway's health route.
    pub async fn health_check_all(&self) -> HashMap<String, bool> {
        let mut health = HashMap::with_capacity(self.channels.len());
        for (name, channel) in &self.channels {
            health.insert(name.clone(), channel.health_check().await.unwrap_or(false));
        }
        health
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, Ordering};
    use tightfit_core::Artifact;
    use tightfit_core::channel::ChannelId;

    /// A transport that yields a fixed script of messages and records replies.
    struct ScriptedChannel {
        name: String,
        id: ChannelId,
        allowed: Vec<String>,
        script: Mutex<Vec<ChannelMessage>>,
        started: AtomicBool,
        stopped: AtomicBool,
        sent: Mutex<Vec<(String, OutboundMessage)>>,
    }

    impl ScriptedChannel {
        fn new(name: &str, allowed: &[&str], script: Vec<ChannelMessage>) -> Arc<Self> {
            Arc::new(Self {
                name: name.into(),
                id: ChannelId(name.into()),
                allowed: allowed.iter().map(|s| s.to_string()).collect(),
                script: Mutex::new(script),
                started: AtomicBool::new(false),
                stopped: AtomicBool::new(false),
                sent: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl Channel for ScriptedChannel {
        fn name(&self) -> &str {
            &self.name
        }

        fn id(&self) -> &ChannelId {
            &self.id
        }

        async fn start(
            &self,
        ) -> Result<mpsc::Receiver<Result<ChannelMessage, ChannelError>>, ChannelError> {
            self.started.store(true, Ordering::SeqCst);
            let script = std::mem::take(&mut *self.script.lock().unwrap());
            let (tx, rx) = mpsc::channel(script.len().max(1));
            for msg in script {
                tx.send(Ok(msg)).await.unwrap();
            }
            Ok(rx)
        }

        async fn send(
            &self,
            chat_id: &str,
            message: &OutboundMessage,
            _reply_to: Option<&str>,
        ) -> Result<(), ChannelError> {
            self.sent
                .lock()
                .unwrap()
                .push((chat_id.to_string(), message.clone()));
            Ok(())
        }

        fn is_allowed(&self, sender_id: &str) -> bool {
            self.allowed.iter().any(|a| a == "*" || a == sender_id)
        }

        async fn stop(&self) -> Result<(), ChannelError> {
            self.stopped.store(true, Ordering::SeqCst);
            Ok(())
        }

        async fn health_check(&self) -> Result<bool, ChannelError> {
            Ok(self.started.load(Ordering::SeqCst) && !self.stopped.load(Ordering::SeqCst))
        }
    }

    #[tokio::test]
    async fn merged_stream_tags_each_message_with_its_channel() {
        let cli = ScriptedChannel::new(
            "cli",
            &["*"],
            vec![ChannelMessage::text(ChannelId("cli".into()), "local", "help compress")],
        );
        let webhook = ScriptedChannel::new(
            "webhook",
            &["*"],
            vec![ChannelMessage::text(ChannelId("webhook".into()), "7", "ok")],
        );
        let mut registry = ChannelRegistry::new();
        registry.register(cli);
        registry.register(webhook);

        let mut inbound = registry.start_all().await.unwrap();
        let mut seen = Vec::new();
        while let Some((channel, item)) = inbound.recv().await {
            seen.push((channel, item.unwrap().sender_id));
        }
        seen.sort();
        assert_eq!(
            seen,
            vec![
                ("cli".to_string(), "local".to_string()),
                ("webhook".to_string(), "7".to_string()),
            ]
        );
    }

    #[test]
    fn senders_are_gated_by_their_own_channel() {
        let mut registry = ChannelRegistry::new();
        registry.register(ScriptedChannel::new("cli", &["*"], vec![]));
        registry.register(ScriptedChannel::new("webhook", &["7"], vec![]));

        assert!(registry.admits("cli", "anyone"));
        assert!(registry.admits("webhook", "7"));
        assert!(!registry.admits("webhook", "8"));
        assert!(!registry.admits("sms", "7"));
    }

    #[tokio::test]
    async fn replies_reach_the_originating_channel_only() {
        let cli = ScriptedChannel::new("cli", &["*"], vec![]);
        let webhook = ScriptedChannel::new("webhook", &["*"], vec![]);
        let mut registry = ChannelRegistry::new();
        registry.register(cli.clone());
        registry.register(webhook.clone());

        let file = OutboundMessage::Media {
            artifact: Artifact::new(vec![0xFF, 0xD8, 0xFF], "image/jpeg", "p_compressed.jpg"),
            caption: Some("Compressed size: 3 B".into()),
        };
        registry.send_to("webhook", "7", &file, None).await.unwrap();

        assert!(cli.sent.lock().unwrap().is_empty());
        let sent = webhook.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "7");
        assert_eq!(sent[0].1.caption(), Some("Compressed size: 3 B"));

        let missing = registry
            .send_to("sms", "7", &OutboundMessage::text("hi"), None)
            .await;
        assert!(matches!(missing, Err(ChannelError::NotConfigured(_))));
    }

    #[tokio::test]
    async fn health_follows_start_and_stop() {
        let webhook = ScriptedChannel::new("webhook", &["*"], vec![]);
        let mut registry = ChannelRegistry::new();
        registry.register(webhook.clone());

        assert_eq!(registry.health_check_all().await.get("webhook"), Some(&false));
        let _inbound = registry.start_all().await.unwrap();
        assert_eq!(registry.health_check_all().await.get("webhook"), Some(&true));
        registry.stop_all().await;
        assert!(webhook.stopped.load(Ordering::SeqCst));
        assert_eq!(registry.health_check_all().await.get("webhook"), Some(&false));
    }
}
