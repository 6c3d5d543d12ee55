//! Drive the bot over every registered channel.
//!
//! Messages are admitted in arrival order; each compression then runs on its
//! own task so a large file in one chat never blocks another. Replies stream
//! back through the registry as the bot produces them.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use tightfit_core::OutboundMessage;
use tightfit_core::error::ChannelError;

use crate::bot::{Admission, CompressionBot};
use crate::registry::ChannelRegistry;

/// Run until every channel's stream has closed, then wait for in-flight
/// messages to finish.
pub async fn run(
    registry: Arc<ChannelRegistry>,
    bot: Arc<CompressionBot>,
) -> Result<(), ChannelError> {
    let mut inbound = registry.start_all().await?;
    let mut tasks = JoinSet::new();

    while let Some((channel_name, result)) = inbound.recv().await {
        let msg = match result {
            Ok(msg) => msg,
            Err(ChannelError::ConnectionLost(reason)) => {
                warn!(channel = %channel_name, %reason, "Channel connection lost");
                continue;
            }
            Err(e) => {
                warn!(channel = %channel_name, error = %e, "Dropping bad inbound message");
                continue;
            }
        };

        if !registry.admits(&channel_name, &msg.sender_id) {
            warn!(channel = %channel_name, sender_id = %msg.sender_id, "Sender not allowed");
            continue;
        }

        // Admission runs inline so messages from one chat apply in order
        // (an opt-in always lands before the file that follows it).
        let (tx, rx) = mpsc::unbounded_channel();
        let reply_to = msg.reply_to_message_id.clone();
        match bot.admit(&msg, &tx).await {
            Admission::Done(outcome) => {
                debug!(chat_id = %msg.chat_id, ?outcome, "Message handled");
                drop(tx);
                deliver(&registry, &channel_name, &msg.chat_id, reply_to.as_deref(), rx).await;
            }
            Admission::Compress(job) => {
                let registry = registry.clone();
                let bot = bot.clone();
                let chat_id = msg.chat_id.clone();
                tasks.spawn(async move {
                    let work = async move {
                        let outcome = bot.run_job(job, &tx).await;
                        debug!(?outcome, "Compression job finished");
                    };
                    let delivery = deliver(&registry, &channel_name, &chat_id, reply_to.as_deref(), rx);
                    tokio::join!(work, delivery);
                });
            }
        }

        // Reap finished tasks so the set does not grow unbounded.
        while let Some(done) = tasks.try_join_next() {
            log_join(done);
        }
    }

    info!(pending = tasks.len(), "Inbound streams closed, draining");
    while let Some(done) = tasks.join_next().await {
        log_join(done);
    }
    registry.stop_all().await;
    Ok(())
}

async fn deliver(
    registry: &ChannelRegistry,
    channel_name: &str,
    chat_id: &str,
    reply_to: Option<&str>,
    mut replies: mpsc::UnboundedReceiver<OutboundMessage>,
) {
    while let Some(reply) = replies.recv().await {
        if let Err(e) = registry.send_to(channel_name, chat_id, &reply, reply_to).await {
            warn!(channel = %channel_name, chat_id = %chat_id, error = %e, "Reply delivery failed");
        }
    }
}

fn log_join(result: Result<(), tokio::task::JoinError>) {
    if let Err(e) = result {
        warn!(error = %e, "Message task failed");
    }
}
