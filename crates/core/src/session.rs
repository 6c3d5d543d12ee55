//! Session store trait: which chats have opted in to compression.
//!
//! Injected into the bot rather than held in global state, so transports and
//! tests can supply their own backend.

use async_trait::async_trait;

use crate::error::SessionError;

#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Backend name (e.g., "in_memory", "file").
    fn name(&self) -> &str;

    /// Enable compression for a chat. Returns `true` if it was newly enabled.
    async fn enable(&self, chat_id: &str) -> Result<bool, SessionError>;

    /// Disable compression for a chat. Returns `true` if it was enabled.
    async fn disable(&self, chat_id: &str) -> Result<bool, SessionError>;

    async fn is_enabled(&self, chat_id: &str) -> Result<bool, SessionError>;

    /// Number of enabled chats.
    async fn count(&self) -> Result<usize, SessionError>;
}
