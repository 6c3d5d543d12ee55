//! In-memory session store: the default; opt-ins last for the process lifetime.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tightfit_core::SessionStore;
use tightfit_core::error::SessionError;
use tokio::sync::RwLock;

pub struct InMemorySessionStore {
    chats: Arc<RwLock<HashMap<String, DateTime<Utc>>>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self {
            chats: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// When `chat_id` opted in, if it has.
    pub async fn enabled_at(&self, chat_id: &str) -> Option<DateTime<Utc>> {
        self.chats.read().await.get(chat_id).copied()
    }
}

impl Default for InMemorySessionStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    fn name(&self) -> &str {
        "in_memory"
    }

    async fn enable(&self, chat_id: &str) -> Result<bool, SessionError> {
        let mut chats = self.chats.write().await;
        if chats.contains_key(chat_id) {
            return Ok(false);
        }
        chats.insert(chat_id.to_string(), Utc::now());
        Ok(true)
    }

    async fn disable(&self, chat_id: &str) -> Result<bool, SessionError> {
        Ok(self.chats.write().await.remove(chat_id).is_some())
    }

    async fn is_enabled(&self, chat_id: &str) -> Result<bool, SessionError> {
        Ok(self.chats.read().await.contains_key(chat_id))
    }

    async fn count(&self) -> Result<usize, SessionError> {
        Ok(self.chats.read().await.len())
    }
}
