//! File-based session store: persistent JSON-lines storage.
//!
//! Each line is one enabled chat: `{"chat_id": "...", "enabled_at": "..."}`.
//! Chats are loaded on creation and the whole file is rewritten on every
//! change, so opt-ins survive restarts.
//!
//! Default location: `~/.tightfit/sessions.jsonl`

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tightfit_core::SessionStore;
use tightfit_core::error::SessionError;
use tokio::sync::RwLock;
use tracing::{debug, warn};

#[derive(Debug, Clone, Serialize, Deserialize)]
struct EnabledChat {
    chat_id: String,
    enabled_at: DateTime<Utc>,
}

pub struct FileSessionStore {
    path: PathBuf,
    chats: Arc<RwLock<Vec<EnabledChat>>>,
}

impl FileSessionStore {
    /// Open the store at `path`. A missing file starts empty and is created
    /// on the first write.
    pub fn new(path: PathBuf) -> Self {
        let chats = Self::load_from_disk(&path);
        debug!(path = %path.display(), count = chats.len(), "File session store loaded");
        Self {
            path,
            chats: Arc::new(RwLock::new(chats)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load_from_disk(path: &Path) -> Vec<EnabledChat> {
        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(_) => return Vec::new(),
        };

        let mut chats: Vec<EnabledChat> = Vec::new();
        for line in content.lines().filter(|l| !l.trim().is_empty()) {
            match serde_json::from_str::<EnabledChat>(line) {
                Ok(chat) if !chats.iter().any(|c| c.chat_id == chat.chat_id) => chats.push(chat),
                Ok(_) => {}
                Err(e) => warn!(error = %e, "Skipping corrupted session entry"),
            }
        }
        chats
    }

    /// Rewrite the file from `chats`. Called with the write lock held.
    fn flush(&self, chats: &[EnabledChat]) -> Result<(), SessionError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                SessionError::Storage(format!("Failed to create session directory: {e}"))
            })?;
        }

        let mut content = String::new();
        for chat in chats {
            let line = serde_json::to_string(chat).map_err(|e| {
                SessionError::Storage(format!("Failed to serialize session entry: {e}"))
            })?;
            content.push_str(&line);
            content.push('\n');
        }

        std::fs::write(&self.path, content)
            .map_err(|e| SessionError::Storage(format!("Failed to write session file: {e}")))
    }
}

#[async_trait]
impl SessionStore for FileSessionStore {
    fn name(&self) -> &str {
        "file"
    }

    async fn enable(&self, chat_id: &str) -> Result<bool, SessionError> {
        let mut chats = self.chats.write().await;
        if chats.iter().any(|c| c.chat_id == chat_id) {
            return Ok(false);
        }
        chats.push(EnabledChat {
            chat_id: chat_id.to_string(),
            enabled_at: Utc::now(),
        });
        if let Err(e) = self.flush(&chats) {
            chats.pop();
            return Err(e);
        }
        Ok(true)
    }

    async fn disable(&self, chat_id: &str) -> Result<bool, SessionError> {
        let mut chats = self.chats.write().await;
        let Some(idx) = chats.iter().position(|c| c.chat_id == chat_id) else {
            return Ok(false);
        };
        let removed = chats.remove(idx);
        if let Err(e) = self.flush(&chats) {
            chats.insert(idx, removed);
            return Err(e);
        }
        Ok(true)
    }

    async fn is_enabled(&self, chat_id: &str) -> Result<bool, SessionError> {
        Ok(self.chats.read().await.iter().any(|c| c.chat_id == chat_id))
    }

    async fn count(&self) -> Result<usize, SessionError> {
        Ok(self.chats.read().await.len())
    }
}
