//! Session store implementations for tightfit.

pub mod file_backend;
pub mod in_memory;

use std::sync::Arc;

use tightfit_config::SessionsConfig;
use tightfit_core::SessionStore;

pub use file_backend::FileSessionStore;
pub use in_memory::InMemorySessionStore;

/// Build the store named by `[sessions] backend`.
pub fn from_config(config: &SessionsConfig) -> Arc<dyn SessionStore> {
    match config.backend.as_str() {
        "file" => Arc::new(FileSessionStore::new(config.path.clone())),
        _ => Arc::new(InMemorySessionStore::new()),
    }
}
