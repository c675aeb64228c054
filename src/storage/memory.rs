use crate::error::app_error::AppError;
use crate::storage::KeyValueStore;
use std::collections::HashMap;
use tokio::sync::Mutex;

/// In-memory key-value store for development and tests. Nothing survives a
/// restart, which matches what the security store already tolerates from a
/// failed durable write.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-seed a blob, bypassing the port. Used by tests to simulate state
    /// left behind by a previous process.
    pub async fn seed(&self, key: &str, value: String) {
        self.entries.lock().await.insert(key.to_string(), value);
    }
}

#[async_trait::async_trait]
impl KeyValueStore for InMemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, AppError> {
        Ok(self.entries.lock().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: String) -> Result<(), AppError> {
        self.entries.lock().await.insert(key.to_string(), value);
        Ok(())
    }
}
