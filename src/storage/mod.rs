pub mod memory;
pub mod redis_store;

use crate::error::app_error::AppError;
use std::sync::Arc;

/// Named blobs this service persists. Each key holds one JSON-serialized
/// collection that is rewritten wholesale on every mutation.
pub mod keys {
    pub const LOGIN_ATTEMPTS: &str = "schoolgate:login_attempts";
    pub const SECURITY_LOG: &str = "schoolgate:security_log";
    pub const SESSIONS: &str = "schoolgate:sessions";
    pub const USERS: &str = "schoolgate:users";
}

/// Key-value persistence port. The store treats it as reliable but survives
/// it failing: a failed `set` leaves the in-memory snapshot authoritative and
/// the durable copy one mutation behind.
#[async_trait::async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, AppError>;
    async fn set(&self, key: &str, value: String) -> Result<(), AppError>;
}

/// Pick a backend from configuration. An empty URL selects the in-memory
/// store so the service can run without a Redis in development and tests.
pub async fn connect(config: &crate::config::StorageConfig) -> Result<Arc<dyn KeyValueStore>, AppError> {
    if config.url.is_empty() {
        tracing::warn!("no storage URL configured, using in-memory key-value store");
        Ok(Arc::new(memory::InMemoryStore::new()))
    } else {
        let store = redis_store::RedisStore::connect(&config.url).await?;
        tracing::info!("connected to redis key-value store");
        Ok(Arc::new(store))
    }
}
