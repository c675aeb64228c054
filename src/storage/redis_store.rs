use crate::error::app_error::AppError;
use crate::storage::KeyValueStore;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;

/// Redis-backed key-value store. The connection manager reconnects on its
/// own, so callers only see errors while Redis is actually unreachable.
pub struct RedisStore {
    conn: ConnectionManager,
}

impl RedisStore {
    pub async fn connect(url: &str) -> Result<Self, AppError> {
        let client = redis::Client::open(url).map_err(|e| AppError::storage("Invalid redis URL", e))?;
        let conn = ConnectionManager::new(client)
            .await
            .map_err(|e| AppError::storage("Failed to connect to redis", e))?;

        Ok(Self { conn })
    }
}

#[async_trait::async_trait]
impl KeyValueStore for RedisStore {
    async fn get(&self, key: &str) -> Result<Option<String>, AppError> {
        let mut conn = self.conn.clone();
        let value: Option<String> = conn.get(key).await?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: String) -> Result<(), AppError> {
        let mut conn = self.conn.clone();
        conn.set::<_, _, ()>(key, value).await?;
        Ok(())
    }
}
