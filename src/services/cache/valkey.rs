use async_trait::async_trait;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use std::time::Duration;

use crate::services::cache::client::{CacheClient, CacheError, CacheResult};

/// Session store on Valkey/Redis. Keys expire server-side (`SET .. EX`).
#[derive(Clone, Debug)]
pub struct ValkeyClient {
    manager: ConnectionManager,
}

fn command_error(e: redis::RedisError) -> CacheError {
    CacheError::BackendCommand(e.to_string())
}

impl ValkeyClient {
    /// Connects to `url` (e.g. `redis://localhost:6379`) and checks the server answers.
    pub async fn new(url: &str) -> Result<Self, CacheError> {
        let connect = |e: redis::RedisError| CacheError::BackendConnection(e.to_string());

        let mut manager = redis::Client::open(url)
            .map_err(connect)?
            .get_connection_manager()
            .await
            .map_err(connect)?;

        let _: String = redis::cmd("PING")
            .query_async(&mut manager)
            .await
            .map_err(connect)?;

        tracing::info!("connected to valkey session store");
        Ok(Self { manager })
    }
}

#[async_trait]
impl CacheClient for ValkeyClient {
    fn backend_name(&self) -> &'static str {
        "valkey"
    }

    async fn get_string(&self, key: &str) -> CacheResult<Option<String>> {
        let mut conn = self.manager.clone();
        conn.get(key).await.map_err(command_error)
    }

    async fn put_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> CacheResult<()> {
        let mut conn = self.manager.clone();
        // EX takes whole seconds and rejects 0.
        let seconds = ttl.as_secs().max(1);
        conn.set_ex(key, value, seconds).await.map_err(command_error)
    }

    async fn del(&self, key: &str) -> CacheResult<u64> {
        let mut conn = self.manager.clone();
        conn.del(key).await.map_err(command_error)
    }
}
