//! Key/value seam under `CookieSessionAuthenticator`.
use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

pub type CacheResult<T> = Result<T, CacheError>;

/// A failed read means "no session"; a failed write fails the sign-in.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("session cache unreachable: {0}")]
    BackendConnection(String),
    #[error("session cache rejected command: {0}")]
    BackendCommand(String),
}

/// Session payloads are JSON strings keyed by `session:<id>:<scope>`.
/// Clones share one backend.
#[async_trait]
pub trait CacheClient: Clone + Send + Sync + 'static {
    fn backend_name(&self) -> &'static str;

    /// `None` for absent and expired keys alike.
    async fn get_string(&self, key: &str) -> CacheResult<Option<String>>;

    async fn put_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> CacheResult<()>;

    /// Number of keys removed (0 or 1).
    async fn del(&self, key: &str) -> CacheResult<u64>;
}
