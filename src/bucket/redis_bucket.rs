//! Redis bucket
//!
//! Keys are `namespace:bucket:session_id`; values are the encoded blobs
//! produced by the store. Every command runs under a per-operation timeout,
//! and both that timeout and Redis' own timeouts surface as
//! [`SessionError::Timeout`] so the store's retry policy picks them up.

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, RedisResult};
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use super::Bucket;
use crate::error::SessionError;

const DEFAULT_OP_TIMEOUT: Duration = Duration::from_secs(2);

/// Redis-backed bucket
///
/// # Example
///
/// ```rust,ignore
/// use salvo_bucket_session::RedisBucket;
///
/// let bucket = RedisBucket::connect("redis://127.0.0.1/", "default", "sessions").await?;
/// ```
pub struct RedisBucket {
    conn: ConnectionManager,
    prefix: String,
    op_timeout: Duration,
    closed: AtomicBool,
}

impl RedisBucket {
    /// Connect to `endpoint` and address the `namespace:bucket:` keyspace
    pub async fn connect(endpoint: &str, namespace: &str, bucket: &str) -> Result<Self, SessionError> {
        let client = redis::Client::open(endpoint).map_err(|e| {
            SessionError::ConnectionError(format!("Failed to create Redis client: {}", e))
        })?;
        Self::new(client, namespace, bucket).await
    }

    /// Create a bucket from an existing client
    pub async fn new(client: redis::Client, namespace: &str, bucket: &str) -> Result<Self, SessionError> {
        let conn = ConnectionManager::new(client).await.map_err(|e| {
            SessionError::ConnectionError(format!("Failed to connect to Redis: {}", e))
        })?;
        Ok(Self::from_connection_manager(conn, namespace, bucket))
    }

    /// Create a bucket from an existing connection manager
    pub fn from_connection_manager(conn: ConnectionManager, namespace: &str, bucket: &str) -> Self {
        Self {
            conn,
            prefix: format!("{}:{}:", namespace, bucket),
            op_timeout: DEFAULT_OP_TIMEOUT,
            closed: AtomicBool::new(false),
        }
    }

    /// Build with a custom per-operation timeout (default: 2 seconds)
    pub fn with_op_timeout(mut self, op_timeout: Duration) -> Self {
        self.op_timeout = op_timeout;
        self
    }

    /// Make a storage key from session ID
    fn make_key(&self, id: &str) -> String {
        format!("{}{}", self.prefix, id)
    }

    async fn run<T, F>(&self, operation: &str, command: F) -> Result<T, SessionError>
    where
        F: Future<Output = RedisResult<T>>,
    {
        if self.closed.load(Ordering::SeqCst) {
            return Err(SessionError::ConnectionError("bucket is closed".to_string()));
        }

        match tokio::time::timeout(self.op_timeout, command).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) if e.is_timeout() => Err(SessionError::Timeout(format!("{}: {}", operation, e))),
            Ok(Err(e)) => Err(e.into()),
            Err(_) => Err(SessionError::Timeout(format!(
                "{} exceeded {:?}",
                operation, self.op_timeout
            ))),
        }
    }
}

#[async_trait]
impl Bucket for RedisBucket {
    async fn get(&self, key: &str) -> Result<Option<String>, SessionError> {
        let key = self.make_key(key);
        let mut conn = self.conn.clone();

        self.run("get", async move { conn.get::<_, Option<String>>(&key).await })
            .await
    }

    async fn set(&self, key: &str, ttl_secs: u64, blob: &str) -> Result<(), SessionError> {
        let key = self.make_key(key);
        let mut conn = self.conn.clone();

        let mut cmd = redis::cmd("SET");
        cmd.arg(&key).arg(blob);
        // A zero TTL never expires
        if ttl_secs > 0 {
            cmd.arg("EX").arg(ttl_secs);
        }

        self.run("set", async move {
            let result: RedisResult<()> = cmd.query_async(&mut conn).await;
            result
        })
        .await
    }

    async fn delete(&self, key: &str) -> Result<(), SessionError> {
        let key = self.make_key(key);
        let mut conn = self.conn.clone();

        self.run("delete", async move { conn.del::<_, ()>(&key).await })
            .await
    }

    async fn close(&self) -> Result<(), SessionError> {
        // The connection manager is dropped with the bucket; refuse further use
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    // Tests require a running Redis instance
    // Run with: cargo test --features redis-store -- --ignored

    use super::*;

    #[tokio::test]
    #[ignore]
    async fn test_redis_bucket_basic() {
        let bucket = RedisBucket::connect("redis://127.0.0.1/", "test", "sessions")
            .await
            .unwrap();

        bucket.set("test-id", 3600, "blob").await.unwrap();

        let retrieved = bucket.get("test-id").await.unwrap();
        assert_eq!(retrieved.as_deref(), Some("blob"));

        bucket.delete("test-id").await.unwrap();
        assert!(bucket.get("test-id").await.unwrap().is_none());

        bucket.close().await.unwrap();
        assert!(matches!(
            bucket.get("test-id").await,
            Err(SessionError::ConnectionError(_))
        ));
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_a_connection_error() {
        let result = RedisBucket::connect("not a redis url", "test", "sessions").await;
        assert!(matches!(result, Err(SessionError::ConnectionError(_))));
    }
}
