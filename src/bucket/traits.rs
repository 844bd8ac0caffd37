//! Bucket trait

use async_trait::async_trait;
use crate::error::SessionError;

/// Key-value collection that holds encoded session values.
///
/// Blobs are opaque strings produced by the store's codec chain. Operations
/// that time out must return an error for which
/// [`SessionError::is_transient`] is true so the store can retry them.
#[async_trait]
pub trait Bucket: Send + Sync + 'static {
    /// Fetch the blob stored under `key`.
    ///
    /// Returns None if the key doesn't exist or has expired
    async fn get(&self, key: &str) -> Result<Option<String>, SessionError>;

    /// Store `blob` under `key`, expiring after `ttl_secs` seconds
    async fn set(&self, key: &str, ttl_secs: u64, blob: &str) -> Result<(), SessionError>;

    /// Remove `key`. Removing a missing key is not an error.
    async fn delete(&self, key: &str) -> Result<(), SessionError>;

    /// Release connections held by the bucket
    async fn close(&self) -> Result<(), SessionError> {
        Ok(())
    }
}
