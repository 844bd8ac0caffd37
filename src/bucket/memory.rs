//! In-memory bucket
//!
//! This is primarily for development and testing.
//! For production, use RedisBucket or another shared bucket.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::Bucket;
use crate::error::SessionError;

struct StoredBlob {
    blob: String,
    expires_at: Option<Instant>,
}

/// In-memory bucket
///
/// Warning: This bucket is not suitable for production use because:
/// - Sessions are lost on server restart
/// - Sessions are not shared across multiple server instances
/// - Expired entries are purged on `set` or by [`MemoryBucket::cleanup_expired`]
pub struct MemoryBucket {
    entries: Arc<RwLock<HashMap<String, StoredBlob>>>,
}

impl MemoryBucket {
    /// Create a new memory bucket
    pub fn new() -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Clean up expired entries
    pub fn cleanup_expired(&self) {
        let mut entries = self.entries.write();
        let now = Instant::now();
        entries.retain(|_, stored| match stored.expires_at {
            Some(exp) => exp > now,
            None => true,
        });
    }

    /// Number of live entries
    pub fn len(&self) -> usize {
        self.cleanup_expired();
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for MemoryBucket {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for MemoryBucket {
    fn clone(&self) -> Self {
        Self {
            entries: Arc::clone(&self.entries),
        }
    }
}

#[async_trait]
impl Bucket for MemoryBucket {
    async fn get(&self, key: &str) -> Result<Option<String>, SessionError> {
        let entries = self.entries.read();

        match entries.get(key) {
            Some(stored) if stored.expires_at.is_some_and(|exp| exp <= Instant::now()) => Ok(None),
            Some(stored) => Ok(Some(stored.blob.clone())),
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, ttl_secs: u64, blob: &str) -> Result<(), SessionError> {
        // A zero TTL never expires, as in Couchbase and Memcached
        let expires_at = (ttl_secs > 0).then(|| Instant::now() + Duration::from_secs(ttl_secs));

        let stored = StoredBlob {
            blob: blob.to_string(),
            expires_at,
        };

        let now = Instant::now();
        let mut entries = self.entries.write();
        entries.retain(|_, stored| !stored.expires_at.is_some_and(|exp| exp <= now));
        entries.insert(key.to_string(), stored);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), SessionError> {
        self.entries.write().remove(key);
        Ok(())
    }
}
