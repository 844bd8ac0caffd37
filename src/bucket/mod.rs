//! Backing bucket implementations

mod memory;
mod traits;

pub use memory::MemoryBucket;
pub use traits::Bucket;

#[cfg(feature = "redis-store")]
mod redis_bucket;

#[cfg(feature = "redis-store")]
pub use redis_bucket::RedisBucket;
