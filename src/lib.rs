//! # salvo-bucket-session
//!
//! Signed-cookie session store for the Salvo web framework, keeping session
//! values in a remote key-value bucket.
//!
//! The cookie carries only an authenticated (optionally encrypted) session
//! ID. The values live in the bucket under that ID, with the cookie's max
//! age as their TTL.
//!
//! ## Features
//!
//! - **Key rotation**: the first key pair signs, every key pair verifies
//! - **Bounded retry**: bucket timeouts are retried with growing backoff
//! - **Pluggable buckets**: Redis, Memory, or custom [`Bucket`] implementations
//! - **Fail-open reads**: a missing, expired or tampered cookie yields a fresh
//!   session, with the reason reported alongside it
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use salvo::prelude::*;
//! use salvo_bucket_session::{
//!     BucketStore, KeyPair, MemoryBucket, SessionDepotExt, SessionHandler, StoreConfig,
//! };
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = StoreConfig::new(KeyPair::new("your-secret-key")).with_max_age(3600);
//!     let store = Arc::new(BucketStore::new(MemoryBucket::new(), config).unwrap());
//!
//!     let router = Router::new()
//!         .hoop(SessionHandler::new(store, "sid"))
//!         .get(index);
//!
//!     Server::new(TcpListener::new("127.0.0.1:5800").bind().await)
//!         .serve(router)
//!         .await;
//! }
//!
//! #[handler]
//! async fn index(depot: &mut Depot) -> String {
//!     let session = depot.session("sid").unwrap();
//!     let views: i32 = session.get("views").unwrap_or(0);
//!     session.set("views", views + 1);
//!     format!("views: {}", views + 1)
//! }
//! ```

pub mod bucket;
pub mod codec;
pub mod config;
pub mod error;
pub mod handler;
pub mod id;
pub mod registry;
pub mod retry;
pub mod session;
pub mod store;

pub use bucket::{Bucket, MemoryBucket};
pub use codec::{CodecChain, KeyPair};
pub use config::{CookieOptions, SameSite, StoreConfig};
pub use error::{SessionError, SessionResult};
pub use handler::SessionHandler;
pub use registry::SessionRegistry;
pub use retry::RetryPolicy;
pub use session::{Session, Values};
pub use store::{BucketStore, Resolved};

#[cfg(feature = "redis-store")]
pub use bucket::RedisBucket;

/// Extension trait for Depot to easily access sessions
pub mod depot_ext;
pub use depot_ext::SessionDepotExt;
