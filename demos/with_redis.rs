//! Redis bucket example
//!
//! Sessions are stored under `sessions:web:<id>` with the cookie max age as
//! their TTL. Redis timeouts are retried up to five times.

use std::sync::Arc;
use std::time::Duration;

use salvo::prelude::*;
use salvo_bucket_session::{
    BucketStore, KeyPair, RetryPolicy, SessionDepotExt, SessionHandler, StoreConfig,
};

const COOKIE: &str = "sid";

#[handler]
async fn index(depot: &mut Depot) -> String {
    let session = depot.session(COOKIE).expect("Session not found");

    let views: i32 = session.get("views").unwrap_or(0);
    session.set("views", views + 1);
    session.set("lastModifiedAt", chrono::Utc::now().to_rfc3339());

    format!("Hello from Rust + Redis!\nViews: {}", views + 1)
}

#[handler]
async fn get_session_info(depot: &mut Depot) -> Json<serde_json::Value> {
    let session = depot.session(COOKIE).expect("Session not found");

    Json(serde_json::json!({
        "sessionId": session.id(),
        "isNew": session.is_new(),
        "data": session.values(),
    }))
}

#[handler]
async fn destroy(depot: &mut Depot) -> &'static str {
    let session = depot.session(COOKIE).expect("Session not found");
    session.destroy();
    "Session destroyed"
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let redis_url = std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1/".to_string());

    // Rotate keys by putting the new pair first and keeping the old one
    let config = StoreConfig::new(KeyPair::with_block_key(
        "new-signing-secret",
        *b"0123456789abcdef0123456789abcdef",
    ))
    .with_key_pair(KeyPair::new("old-signing-secret"))
    .with_max_age(86400)
    .with_retry(RetryPolicy::new(5, Duration::from_millis(100)));

    let store = BucketStore::connect(&redis_url, "sessions", "web", config)
        .await
        .expect("Failed to connect to Redis");
    let store = Arc::new(store);

    let router = Router::new()
        .hoop(SessionHandler::new(Arc::clone(&store), COOKIE))
        .get(index)
        .push(Router::with_path("session").get(get_session_info))
        .push(Router::with_path("destroy").get(destroy));

    println!("Server running at http://127.0.0.1:5800 (Redis: {})", redis_url);

    let acceptor = TcpListener::new("127.0.0.1:5800").bind().await;
    Server::new(acceptor).serve(router).await;

    if let Err(e) = store.close().await {
        tracing::error!(error = %e, "failed to close session store");
    }
}
