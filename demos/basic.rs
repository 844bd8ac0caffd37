//! Basic example using the in-memory bucket

use std::sync::Arc;

use salvo::prelude::*;
use salvo_bucket_session::{
    BucketStore, KeyPair, MemoryBucket, SessionDepotExt, SessionHandler, StoreConfig,
};

const COOKIE: &str = "sid";

#[handler]
async fn index(depot: &mut Depot) -> String {
    let session = depot.session(COOKIE).expect("Session not found");

    let views: i32 = session.get("views").unwrap_or(0);
    session.set("views", views + 1);

    format!(
        "Hello! You have viewed this page {} time(s).\nNew session: {}",
        views + 1,
        session.is_new()
    )
}

#[handler]
async fn set_user(req: &mut Request, depot: &mut Depot) -> String {
    let session = depot.session(COOKIE).expect("Session not found");

    let username = req
        .query::<String>("name")
        .unwrap_or_else(|| "anonymous".to_string());
    session.set("user", &username);

    format!("User set to: {}", username)
}

#[handler]
async fn get_user(depot: &mut Depot) -> String {
    let session = depot.session(COOKIE).expect("Session not found");

    match session.get::<String>("user") {
        Some(user) => format!("Logged in as: {}", user),
        None => "Not logged in".to_string(),
    }
}

#[handler]
async fn logout(depot: &mut Depot) -> &'static str {
    let session = depot.session(COOKIE).expect("Session not found");

    // Delete the stored record and expire the cookie
    session.destroy();

    "Logged out successfully"
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let config = StoreConfig::new(KeyPair::new("change-me-to-a-long-random-secret"))
        .with_max_age(3600)
        .with_http_only(true);
    let store = Arc::new(BucketStore::new(MemoryBucket::new(), config).expect("valid store config"));

    let router = Router::new()
        .hoop(SessionHandler::new(Arc::clone(&store), COOKIE))
        .get(index)
        .push(Router::with_path("user").get(get_user))
        .push(Router::with_path("login").get(set_user))
        .push(Router::with_path("logout").get(logout));

    println!("Server running at http://127.0.0.1:5800");
    println!("Try:");
    println!("  curl -c cookies.txt -b cookies.txt http://127.0.0.1:5800/");
    println!("  curl -c cookies.txt -b cookies.txt 'http://127.0.0.1:5800/login?name=alice'");
    println!("  curl -c cookies.txt -b cookies.txt http://127.0.0.1:5800/user");
    println!("  curl -c cookies.txt -b cookies.txt http://127.0.0.1:5800/logout");

    let acceptor = TcpListener::new("127.0.0.1:5800").bind().await;
    Server::new(acceptor).serve(router).await;

    if let Err(e) = store.close().await {
        tracing::error!(error = %e, "failed to close session store");
    }
}
