//! Session middleware handler for Salvo

use async_trait::async_trait;
use salvo_core::{Depot, FlowCtrl, Handler, Request, Response};
use std::sync::Arc;

use crate::bucket::Bucket;
use crate::depot_ext::SessionDepotExt;
use crate::store::BucketStore;

/// Session middleware for Salvo
///
/// Resolves the configured session cookies into the depot before the rest of
/// the chain runs. Afterwards, every session resolved during the request
/// (including ones looked up later through [`BucketStore::get`]) is deleted
/// if it was marked with [`Session::destroy`](crate::Session::destroy), or
/// saved if its values changed. Unchanged sessions are left alone.
pub struct SessionHandler<B: Bucket> {
    store: Arc<BucketStore<B>>,
    names: Vec<String>,
}

impl<B: Bucket> SessionHandler<B> {
    /// Create a handler managing the cookie `name`
    pub fn new<S: Into<String>>(store: Arc<BucketStore<B>>, name: S) -> Self {
        Self {
            store,
            names: vec![name.into()],
        }
    }

    /// Also resolve the cookie `name` before the chain runs
    pub fn with_name<S: Into<String>>(mut self, name: S) -> Self {
        self.names.push(name.into());
        self
    }

    pub fn store(&self) -> &Arc<BucketStore<B>> {
        &self.store
    }
}

impl<B: Bucket> Clone for SessionHandler<B> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            names: self.names.clone(),
        }
    }
}

#[async_trait]
impl<B: Bucket> Handler for SessionHandler<B> {
    async fn handle(&self, req: &mut Request, depot: &mut Depot, res: &mut Response, ctrl: &mut FlowCtrl) {
        for name in &self.names {
            let (_, err) = self.store.get(req, depot, name).await;
            if let Some(e) = err {
                tracing::warn!(cookie = %name, error = %e, "starting a new session");
            }
        }

        // Continue with the request
        ctrl.call_next(req, depot, res).await;

        // After request processing, handle session persistence
        for session in depot.sessions() {
            if session.should_destroy() {
                if let Err(e) = self.store.delete(res, &session).await {
                    tracing::error!(cookie = session.name(), error = %e, "Failed to destroy session");
                }
            } else if session.is_modified() {
                if let Err(e) = self.store.save(res, &session).await {
                    tracing::error!(cookie = session.name(), error = %e, "Failed to save session");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bucket::MemoryBucket;
    use crate::codec::KeyPair;
    use crate::config::StoreConfig;
    use salvo_core::http::cookie::time::Duration;
    use salvo_core::prelude::*;
    use salvo_core::test::{ResponseExt, TestClient};

    const NAME: &str = "sid";

    #[handler]
    async fn count(depot: &mut Depot) -> String {
        let session = depot.session(NAME).expect("session resolved by middleware");
        let views: i32 = session.get("views").unwrap_or(0);
        session.set("views", views + 1);
        format!("{}", views + 1)
    }

    #[handler]
    async fn peek(depot: &mut Depot) -> String {
        let session = depot.session(NAME).expect("session resolved by middleware");
        format!("{}", session.is_new())
    }

    #[handler]
    async fn logout(depot: &mut Depot) -> &'static str {
        let session = depot.session(NAME).expect("session resolved by middleware");
        session.destroy();
        "bye"
    }

    fn service() -> (Service, Arc<BucketStore<MemoryBucket>>) {
        let config = StoreConfig::new(KeyPair::new("keyboard cat")).with_max_age(3600);
        let store = Arc::new(BucketStore::new(MemoryBucket::new(), config).unwrap());
        let router = Router::new()
            .hoop(SessionHandler::new(Arc::clone(&store), NAME))
            .push(Router::with_path("count").get(count))
            .push(Router::with_path("peek").get(peek))
            .push(Router::with_path("logout").get(logout));
        (Service::new(router), store)
    }

    fn session_cookie(res: &Response) -> Option<String> {
        res.cookie(NAME).map(|c| format!("{}={}", NAME, c.value()))
    }

    #[tokio::test]
    async fn test_modified_session_is_saved_and_reloaded() {
        let (service, store) = service();

        let mut res = TestClient::get("http://127.0.0.1:5800/count")
            .send(&service)
            .await;
        assert_eq!(res.take_string().await.unwrap(), "1");
        let cookie = session_cookie(&res).expect("new session sets a cookie");
        assert_eq!(store.bucket().len(), 1);

        let mut res = TestClient::get("http://127.0.0.1:5800/count")
            .add_header("cookie", &cookie, true)
            .send(&service)
            .await;
        assert_eq!(res.take_string().await.unwrap(), "2");
    }

    #[tokio::test]
    async fn test_untouched_session_is_not_saved() {
        let (service, store) = service();

        let mut res = TestClient::get("http://127.0.0.1:5800/peek")
            .send(&service)
            .await;
        assert_eq!(res.take_string().await.unwrap(), "true");
        assert!(res.cookie(NAME).is_none());
        assert!(store.bucket().is_empty());
    }

    #[tokio::test]
    async fn test_destroyed_session_expires_cookie() {
        let (service, store) = service();

        let res = TestClient::get("http://127.0.0.1:5800/count")
            .send(&service)
            .await;
        let cookie = session_cookie(&res).unwrap();

        let res = TestClient::get("http://127.0.0.1:5800/logout")
            .add_header("cookie", &cookie, true)
            .send(&service)
            .await;
        let expired = res.cookie(NAME).unwrap();
        assert_eq!(expired.max_age(), Some(Duration::seconds(-1)));
        assert!(store.bucket().is_empty());

        let mut res = TestClient::get("http://127.0.0.1:5800/peek")
            .add_header("cookie", &cookie, true)
            .send(&service)
            .await;
        assert_eq!(res.take_string().await.unwrap(), "true");
    }
}
