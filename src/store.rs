//! Session store
//!
//! Correlates the signed session-ID cookie with the values held in a
//! [`Bucket`]. Every bucket call goes through the configured [`RetryPolicy`].
//!
//! Load and save of one session are independent round-trips. Two requests
//! that load, modify and save the same session concurrently race, and the
//! last save wins.

use salvo_core::{Depot, Request, Response};
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::bucket::Bucket;
use crate::codec::CodecChain;
use crate::config::{CookieOptions, StoreConfig};
use crate::depot_ext::SessionDepotExt;
use crate::error::{SessionError, SessionResult};
use crate::id::generate_session_id;
use crate::retry::RetryPolicy;
use crate::session::{Session, Values};

/// Browsers reject cookies larger than this
const MAX_COOKIE_LEN: usize = 4096;

/// A session plus the advisory error explaining why it is blank, if any.
///
/// The session is always usable. The error lets callers tell a first-time
/// visitor from a rejected (tampered, expired, or unloadable) cookie.
pub type Resolved = (Session, Option<SessionError>);

/// Session store backed by a key-value bucket
pub struct BucketStore<B: Bucket> {
    bucket: B,
    codecs: CodecChain,
    options: CookieOptions,
    retry: RetryPolicy,
    closed: AtomicBool,
}

impl<B: Bucket> BucketStore<B> {
    /// Create a store over an already-connected bucket.
    ///
    /// Fails with [`SessionError::InvalidMaxAge`] when the cookie max age is
    /// not positive, or [`SessionError::InvalidKey`] when the key pairs are
    /// missing or malformed.
    pub fn new(bucket: B, config: StoreConfig) -> SessionResult<Self> {
        config.validate()?;
        // Sessions may raise their own max age past the store default, so the
        // codec does not cap timestamp age. Cookie Max-Age and the bucket TTL
        // bound a session's lifetime instead.
        let codecs = CodecChain::from_pairs(&config.key_pairs, 0)?;

        let mut options = config.cookie;
        if options.path.is_empty() {
            options.path = "/".to_string();
        }

        Ok(Self {
            bucket,
            codecs,
            options,
            retry: config.retry,
            closed: AtomicBool::new(false),
        })
    }

    /// Default cookie options copied into new sessions
    pub fn options(&self) -> &CookieOptions {
        &self.options
    }

    pub fn bucket(&self) -> &B {
        &self.bucket
    }

    /// Session for cookie `name`, loading it on the first call of the request.
    ///
    /// Later calls with the same depot and name return the same session and
    /// no error.
    pub fn get<'a>(
        &'a self,
        req: &Request,
        depot: &'a mut Depot,
        name: &'a str,
    ) -> impl Future<Output = Resolved> + Send + 'a {
        // Read the cookie up front so the future does not borrow the request
        let cookie = request_cookie(req, name);
        async move {
            if let Some(session) = depot.session(name) {
                return (session, None);
            }
            let resolved = self.open(name, cookie).await;
            depot.session_registry_mut().insert(resolved.0.clone());
            resolved
        }
    }

    /// Build a session for cookie `name` from the request, bypassing the
    /// per-request registry.
    ///
    /// A missing cookie, a cookie that fails verification, or a cookie whose
    /// record cannot be loaded all yield a blank session with `is_new() == true`;
    /// the latter two also return the error.
    pub fn new_session<'a>(
        &'a self,
        req: &Request,
        name: &'a str,
    ) -> impl Future<Output = Resolved> + Send + 'a {
        let cookie = request_cookie(req, name);
        self.open(name, cookie)
    }

    async fn open(&self, name: &str, cookie: Option<String>) -> Resolved {
        let session = Session::new(name, self.options.clone());
        let Some(cookie) = cookie else {
            return (session, None);
        };

        let id: String = match self.codecs.decode(name, &cookie) {
            Ok(id) => id,
            Err(e) => {
                tracing::warn!(cookie = name, error = %e, "rejected session cookie");
                return (session, Some(e));
            }
        };

        session.set_id(id);
        match self.load(&session).await {
            Ok(true) => {
                session.set_is_new(false);
                tracing::debug!(cookie = name, "session loaded");
                (session, None)
            }
            Ok(false) => {
                tracing::debug!(cookie = name, "no stored session for cookie");
                session.set_id(String::new());
                (session, None)
            }
            Err(e) => {
                tracing::warn!(cookie = name, error = %e, "failed to load session");
                session.set_id(String::new());
                (session, Some(e))
            }
        }
    }

    /// Persist the session and set its cookie on the response.
    ///
    /// Mints an ID for sessions that have none. The cookie is only written
    /// after the bucket accepted the values. A session whose max age is zero
    /// or negative is deleted instead.
    pub async fn save(&self, res: &mut Response, session: &Session) -> SessionResult<()> {
        let options = session.options();
        if options.max_age <= 0 {
            return self.delete(res, session).await;
        }

        if session.id().is_empty() {
            session.set_id(generate_session_id());
        }
        let id = session.id();

        self.persist(session, &id, &options).await?;

        let encoded = self.codecs.encode(session.name(), &id)?;
        if encoded.len() > MAX_COOKIE_LEN {
            return Err(SessionError::EncodingError(format!(
                "cookie value is {} bytes, limit is {}",
                encoded.len(),
                MAX_COOKIE_LEN
            )));
        }

        res.add_cookie(options.to_cookie(session.name(), encoded));
        session.mark_saved();
        tracing::debug!(cookie = session.name(), "session saved");
        Ok(())
    }

    /// Delete the session's record, expire its cookie and clear its values.
    ///
    /// The cookie is expired and the values cleared even if the bucket
    /// delete fails; that failure is still returned.
    pub async fn delete(&self, res: &mut Response, session: &Session) -> SessionResult<()> {
        let id = session.id();
        let result = if id.is_empty() {
            Ok(())
        } else {
            self.remove(&id).await
        };

        let mut options = session.options();
        options.max_age = -1;
        res.add_cookie(options.to_cookie(session.name(), String::new()));
        session.mark_deleted();

        if let Err(e) = &result {
            tracing::warn!(cookie = session.name(), error = %e, "failed to delete session record");
        }
        result
    }

    /// Release the bucket. Calling it again is a no-op; any other operation
    /// after close fails with [`SessionError::ConnectionError`].
    pub async fn close(&self) -> SessionResult<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        self.bucket.close().await
    }

    /// Load stored values into the session.
    ///
    /// Returns `Ok(false)` when there is no record or it is empty, leaving the
    /// values untouched.
    async fn load(&self, session: &Session) -> SessionResult<bool> {
        self.ensure_open()?;
        let id = session.id();
        let blob = self.retry.run("get", || self.bucket.get(&id)).await?;

        let Some(blob) = blob.filter(|b| !b.is_empty()) else {
            return Ok(false);
        };
        let values: Values = self.codecs.decode(session.name(), &blob)?;
        session.replace_values(values);
        Ok(true)
    }

    async fn remove(&self, id: &str) -> SessionResult<()> {
        self.ensure_open()?;
        self.retry.run("delete", || self.bucket.delete(id)).await
    }

    async fn persist(&self, session: &Session, id: &str, options: &CookieOptions) -> SessionResult<()> {
        self.ensure_open()?;
        let blob = self.codecs.encode(session.name(), &session.values())?;
        let ttl = u64::try_from(options.max_age).unwrap_or(0);

        self.retry.run("set", || self.bucket.set(id, ttl, &blob)).await
    }

    fn ensure_open(&self) -> SessionResult<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(SessionError::ConnectionError("store is closed".to_string()));
        }
        Ok(())
    }
}

#[cfg(feature = "redis-store")]
impl BucketStore<crate::bucket::RedisBucket> {
    /// Validate `config`, then connect to Redis at `endpoint` and store
    /// sessions under `namespace:bucket:`.
    pub async fn connect(
        endpoint: &str,
        namespace: &str,
        bucket: &str,
        config: StoreConfig,
    ) -> SessionResult<Self> {
        config.validate()?;
        let bucket = crate::bucket::RedisBucket::connect(endpoint, namespace, bucket).await?;
        Self::new(bucket, config)
    }
}

fn request_cookie(req: &Request, name: &str) -> Option<String> {
    let value = req.cookie(name)?.value();
    // Cookies may arrive URL encoded
    match urlencoding::decode(value) {
        Ok(decoded) => Some(decoded.into_owned()),
        Err(_) => Some(value.to_string()),
    }
}
