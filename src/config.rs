//! Store configuration

use salvo_core::http::cookie::{self, Cookie};
use std::time::Duration;

use crate::codec::KeyPair;
use crate::error::{SessionError, SessionResult};
use crate::retry::RetryPolicy;

/// Thirty days, the default cookie and bucket lifetime
pub const DEFAULT_MAX_AGE: i64 = 86400 * 30;

/// SameSite cookie attribute
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SameSite {
    /// Strict - cookie only sent for same-site requests
    Strict,
    /// Lax - cookie sent for same-site requests and top-level navigations
    Lax,
    /// None - cookie sent for all requests (requires Secure)
    None,
}

impl From<SameSite> for cookie::SameSite {
    fn from(same_site: SameSite) -> Self {
        match same_site {
            SameSite::Strict => cookie::SameSite::Strict,
            SameSite::Lax => cookie::SameSite::Lax,
            SameSite::None => cookie::SameSite::None,
        }
    }
}

/// Attributes of the session cookie.
///
/// `max_age` doubles as the bucket TTL. A session whose `max_age` is zero or
/// negative is deleted instead of saved.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CookieOptions {
    pub path: String,
    pub domain: Option<String>,
    /// Max age in seconds
    pub max_age: i64,
    pub secure: bool,
    pub http_only: bool,
    pub same_site: SameSite,
}

impl Default for CookieOptions {
    fn default() -> Self {
        Self {
            path: "/".to_string(),
            domain: None,
            max_age: DEFAULT_MAX_AGE,
            secure: false,
            http_only: true,
            same_site: SameSite::Lax,
        }
    }
}

impl CookieOptions {
    /// Build a response cookie carrying `value` with these attributes
    pub fn to_cookie(&self, name: &str, value: String) -> Cookie<'static> {
        let mut builder = Cookie::build((name.to_string(), value))
            .path(self.path.clone())
            .http_only(self.http_only)
            .secure(self.secure)
            .same_site(self.same_site.into())
            .max_age(cookie::time::Duration::seconds(self.max_age));

        if let Some(domain) = &self.domain {
            builder = builder.domain(domain.clone());
        }
        if self.max_age > 0 {
            builder = builder.expires(
                cookie::time::OffsetDateTime::now_utc()
                    + cookie::time::Duration::seconds(self.max_age),
            );
        }

        builder.build()
    }
}

/// Configuration for a [`BucketStore`](crate::BucketStore)
#[derive(Clone, Debug)]
pub struct StoreConfig {
    /// Key pairs for the codec chain.
    /// The first pair signs new values; all pairs are tried when verifying
    /// (for key rotation).
    pub key_pairs: Vec<KeyPair>,

    /// Default cookie options, copied into every new session
    pub cookie: CookieOptions,

    /// Retry policy for bucket operations
    pub retry: RetryPolicy,
}

impl StoreConfig {
    /// Create a configuration with a single key pair
    pub fn new(key_pair: KeyPair) -> Self {
        Self::with_key_pairs([key_pair])
    }

    /// Create a configuration with several key pairs, primary first
    pub fn with_key_pairs<I>(key_pairs: I) -> Self
    where
        I: IntoIterator<Item = KeyPair>,
    {
        Self {
            key_pairs: key_pairs.into_iter().collect(),
            cookie: CookieOptions::default(),
            retry: RetryPolicy::default(),
        }
    }

    /// Append a key pair that is accepted when verifying but not used to sign
    pub fn with_key_pair(mut self, key_pair: KeyPair) -> Self {
        self.key_pairs.push(key_pair);
        self
    }

    /// Set the cookie path (default: "/"; empty means "/")
    pub fn with_cookie_path<S: Into<String>>(mut self, path: S) -> Self {
        self.cookie.path = path.into();
        if self.cookie.path.is_empty() {
            self.cookie.path = "/".to_string();
        }
        self
    }

    /// Set the cookie domain
    pub fn with_cookie_domain<S: Into<String>>(mut self, domain: S) -> Self {
        self.cookie.domain = Some(domain.into());
        self
    }

    /// Set the HttpOnly flag (default: true)
    pub fn with_http_only(mut self, http_only: bool) -> Self {
        self.cookie.http_only = http_only;
        self
    }

    /// Set the Secure flag (default: false)
    pub fn with_secure(mut self, secure: bool) -> Self {
        self.cookie.secure = secure;
        self
    }

    /// Set the SameSite attribute (default: Lax)
    pub fn with_same_site(mut self, same_site: SameSite) -> Self {
        self.cookie.same_site = same_site;
        self
    }

    /// Set max age in seconds (default: 30 days)
    pub fn with_max_age(mut self, max_age: i64) -> Self {
        self.cookie.max_age = max_age;
        self
    }

    /// Set max age from Duration
    pub fn with_max_age_duration(mut self, duration: Duration) -> Self {
        self.cookie.max_age = i64::try_from(duration.as_secs()).unwrap_or(i64::MAX);
        self
    }

    /// Set the retry policy for bucket operations
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Check the settings a store cannot be built without
    pub fn validate(&self) -> SessionResult<()> {
        if self.cookie.max_age <= 0 {
            return Err(SessionError::InvalidMaxAge(self.cookie.max_age));
        }
        if self.key_pairs.is_empty() {
            return Err(SessionError::InvalidKey(
                "at least one key pair is required".to_string(),
            ));
        }
        Ok(())
    }
}
