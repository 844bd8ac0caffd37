//! Session error types

use std::fmt;

/// Result alias used throughout the crate
pub type SessionResult<T> = Result<T, SessionError>;

/// Errors that can occur during session operations
#[derive(Debug)]
pub enum SessionError {
    /// Cookie max age must be strictly positive
    InvalidMaxAge(i64),
    /// Missing or malformed signing/encryption key
    InvalidKey(String),
    /// Could not reach the backing bucket, or the store was closed
    ConnectionError(String),
    /// Cookie or stored value failed signature verification
    InvalidSignature,
    /// Cookie or stored value was well-signed but otherwise unusable
    /// (expired timestamp, undecryptable payload, malformed framing)
    Authentication(String),
    /// A bucket operation timed out; safe to retry
    Timeout(String),
    /// Any other error from the backing bucket
    StoreError(String),
    /// Error during serialization/deserialization
    SerializationError(String),
    /// Error while producing an encoded value for the bucket or the cookie
    EncodingError(String),
    /// Redis error (when redis-store feature is enabled)
    #[cfg(feature = "redis-store")]
    RedisError(redis::RedisError),
}

impl SessionError {
    /// Whether the error is a transient timeout that the retry policy may retry.
    pub fn is_transient(&self) -> bool {
        match self {
            SessionError::Timeout(_) => true,
            #[cfg(feature = "redis-store")]
            SessionError::RedisError(e) => e.is_timeout(),
            _ => false,
        }
    }

    /// Whether the error came from verifying a cookie or stored value.
    pub fn is_authentication(&self) -> bool {
        matches!(
            self,
            SessionError::InvalidSignature | SessionError::Authentication(_)
        )
    }
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionError::InvalidMaxAge(age) => {
                write!(f, "Invalid max age {}: must be greater than zero", age)
            }
            SessionError::InvalidKey(msg) => write!(f, "Invalid key: {}", msg),
            SessionError::ConnectionError(msg) => write!(f, "Connection error: {}", msg),
            SessionError::InvalidSignature => write!(f, "Invalid cookie signature"),
            SessionError::Authentication(msg) => write!(f, "Authentication error: {}", msg),
            SessionError::Timeout(msg) => write!(f, "Bucket operation timed out: {}", msg),
            SessionError::StoreError(msg) => write!(f, "Session store error: {}", msg),
            SessionError::SerializationError(msg) => write!(f, "Serialization error: {}", msg),
            SessionError::EncodingError(msg) => write!(f, "Encoding error: {}", msg),
            #[cfg(feature = "redis-store")]
            SessionError::RedisError(e) => write!(f, "Redis error: {}", e),
        }
    }
}

impl std::error::Error for SessionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            #[cfg(feature = "redis-store")]
            SessionError::RedisError(e) => Some(e),
            _ => None,
        }
    }
}

#[cfg(feature = "redis-store")]
impl From<redis::RedisError> for SessionError {
    fn from(err: redis::RedisError) -> Self {
        SessionError::RedisError(err)
    }
}

impl From<serde_json::Error> for SessionError {
    fn from(err: serde_json::Error) -> Self {
        SessionError::SerializationError(err.to_string())
    }
}
