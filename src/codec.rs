//! Authenticated cookie codec
//!
//! Values are serialized to JSON, optionally encrypted with AES-256-GCM, and
//! framed as `timestamp|payload|mac` where `mac` is HMAC-SHA256 over
//! `name|timestamp|payload`. The frame is base64url encoded without padding,
//! so encoded values are safe to use as cookie values and bucket blobs.
//!
//! Binding the cookie name into the MAC means a value issued for one cookie
//! cannot be replayed under another name.

use aes_gcm::aead::{Aead, AeadCore, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Nonce};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::Utc;
use hmac::{Hmac, Mac};
use serde::de::DeserializeOwned;
use serde::Serialize;
use sha2::Sha256;
use std::fmt;

use crate::error::{SessionError, SessionResult};

type HmacSha256 = Hmac<Sha256>;

const NONCE_LEN: usize = 12;
const BLOCK_KEY_LEN: usize = 32;
const MAX_CLOCK_SKEW_SECS: i64 = 60;

/// A signing key plus an optional encryption key.
#[derive(Clone)]
pub struct KeyPair {
    hash_key: Vec<u8>,
    block_key: Option<Vec<u8>>,
}

impl KeyPair {
    /// Sign-only key pair
    pub fn new(hash_key: impl Into<Vec<u8>>) -> Self {
        Self {
            hash_key: hash_key.into(),
            block_key: None,
        }
    }

    /// Key pair that signs and encrypts. The block key must be 32 bytes.
    pub fn with_block_key(hash_key: impl Into<Vec<u8>>, block_key: impl Into<Vec<u8>>) -> Self {
        Self {
            hash_key: hash_key.into(),
            block_key: Some(block_key.into()),
        }
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("hash_key", &"<redacted>")
            .field("encrypted", &self.block_key.is_some())
            .finish()
    }
}

/// Encoder/decoder for a single key pair
pub struct SecureCodec {
    hash_key: Vec<u8>,
    cipher: Option<Aes256Gcm>,
    max_age: i64,
}

impl SecureCodec {
    /// Build a codec from a key pair. Values whose timestamp is older than
    /// `max_age` seconds are rejected on decode; `0` disables the check.
    pub fn new(pair: &KeyPair, max_age: i64) -> SessionResult<Self> {
        if pair.hash_key.is_empty() {
            return Err(SessionError::InvalidKey(
                "hash key must not be empty".to_string(),
            ));
        }

        let cipher = match &pair.block_key {
            Some(key) if key.len() != BLOCK_KEY_LEN => {
                return Err(SessionError::InvalidKey(format!(
                    "block key must be {} bytes, got {}",
                    BLOCK_KEY_LEN,
                    key.len()
                )));
            }
            Some(key) => Some(
                Aes256Gcm::new_from_slice(key)
                    .map_err(|e| SessionError::InvalidKey(e.to_string()))?,
            ),
            None => None,
        };

        Ok(Self {
            hash_key: pair.hash_key.clone(),
            cipher,
            max_age,
        })
    }

    /// Serialize, optionally encrypt, timestamp and sign `value`.
    pub fn encode<T: Serialize + ?Sized>(&self, name: &str, value: &T) -> SessionResult<String> {
        let json =
            serde_json::to_vec(value).map_err(|e| SessionError::EncodingError(e.to_string()))?;
        let payload = match &self.cipher {
            Some(cipher) => encrypt(cipher, &json)?,
            None => json,
        };
        let payload = URL_SAFE_NO_PAD.encode(payload);

        let timestamp = Utc::now().timestamp();
        let mac = self.mac(name, timestamp, &payload).finalize().into_bytes();
        let frame = format!("{}|{}|{}", timestamp, payload, URL_SAFE_NO_PAD.encode(mac));

        Ok(URL_SAFE_NO_PAD.encode(frame))
    }

    /// Verify and decode a value produced by [`SecureCodec::encode`].
    pub fn decode<T: DeserializeOwned>(&self, name: &str, value: &str) -> SessionResult<T> {
        let frame = URL_SAFE_NO_PAD
            .decode(value.trim())
            .map_err(|_| SessionError::Authentication("value is not base64url".to_string()))?;
        let frame = String::from_utf8(frame)
            .map_err(|_| SessionError::Authentication("malformed frame".to_string()))?;

        let mut parts = frame.splitn(3, '|');
        let (Some(timestamp), Some(payload), Some(mac)) = (parts.next(), parts.next(), parts.next())
        else {
            return Err(SessionError::Authentication("malformed frame".to_string()));
        };
        let timestamp: i64 = timestamp
            .parse()
            .map_err(|_| SessionError::Authentication("malformed timestamp".to_string()))?;
        let mac = URL_SAFE_NO_PAD
            .decode(mac)
            .map_err(|_| SessionError::InvalidSignature)?;

        self.mac(name, timestamp, payload)
            .verify_slice(&mac)
            .map_err(|_| SessionError::InvalidSignature)?;
        self.check_timestamp(timestamp)?;

        let payload = URL_SAFE_NO_PAD
            .decode(payload)
            .map_err(|_| SessionError::Authentication("payload is not base64url".to_string()))?;
        let json = match &self.cipher {
            Some(cipher) => decrypt(cipher, &payload)?,
            None => payload,
        };

        Ok(serde_json::from_slice(&json)?)
    }

    fn mac(&self, name: &str, timestamp: i64, payload: &str) -> HmacSha256 {
        // KeyInit is also in scope for the cipher
        let mut mac = <HmacSha256 as Mac>::new_from_slice(&self.hash_key)
            .expect("HMAC can take key of any size");
        mac.update(name.as_bytes());
        mac.update(b"|");
        mac.update(timestamp.to_string().as_bytes());
        mac.update(b"|");
        mac.update(payload.as_bytes());
        mac
    }

    fn check_timestamp(&self, timestamp: i64) -> SessionResult<()> {
        let now = Utc::now().timestamp();
        if timestamp > now + MAX_CLOCK_SKEW_SECS {
            return Err(SessionError::Authentication(
                "timestamp is in the future".to_string(),
            ));
        }
        if self.max_age > 0 && timestamp < now - self.max_age {
            return Err(SessionError::Authentication("timestamp expired".to_string()));
        }
        Ok(())
    }
}

fn encrypt(cipher: &Aes256Gcm, plaintext: &[u8]) -> SessionResult<Vec<u8>> {
    let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
    let ciphertext = cipher
        .encrypt(&nonce, plaintext)
        .map_err(|e| SessionError::EncodingError(e.to_string()))?;

    let mut out = Vec::with_capacity(NONCE_LEN + ciphertext.len());
    out.extend_from_slice(&nonce);
    out.extend_from_slice(&ciphertext);
    Ok(out)
}

fn decrypt(cipher: &Aes256Gcm, data: &[u8]) -> SessionResult<Vec<u8>> {
    if data.len() < NONCE_LEN {
        return Err(SessionError::Authentication(
            "encrypted payload too short".to_string(),
        ));
    }
    let (nonce, ciphertext) = data.split_at(NONCE_LEN);
    cipher
        .decrypt(Nonce::from_slice(nonce), ciphertext)
        .map_err(|_| SessionError::Authentication("payload could not be decrypted".to_string()))
}

/// Ordered list of codecs.
///
/// The first codec encodes new values. All codecs are tried in order when
/// decoding, so retired keys can stay at the tail of the list while cookies
/// signed with them are still in circulation.
pub struct CodecChain {
    codecs: Vec<SecureCodec>,
}

impl CodecChain {
    pub fn from_pairs(pairs: &[KeyPair], max_age: i64) -> SessionResult<Self> {
        if pairs.is_empty() {
            return Err(SessionError::InvalidKey(
                "at least one key pair is required".to_string(),
            ));
        }
        let codecs = pairs
            .iter()
            .map(|pair| SecureCodec::new(pair, max_age))
            .collect::<SessionResult<Vec<_>>>()?;
        Ok(Self { codecs })
    }

    /// Encode with the primary codec
    pub fn encode<T: Serialize + ?Sized>(&self, name: &str, value: &T) -> SessionResult<String> {
        self.codecs[0].encode(name, value)
    }

    /// Decode with the first codec that accepts the value.
    ///
    /// When every codec fails, a signature mismatch is reported unless some
    /// codec verified the signature and failed later, in which case that
    /// more specific error wins.
    pub fn decode<T: DeserializeOwned>(&self, name: &str, value: &str) -> SessionResult<T> {
        let mut last_err = SessionError::InvalidSignature;
        for codec in &self.codecs {
            match codec.decode(name, value) {
                Ok(decoded) => return Ok(decoded),
                Err(SessionError::InvalidSignature) => {}
                Err(e) => last_err = e,
            }
        }
        Err(last_err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    const BLOCK_KEY: &[u8; 32] = b"0123456789abcdef0123456789abcdef";

    fn chain(pairs: &[KeyPair]) -> CodecChain {
        CodecChain::from_pairs(pairs, 3600).unwrap()
    }

    #[test]
    fn test_encode_and_decode() {
        let codecs = chain(&[KeyPair::new("keyboard cat")]);
        let id = "NBSWY3DPEB3W64TMMQ";

        let encoded = codecs.encode("sid", id).unwrap();
        assert!(!encoded.contains('='));

        let decoded: String = codecs.decode("sid", &encoded).unwrap();
        assert_eq!(decoded, id);
    }

    #[test]
    fn test_encrypted_values() {
        let codecs = chain(&[KeyPair::with_block_key("keyboard cat", BLOCK_KEY.to_vec())]);
        let mut values = BTreeMap::new();
        values.insert("user".to_string(), serde_json::json!("alice"));

        let encoded = codecs.encode("sid", &values).unwrap();
        let frame = String::from_utf8(URL_SAFE_NO_PAD.decode(&encoded).unwrap()).unwrap();
        let payload = frame.split('|').nth(1).unwrap();
        let raw = URL_SAFE_NO_PAD.decode(payload).unwrap();
        assert!(!String::from_utf8_lossy(&raw).contains("alice"));

        let decoded: BTreeMap<String, serde_json::Value> = codecs.decode("sid", &encoded).unwrap();
        assert_eq!(decoded, values);
    }

    #[test]
    fn test_wrong_key_is_rejected() {
        let encoded = chain(&[KeyPair::new("keyboard cat")])
            .encode("sid", "id")
            .unwrap();
        let result: SessionResult<String> =
            chain(&[KeyPair::new("wrong secret")]).decode("sid", &encoded);
        assert!(matches!(result, Err(SessionError::InvalidSignature)));
    }

    #[test]
    fn test_name_is_bound_into_signature() {
        let codecs = chain(&[KeyPair::new("keyboard cat")]);
        let encoded = codecs.encode("sid", "id").unwrap();
        let result: SessionResult<String> = codecs.decode("other", &encoded);
        assert!(matches!(result, Err(SessionError::InvalidSignature)));
    }

    #[test]
    fn test_tampered_value_is_rejected() {
        let codecs = chain(&[KeyPair::new("keyboard cat")]);
        let encoded = codecs.encode("sid", "some-session-id").unwrap();

        let mut bytes = encoded.into_bytes();
        let mid = bytes.len() / 2;
        bytes[mid] = if bytes[mid] == b'A' { b'B' } else { b'A' };
        let tampered = String::from_utf8(bytes).unwrap();

        let result: SessionResult<String> = codecs.decode("sid", &tampered);
        assert!(result.unwrap_err().is_authentication());
    }

    #[test]
    fn test_key_rotation() {
        let old = KeyPair::new("old-secret");
        let new = KeyPair::new("new-secret");

        let encoded = chain(&[old.clone()]).encode("sid", "session-id").unwrap();

        let rotated = chain(&[new, old]);
        let decoded: String = rotated.decode("sid", &encoded).unwrap();
        assert_eq!(decoded, "session-id");

        // New values are signed with the primary key only
        let fresh = rotated.encode("sid", "session-id").unwrap();
        let result: SessionResult<String> =
            chain(&[KeyPair::new("old-secret")]).decode("sid", &fresh);
        assert!(result.is_err());
    }

    #[test]
    fn test_expired_timestamp_is_rejected() {
        let codec = SecureCodec::new(&KeyPair::new("keyboard cat"), 60).unwrap();
        let payload = URL_SAFE_NO_PAD.encode(b"\"id\"");
        let timestamp = Utc::now().timestamp() - 120;
        let mac = codec.mac("sid", timestamp, &payload).finalize().into_bytes();
        let frame = format!("{}|{}|{}", timestamp, payload, URL_SAFE_NO_PAD.encode(mac));
        let encoded = URL_SAFE_NO_PAD.encode(frame);

        let result: SessionResult<String> = codec.decode("sid", &encoded);
        assert!(matches!(result, Err(SessionError::Authentication(_))));
    }

    #[test]
    fn test_invalid_keys() {
        assert!(matches!(
            CodecChain::from_pairs(&[], 3600),
            Err(SessionError::InvalidKey(_))
        ));
        assert!(matches!(
            SecureCodec::new(&KeyPair::new(Vec::new()), 3600),
            Err(SessionError::InvalidKey(_))
        ));
        assert!(matches!(
            SecureCodec::new(&KeyPair::with_block_key("secret", b"short".to_vec()), 3600),
            Err(SessionError::InvalidKey(_))
        ));
    }

    #[test]
    fn test_garbage_is_rejected() {
        let codecs = chain(&[KeyPair::new("keyboard cat")]);
        let result: SessionResult<String> = codecs.decode("sid", "not a cookie!");
        assert!(result.unwrap_err().is_authentication());
    }
}
