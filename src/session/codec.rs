//! Authenticated, optionally encrypted cookie values.
//!
//! # Token Layout
//! ```text
//! base64url_nopad( timestamp[8, big-endian] | mac[32] | body )
//!
//! body = json(value)                       (hash key only)
//!      = nonce[12] | aes256gcm(json(value)) (hash key + block key)
//!
//! mac  = hmac_sha256(hash_key, len(name)[8] | name | timestamp | body)
//! ```
//!
//! # Design Decisions
//! - Fixed-width header: any byte flipped inside the token is caught by the
//!   MAC, never by a parser that might accept a shorter structure
//! - The cookie name is part of the MAC input, so a token minted for one
//!   session name does not verify under another
//! - Key rotation: encode with the first pair, decode with each pair in turn
//! - Once a MAC verifies, a later failure (expiry, body) is final; the
//!   remaining pairs are not tried

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use aes_gcm::aead::{Aead, AeadCore, OsRng};
use aes_gcm::{Aes256Gcm, KeyInit, Nonce};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use hmac::{Hmac, Mac};
use rand::RngCore;
use serde::de::DeserializeOwned;
use serde::Serialize;
use sha2::Sha256;
use thiserror::Error;

use crate::session::options::DEFAULT_MAX_AGE;

type HmacSha256 = Hmac<Sha256>;

const TIMESTAMP_LEN: usize = 8;
const MAC_LEN: usize = 32;
const HEADER_LEN: usize = TIMESTAMP_LEN + MAC_LEN;
const NONCE_LEN: usize = 12;

/// Required block key length (AES-256).
pub const BLOCK_KEY_LEN: usize = 32;

/// Errors produced while encoding or decoding a token.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    /// The token is not structurally valid.
    #[error("codec: invalid token format: {0}")]
    Format(String),

    /// No configured key verified the token.
    #[error("codec: the value is not valid")]
    Integrity,

    /// The token verified but its timestamp is older than the codec's max age.
    #[error("codec: expired timestamp (issued at {issued_at}, max age {max_age}s)")]
    Expired { issued_at: i64, max_age: i64 },

    /// The value could not be serialized or encrypted.
    #[error("codec: encode failed: {0}")]
    Encode(String),

    /// A key had an unusable length.
    #[error("codec: invalid key: {0}")]
    InvalidKey(String),

    /// The codec set holds no key pairs.
    #[error("codec: no codecs were provided")]
    NoKeys,
}

impl CodecError {
    /// Short label for metrics and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            CodecError::Format(_) => "format",
            CodecError::Integrity => "integrity",
            CodecError::Expired { .. } => "expired",
            CodecError::Encode(_) => "encode",
            CodecError::InvalidKey(_) => "invalid_key",
            CodecError::NoKeys => "no_keys",
        }
    }
}

/// One integrity key plus an optional confidentiality key.
#[derive(Clone)]
pub struct KeyPair {
    hash_key: Vec<u8>,
    block_key: Option<Vec<u8>>,
}

impl KeyPair {
    /// Build a key pair. The hash key must be non-empty; a block key, when
    /// given, must be exactly [`BLOCK_KEY_LEN`] bytes.
    pub fn new(hash_key: impl Into<Vec<u8>>, block_key: Option<Vec<u8>>) -> Result<Self, CodecError> {
        let hash_key = hash_key.into();
        if hash_key.is_empty() {
            return Err(CodecError::InvalidKey("hash key is empty".to_string()));
        }
        if let Some(block) = &block_key {
            if block.len() != BLOCK_KEY_LEN {
                return Err(CodecError::InvalidKey(format!(
                    "block key must be {} bytes, got {}",
                    BLOCK_KEY_LEN,
                    block.len()
                )));
            }
        }
        Ok(Self {
            hash_key,
            block_key,
        })
    }

    /// Generate a random key pair: a 64-byte hash key and, if `encrypt`, a
    /// 32-byte block key.
    pub fn generate(encrypt: bool) -> Self {
        let mut hash_key = vec![0u8; 64];
        rand::rngs::OsRng.fill_bytes(&mut hash_key);
        let block_key = encrypt.then(|| {
            let mut key = vec![0u8; BLOCK_KEY_LEN];
            rand::rngs::OsRng.fill_bytes(&mut key);
            key
        });
        Self {
            hash_key,
            block_key,
        }
    }

    pub fn hash_key(&self) -> &[u8] {
        &self.hash_key
    }

    pub fn block_key(&self) -> Option<&[u8]> {
        self.block_key.as_deref()
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

/// Codec bound to a single key pair.
#[derive(Clone)]
pub struct SecureCodec {
    hash_key: Vec<u8>,
    cipher: Option<Aes256Gcm>,
    max_age: i64,
}

impl SecureCodec {
    pub fn new(keys: &KeyPair) -> Result<Self, CodecError> {
        let cipher = match keys.block_key() {
            Some(block) => Some(
                <Aes256Gcm as KeyInit>::new_from_slice(block)
                    .map_err(|e| CodecError::InvalidKey(e.to_string()))?,
            ),
            None => None,
        };
        Ok(Self {
            hash_key: keys.hash_key().to_vec(),
            cipher,
            max_age: DEFAULT_MAX_AGE,
        })
    }

    /// Maximum token age in seconds. `0` disables the expiry check.
    pub fn max_age(&self) -> i64 {
        self.max_age
    }

    pub fn set_max_age(&mut self, max_age: i64) {
        self.max_age = max_age;
    }

    pub fn encode<T: Serialize + ?Sized>(&self, name: &str, value: &T) -> Result<String, CodecError> {
        self.encode_at(name, value, unix_now())
    }

    pub fn decode<T: DeserializeOwned>(&self, name: &str, token: &str) -> Result<T, CodecError> {
        self.decode_at(name, token, unix_now())
    }

    /// Encode with an explicit issue timestamp (unix seconds).
    pub fn encode_at<T: Serialize + ?Sized>(
        &self,
        name: &str,
        value: &T,
        now: i64,
    ) -> Result<String, CodecError> {
        let plain = serde_json::to_vec(value).map_err(|e| CodecError::Encode(e.to_string()))?;

        let body = match &self.cipher {
            Some(cipher) => {
                let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
                let sealed = cipher
                    .encrypt(&nonce, plain.as_slice())
                    .map_err(|e| CodecError::Encode(e.to_string()))?;
                let mut body = nonce.to_vec();
                body.extend_from_slice(&sealed);
                body
            }
            None => plain,
        };

        let timestamp = now.to_be_bytes();
        let tag = self.mac(name, &timestamp, &body)?.finalize().into_bytes();

        let mut raw = Vec::with_capacity(HEADER_LEN + body.len());
        raw.extend_from_slice(&timestamp);
        raw.extend_from_slice(&tag);
        raw.extend_from_slice(&body);
        Ok(URL_SAFE_NO_PAD.encode(raw))
    }

    /// Decode against an explicit clock (unix seconds).
    pub fn decode_at<T: DeserializeOwned>(
        &self,
        name: &str,
        token: &str,
        now: i64,
    ) -> Result<T, CodecError> {
        let raw = URL_SAFE_NO_PAD
            .decode(token)
            .map_err(|e| CodecError::Format(e.to_string()))?;
        if raw.len() < HEADER_LEN {
            return Err(CodecError::Format(format!(
                "token is {} bytes, shorter than the {} byte header",
                raw.len(),
                HEADER_LEN
            )));
        }

        let (timestamp, rest) = raw.split_at(TIMESTAMP_LEN);
        let (tag, body) = rest.split_at(MAC_LEN);

        self.mac(name, timestamp, body)?
            .verify_slice(tag)
            .map_err(|_| CodecError::Integrity)?;

        let mut ts = [0u8; TIMESTAMP_LEN];
        ts.copy_from_slice(timestamp);
        let issued_at = i64::from_be_bytes(ts);
        if self.max_age > 0 && issued_at < now.saturating_sub(self.max_age) {
            return Err(CodecError::Expired {
                issued_at,
                max_age: self.max_age,
            });
        }

        let plain = match &self.cipher {
            Some(cipher) => {
                if body.len() < NONCE_LEN {
                    return Err(CodecError::Format("encrypted body is missing its nonce".to_string()));
                }
                let (nonce, sealed) = body.split_at(NONCE_LEN);
                cipher
                    .decrypt(Nonce::from_slice(nonce), sealed)
                    .map_err(|_| CodecError::Integrity)?
            }
            None => body.to_vec(),
        };

        serde_json::from_slice(&plain).map_err(|e| CodecError::Format(e.to_string()))
    }

    fn mac(&self, name: &str, timestamp: &[u8], body: &[u8]) -> Result<HmacSha256, CodecError> {
        let mut mac = <HmacSha256 as Mac>::new_from_slice(&self.hash_key)
            .map_err(|e| CodecError::InvalidKey(e.to_string()))?;
        mac.update(&(name.len() as u64).to_be_bytes());
        mac.update(name.as_bytes());
        mac.update(timestamp);
        mac.update(body);
        Ok(mac)
    }
}

impl fmt::Debug for SecureCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecureCodec")
            .field("encrypted", &self.cipher.is_some())
            .field("max_age", &self.max_age)
            .finish()
    }
}

/// Ordered list of codecs supporting key rotation.
#[derive(Debug, Clone, Default)]
pub struct CodecSet {
    codecs: Vec<SecureCodec>,
}

impl CodecSet {
    /// Build one codec per key pair, in order.
    pub fn from_pairs(pairs: &[KeyPair]) -> Result<Self, CodecError> {
        let codecs = pairs
            .iter()
            .map(SecureCodec::new)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { codecs })
    }

    pub fn len(&self) -> usize {
        self.codecs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codecs.is_empty()
    }

    /// Set the max age on every codec.
    pub fn set_max_age(&mut self, max_age: i64) {
        for codec in &mut self.codecs {
            codec.set_max_age(max_age);
        }
    }

    /// Encode with the first codec.
    pub fn encode<T: Serialize + ?Sized>(&self, name: &str, value: &T) -> Result<String, CodecError> {
        self.codecs
            .first()
            .ok_or(CodecError::NoKeys)?
            .encode(name, value)
    }

    /// Decode with each codec in order until one verifies.
    pub fn decode<T: DeserializeOwned>(&self, name: &str, token: &str) -> Result<T, CodecError> {
        self.decode_at(name, token, unix_now())
    }

    pub fn decode_at<T: DeserializeOwned>(
        &self,
        name: &str,
        token: &str,
        now: i64,
    ) -> Result<T, CodecError> {
        if self.codecs.is_empty() {
            return Err(CodecError::NoKeys);
        }
        for codec in &self.codecs {
            match codec.decode_at(name, token, now) {
                Err(CodecError::Integrity) => continue,
                other => return other,
            }
        }
        Err(CodecError::Integrity)
    }
}

fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or_default()
}
