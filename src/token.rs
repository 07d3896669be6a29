use aes_gcm::aead::{Aead, AeadCore, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use anyhow::{Context, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use url::form_urlencoded;

use crate::error::{DecodeError, EncodeError};

/// AES-256 key length in bytes.
pub const KEY_LEN: usize = 32;
/// AES-GCM nonce length in bytes.
pub const NONCE_LEN: usize = 12;

/// Reversible URL tokenization.
///
/// `encode` seals an origin URL under AES-256-GCM with a fresh OS-random
/// nonce per call, so the same URL yields a different token every time
/// while always decoding back to the exact original bytes. The wire shape
/// is `hex(nonce) + ":" + base64(ciphertext)`.
///
/// The key is process-wide and read-only after construction; rotating it
/// invalidates every previously issued token.
pub struct TokenCodec {
    cipher: Aes256Gcm,
    public_base: String,
}

impl TokenCodec {
    /// Build a codec from raw key bytes and the public relay base path
    /// tokens will be embedded under (e.g. `http://host/image-urls`).
    pub fn new(key: &[u8; KEY_LEN], public_base: impl Into<String>) -> Self {
        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));
        Self {
            cipher,
            public_base: public_base.into(),
        }
    }

    /// Build a codec from a hex-encoded key (64 hex chars = 32 bytes),
    /// the form the key takes in the environment.
    pub fn from_hex_key(hex_key: &str, public_base: impl Into<String>) -> Result<Self> {
        let bytes = hex::decode(hex_key.trim()).context("token key is not valid hex")?;
        let key: [u8; KEY_LEN] = bytes
            .try_into()
            .map_err(|_| anyhow::anyhow!("token key must be {} bytes ({} hex chars)", KEY_LEN, KEY_LEN * 2))?;
        Ok(Self::new(&key, public_base))
    }

    /// Seal an origin URL into an opaque token.
    ///
    /// Non-deterministic: each call draws a new nonce from the OS CSPRNG,
    /// so tokens for the same URL are uncorrelated.
    pub fn encode(&self, url: &str) -> Result<String, EncodeError> {
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = self
            .cipher
            .encrypt(&nonce, url.as_bytes())
            .map_err(|_| EncodeError)?;
        Ok(format!("{}:{}", hex::encode(nonce), BASE64.encode(ciphertext)))
    }

    /// Open a token back into the origin URL it was sealed from.
    ///
    /// Fails on any shape, encoding or authentication problem; a tampered
    /// or truncated token never yields a partial URL.
    pub fn decode(&self, token: &str) -> Result<String, DecodeError> {
        let (nonce_hex, payload) = token.split_once(':').ok_or(DecodeError::Shape)?;
        if payload.contains(':') {
            return Err(DecodeError::Shape);
        }

        let nonce_bytes = hex::decode(nonce_hex)?;
        if nonce_bytes.len() != NONCE_LEN {
            return Err(DecodeError::NonceLength);
        }
        let ciphertext = BASE64.decode(payload)?;

        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(&nonce_bytes), ciphertext.as_ref())
            .map_err(|_| DecodeError::Decrypt)?;

        Ok(String::from_utf8(plaintext)?)
    }

    /// Wrap an origin URL into the full client-facing relay URL:
    /// the public base path with the token as one escaped query parameter.
    /// The token is the only thing a client ever sees.
    pub fn image_url(&self, origin: &str) -> Result<String, EncodeError> {
        let token = self.encode(origin)?;
        let escaped: String = form_urlencoded::byte_serialize(token.as_bytes()).collect();
        Ok(format!("{}?url={}", self.public_base, escaped))
    }
}
