//! API key generation and hashing.
//!
//! Keys are 32 random bytes from the operating system CSPRNG, rendered as
//! 64 lowercase hex characters. Only the SHA-256 of a key is ever persisted.

use rand::TryRngCore;
use rand::rngs::OsRng;
use sha2::{Digest, Sha256};
use std::fmt;

/// Number of random bytes in an API key.
pub const API_KEY_BYTES: usize = 32;

/// Length of the hex-encoded key (and of its hex-encoded hash).
pub const API_KEY_HEX_LEN: usize = API_KEY_BYTES * 2;

/// An opaque bearer secret.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    /// Generate a new key from the operating system entropy source.
    pub fn generate() -> crate::Result<Self> {
        Self::generate_with(&mut OsRng)
    }

    /// Generate a new key from the given fallible RNG.
    ///
    /// Entropy failures are returned, never papered over with a weaker source.
    pub fn generate_with<R: TryRngCore + ?Sized>(rng: &mut R) -> crate::Result<Self> {
        let mut bytes = [0u8; API_KEY_BYTES];
        rng.try_fill_bytes(&mut bytes)
            .map_err(|e| crate::Error::KeyGeneration(e.to_string()))?;
        Ok(Self(encode_hex(&bytes)))
    }

    /// Wrap a key presented by a client.
    pub fn from_presented(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Lookup hash for storage and authentication.
    pub fn hash(&self) -> String {
        hash_api_key(&self.0)
    }

    /// The plaintext key. Only hand this to the key's owner.
    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey(<redacted>)")
    }
}

/// SHA-256 of a key as lowercase hex.
pub fn hash_api_key(key: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(key.as_bytes());
    encode_hex(&hasher.finalize())
}

fn encode_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}
