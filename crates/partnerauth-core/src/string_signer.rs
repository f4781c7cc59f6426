//! Keyed HMAC over raw strings.
//!
//! A [`StringSigner`] knows nothing about HTTP. It resolves `(partner_id,
//! key_id)` to a secret and computes a lowercase hex MAC over the supplied
//! text. [`HmacStringSigner`] is the implementation backed by a
//! [`KeyProvider`].

use std::fmt;
use std::sync::Arc;

use hmac::{Hmac, KeyInit, Mac};
use sha2::Sha256;

use crate::keys::KeyProvider;

type HmacSha256 = Hmac<Sha256>;

/// MAC algorithms a [`StringSigner`] can be asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignatureAlgorithm {
    /// HMAC with SHA-256.
    HmacSha256,
}

impl fmt::Display for SignatureAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::HmacSha256 => f.write_str("HMAC_SHA256"),
        }
    }
}

/// Errors raised while resolving or using a signing key.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum KeyError {
    /// No key is registered for the partner and key ID.
    #[error("no key found for partner-id={partner_id}, key-id={key_id}")]
    KeyNotFound {
        /// Partner that was looked up.
        partner_id: String,
        /// Key ID that was looked up.
        key_id: String,
    },

    /// A key exists but cannot be used with the requested algorithm.
    #[error("key cannot be used with {0}")]
    InvalidKey(SignatureAlgorithm),
}

/// Computes keyed signatures over arbitrary text.
pub trait StringSigner: Send + Sync + fmt::Debug {
    /// Sign `text` with the key identified by `partner_id` and `key_id`.
    ///
    /// Returns the signature as lowercase hex.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::KeyNotFound`] if the key is unknown.
    fn generate_signature(
        &self,
        algorithm: SignatureAlgorithm,
        partner_id: &str,
        key_id: &str,
        text: &str,
    ) -> Result<String, KeyError>;
}

/// [`StringSigner`] that looks keys up in a [`KeyProvider`].
#[derive(Clone)]
pub struct HmacStringSigner {
    keys: Arc<dyn KeyProvider>,
}

impl HmacStringSigner {
    /// Create a signer backed by `keys`.
    pub fn new(keys: Arc<dyn KeyProvider>) -> Self {
        Self { keys }
    }
}

impl fmt::Debug for HmacStringSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Never print the key material.
        f.debug_struct("HmacStringSigner").finish_non_exhaustive()
    }
}

impl StringSigner for HmacStringSigner {
    fn generate_signature(
        &self,
        algorithm: SignatureAlgorithm,
        partner_id: &str,
        key_id: &str,
        text: &str,
    ) -> Result<String, KeyError> {
        let key = self
            .keys
            .get(partner_id, key_id)
            .ok_or_else(|| KeyError::KeyNotFound {
                partner_id: partner_id.to_owned(),
                key_id: key_id.to_owned(),
            })?;

        match algorithm {
            SignatureAlgorithm::HmacSha256 => {
                let mut mac = HmacSha256::new_from_slice(&key)
                    .map_err(|_| KeyError::InvalidKey(algorithm))?;
                mac.update(text.as_bytes());
                Ok(hex::encode(mac.finalize().into_bytes()))
            }
        }
    }
}
