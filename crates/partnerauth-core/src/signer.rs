//! Signing and verification of canonical messages.
//!
//! [`MessageSigner`] owns scheme versioning. The only scheme currently
//! supported is [`SCHEME`]: HMAC-SHA256 over the canonical headers plus the
//! SHA-256 of the entity. The version prefix is reserved for changes that
//! cannot be expressed in the description part.

use std::sync::Arc;

use subtle::ConstantTimeEq;
use tracing::{debug, warn};

use crate::canonical::{CanonicalMessage, string_to_sign};
use crate::clock::{Clock, SystemClock};
use crate::error::AuthError;
use crate::header::AuthorizationHeader;
use crate::string_signer::{SignatureAlgorithm, StringSigner};

/// The supported signature scheme, in `$version/$description` form.
pub const SCHEME: &str = "2/HMAC_SHA256(H+SHA256(E))";

/// Signs and verifies canonical messages.
#[derive(Debug, Clone)]
pub struct MessageSigner {
    string_signer: Arc<dyn StringSigner>,
    clock: Arc<dyn Clock>,
}

impl MessageSigner {
    /// Create a signer that timestamps with the system clock.
    pub fn new(string_signer: Arc<dyn StringSigner>) -> Self {
        Self::with_clock(string_signer, Arc::new(SystemClock))
    }

    /// Create a signer that timestamps with `clock`.
    pub fn with_clock(string_signer: Arc<dyn StringSigner>, clock: Arc<dyn Clock>) -> Self {
        Self {
            string_signer,
            clock,
        }
    }

    /// The clock used for default timestamps.
    #[must_use]
    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Sign `message`, filling in the signature of `header`.
    ///
    /// The scheme defaults to [`SCHEME`] and the timestamp to the current time
    /// when they are not already set. The caller provides the partner and key
    /// IDs.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::CallerConfiguration`] wrapping the cause when the
    /// header cannot be used for signing, e.g. because of an unknown scheme or
    /// key.
    pub fn sign<M: CanonicalMessage + ?Sized>(
        &self,
        header: &mut AuthorizationHeader,
        message: &M,
    ) -> Result<(), AuthError> {
        if header.scheme.is_none() {
            header.scheme = Some(SCHEME.to_owned());
        }
        if header.timestamp.is_none() {
            header.timestamp = Some(self.clock.now());
        }

        let signature =
            self.generate_signature(header, message)
                .map_err(|source| AuthError::CallerConfiguration {
                    message: "Failed to sign message".to_owned(),
                    source: Box::new(source),
                })?;
        header.signature = Some(signature);
        Ok(())
    }

    /// Check that `header.signature` matches `message`.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::AuthorizationFailed`] if the signature does not
    /// match, or any error from [`MessageSigner::generate_signature`].
    pub fn verify_signature<M: CanonicalMessage + ?Sized>(
        &self,
        header: &AuthorizationHeader,
        message: &M,
    ) -> Result<(), AuthError> {
        let expected = self.generate_signature(header, message)?;
        let provided = header.signature.as_deref().unwrap_or_default();

        if !bool::from(expected.as_bytes().ct_eq(provided.as_bytes())) {
            warn!(
                partner_id = header.partner_id.as_deref().unwrap_or_default(),
                key_id = header.key_id.as_deref().unwrap_or_default(),
                timestamp = header.timestamp,
                "signature verification failed"
            );
            return Err(AuthError::AuthorizationFailed("Invalid signature".to_owned()));
        }

        debug!(
            partner_id = header.partner_id.as_deref().unwrap_or_default(),
            key_id = header.key_id.as_deref().unwrap_or_default(),
            "signature verified"
        );
        Ok(())
    }

    /// Compute the signature for `message` as described by `header`.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidHeader`] if the scheme is not [`SCHEME`],
    /// the timestamp is missing, or the partner and key IDs do not identify a
    /// usable key.
    pub fn generate_signature<M: CanonicalMessage + ?Sized>(
        &self,
        header: &AuthorizationHeader,
        message: &M,
    ) -> Result<String, AuthError> {
        if header.scheme.as_deref() != Some(SCHEME) {
            warn!(scheme = ?header.scheme, "unknown authorization scheme");
            return Err(AuthError::InvalidHeader(format!(
                "Unknown authorization scheme, {}",
                header.scheme.as_deref().unwrap_or("null")
            )));
        }
        let timestamp = header
            .timestamp
            .ok_or_else(|| AuthError::InvalidHeader("timestamp missing".to_owned()))?;

        let (Some(partner_id), Some(key_id)) = (header.partner_id.as_deref(), header.key_id.as_deref())
        else {
            return Err(AuthError::InvalidHeader(
                "Unrecognized partner-id or key-id".to_owned(),
            ));
        };

        let text = string_to_sign(message, timestamp);
        let signature = self
            .string_signer
            .generate_signature(SignatureAlgorithm::HmacSha256, partner_id, key_id, &text)
            .map_err(|err| {
                warn!(partner_id, key_id, error = %err, "cannot sign with requested key");
                AuthError::InvalidHeader("Unrecognized partner-id or key-id".to_owned())
            })?;

        debug!(partner_id, key_id, string_to_sign = %text, "generated signature");
        Ok(signature)
    }
}
