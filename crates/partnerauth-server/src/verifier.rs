//! Verification of the current request's authorization.
//!
//! Application code calls [`AuthorizationVerifier::get`] from inside a
//! handler. The verifier validates the `Authorization` header, checks that
//! its timestamp is within the validity window, verifies the signature over
//! the canonical request, and returns an [`AuthorizationContext`] identifying
//! the caller.
//!
//! The body digest is taken when `get` is called. Handlers must read the whole
//! request body before verifying; bytes read afterwards are not covered.

use std::sync::Arc;

use partnerauth_core::config::DEFAULT_VALIDITY_WINDOW_SECS;
use partnerauth_core::{AuthError, AuthorizationHeader, CanonicalRequest, Clock, MessageSigner};
use tracing::{debug, warn};

use crate::request_info::CurrentRequestAuthInfoProvider;

/// A verified authorization. Only [`AuthorizationVerifier`] creates these.
#[derive(Debug, Clone)]
pub struct AuthorizationContext {
    header: AuthorizationHeader,
    partner_id: String,
}

impl AuthorizationContext {
    /// The verified `Authorization` header.
    #[must_use]
    pub fn authorization_header(&self) -> &AuthorizationHeader {
        &self.header
    }

    /// The authenticated partner.
    #[must_use]
    pub fn partner_id(&self) -> &str {
        &self.partner_id
    }

    /// Ensure the caller is `partner_id`.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::AuthorizationFailed`] if the request was signed by
    /// a different partner.
    pub fn assert_valid_for_partner(&self, partner_id: &str) -> Result<(), AuthError> {
        if self.partner_id != partner_id {
            warn!(
                expected = partner_id,
                actual = %self.partner_id,
                "authorization not valid for partner"
            );
            return Err(AuthError::AuthorizationFailed(format!(
                "Authorization context not valid for operations as '{partner_id}'"
            )));
        }
        Ok(())
    }
}

/// Verifies the authorization of the request being served.
#[derive(Debug, Clone)]
pub struct AuthorizationVerifier {
    info: Arc<dyn CurrentRequestAuthInfoProvider>,
    signer: MessageSigner,
    clock: Arc<dyn Clock>,
    validity_window_secs: u64,
}

impl AuthorizationVerifier {
    /// Create a verifier using the signer's clock and the default 300 second
    /// validity window.
    pub fn new(info: Arc<dyn CurrentRequestAuthInfoProvider>, signer: MessageSigner) -> Self {
        let clock = Arc::clone(signer.clock());
        Self {
            info,
            signer,
            clock,
            validity_window_secs: DEFAULT_VALIDITY_WINDOW_SECS,
        }
    }

    /// Accept timestamps at most `secs` away from the local clock.
    #[must_use]
    pub fn with_validity_window(mut self, secs: u64) -> Self {
        self.validity_window_secs = secs;
        self
    }

    /// Accepted distance between request timestamp and local clock, in seconds.
    #[must_use]
    pub fn validity_window_secs(&self) -> u64 {
        self.validity_window_secs
    }

    /// Verify the current request.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidHeader`] if the header is missing,
    /// malformed or incomplete, [`AuthError::AuthorizationFailed`] if it is
    /// expired or the signature does not match, and [`AuthError::Programmer`]
    /// if the interceptor is not installed.
    pub fn get(&self) -> Result<AuthorizationContext, AuthError> {
        let info = self.info.current_request_info()?;
        self.verify(info.authorization, &info.canonical_request)
    }

    /// Verify `header` against an already reconstructed request.
    ///
    /// # Errors
    ///
    /// Same as [`get`](Self::get), minus the request lookup.
    pub fn verify(
        &self,
        header: AuthorizationHeader,
        request: &CanonicalRequest,
    ) -> Result<AuthorizationContext, AuthError> {
        debug!(method = %request.method, path = %request.path, "verifying request authorization");

        let missing = header.missing_fields();
        if !missing.is_empty() {
            let errors: Vec<String> = missing
                .iter()
                .map(|field| format!("{field}: may not be null"))
                .collect();
            return Err(AuthError::InvalidHeader(format!(
                "Invalid Authorization header: {}",
                errors.join("; ")
            )));
        }

        let (Some(partner_id), Some(timestamp)) = (header.partner_id.clone(), header.timestamp) else {
            return Err(AuthError::InvalidHeader(
                "Invalid Authorization header".to_owned(),
            ));
        };

        let now = self.clock.now();
        if now.abs_diff(timestamp) > self.validity_window_secs {
            warn!(
                partner_id = %partner_id,
                timestamp,
                now,
                window = self.validity_window_secs,
                "authorization timestamp outside validity window"
            );
            return Err(AuthError::AuthorizationFailed("Signature expired".to_owned()));
        }

        self.signer.verify_signature(&header, request)?;

        debug!(partner_id = %partner_id, "request authorization verified");
        Ok(AuthorizationContext { header, partner_id })
    }
}
