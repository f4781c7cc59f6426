//! Authorization info for the request currently being served.

use std::fmt;

use http::HeaderMap;
use partnerauth_core::{AuthError, AuthorizationHeader, CanonicalRequest, REQUEST_HEADER};

use crate::context::RequestContextStore;

/// The parsed `Authorization` header together with the canonical form of the
/// request it claims to sign.
#[derive(Debug, Clone)]
pub struct CurrentRequestAuthInfo {
    /// Header as sent by the client. Not yet validated.
    pub authorization: AuthorizationHeader,
    /// Canonical reconstruction of the received request.
    pub canonical_request: CanonicalRequest,
}

/// Produces [`CurrentRequestAuthInfo`] for the request being served.
///
/// Implement this to plug the verifier into a different server framework.
pub trait CurrentRequestAuthInfoProvider: Send + Sync + fmt::Debug {
    /// Auth info for the current request.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidHeader`] when the request's `Authorization`
    /// header is absent, duplicated, unparseable, or references a header the
    /// request does not carry, and [`AuthError::Programmer`] when called
    /// outside a request.
    fn current_request_info(&self) -> Result<CurrentRequestAuthInfo, AuthError>;
}

/// [`CurrentRequestAuthInfoProvider`] backed by the interceptor's
/// [`RequestContextStore`].
#[derive(Debug, Clone, Copy, Default)]
pub struct InterceptorRequestInfoProvider {
    store: RequestContextStore,
}

impl InterceptorRequestInfoProvider {
    /// Create a provider reading from `store`.
    #[must_use]
    pub fn new(store: RequestContextStore) -> Self {
        Self { store }
    }
}

impl CurrentRequestAuthInfoProvider for InterceptorRequestInfoProvider {
    fn current_request_info(&self) -> Result<CurrentRequestAuthInfo, AuthError> {
        let context = self.store.get()?;
        let authorization = parse_request_authorization(context.headers())?;
        let entity_digest = context.entity_digest()?;
        let canonical_request = CanonicalRequest::for_received(
            context.method(),
            context.uri(),
            &authorization.signed_headers,
            context.headers(),
            entity_digest,
        )?;

        Ok(CurrentRequestAuthInfo {
            authorization,
            canonical_request,
        })
    }
}

/// Extract and parse the single `Authorization` header of a request.
///
/// # Errors
///
/// Returns [`AuthError::InvalidHeader`] if there is no such header, more than
/// one, or it cannot be parsed.
pub fn parse_request_authorization(headers: &HeaderMap) -> Result<AuthorizationHeader, AuthError> {
    let mut values = headers.get_all(REQUEST_HEADER).iter();
    let value = match (values.next(), values.next()) {
        (None, _) => {
            return Err(AuthError::InvalidHeader(
                "No Authorization header provided".to_owned(),
            ));
        }
        (Some(_), Some(_)) => {
            return Err(AuthError::InvalidHeader(
                "Multiple Authorization headers provided".to_owned(),
            ));
        }
        (Some(value), None) => value,
    };

    let text = value.to_str().map_err(|_| {
        AuthError::InvalidHeader("Invalid Authorization header: not visible ASCII".to_owned())
    })?;

    AuthorizationHeader::parse(text).map_err(|err| {
        let detail = match err {
            AuthError::MalformedHeader(msg) => msg,
            other => other.to_string(),
        };
        AuthError::InvalidHeader(format!("Invalid Authorization header: {detail}"))
    })
}
