//! Signs buffered responses on behalf of the interceptor.

use http::HeaderMap;
use partnerauth_core::{AuthError, AuthorizationHeader, CanonicalResponse, MessageSigner};

/// Builds and signs the `X-SignedResponse` header for a response.
#[derive(Debug, Clone)]
pub struct ResponseSigner {
    signer: MessageSigner,
}

impl ResponseSigner {
    /// Create a response signer.
    #[must_use]
    pub fn new(signer: MessageSigner) -> Self {
        Self { signer }
    }

    /// Sign a response to a request that carried `request_header`.
    ///
    /// The response is signed with the partner and key the request was signed
    /// with. Of `headers_to_sign`, only those present in `response_headers` are
    /// signed and listed in the returned header.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::CallerConfiguration`] if signing fails, typically
    /// because the request referenced an unknown partner or key.
    pub fn sign_response(
        &self,
        request_header: &AuthorizationHeader,
        headers_to_sign: &[String],
        response_headers: &HeaderMap,
        body: &[u8],
    ) -> Result<AuthorizationHeader, AuthError> {
        let mut header = AuthorizationHeader {
            partner_id: request_header.partner_id.clone(),
            key_id: request_header.key_id.clone(),
            ..AuthorizationHeader::default()
        };
        header.signed_headers = headers_to_sign
            .iter()
            .filter(|name| response_headers.contains_key(name.as_str()))
            .cloned()
            .collect();

        let canonical = CanonicalResponse::new(&header.signed_headers, response_headers, body);
        self.signer.sign(&mut header, &canonical)?;
        Ok(header)
    }
}
