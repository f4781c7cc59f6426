//! Client side PartnerAuth helpers over `http` types.
//!
//! Sign outgoing requests with [`sign_request`] and check signed responses
//! with [`verify_response`]. Both work on fully buffered bodies, so any HTTP
//! client can be used to actually send the request. [`RequestSigner`] bundles
//! a signer with the partner, key and header list to sign with.
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use partnerauth_client::RequestSigner;
//! use partnerauth_core::{HmacStringSigner, MessageSigner, REQUEST_HEADER, StaticKeyProvider};
//!
//! let keys = StaticKeyProvider::new([(("bob".to_owned(), "1".to_owned()), b"secret".to_vec())]);
//! let signer = MessageSigner::new(Arc::new(HmacStringSigner::new(Arc::new(keys))));
//! let client = RequestSigner::new(signer, "bob", "1").with_signed_headers(["Content-Type"]);
//!
//! let mut req = http::Request::post("http://api.example.com/x?y=1")
//!     .header("content-type", "application/json")
//!     .body(b"{}".to_vec())
//!     .unwrap();
//! client.sign(&mut req).unwrap();
//! assert!(req.headers().contains_key(REQUEST_HEADER));
//! ```

use http::{HeaderValue, Request, Response};
use partnerauth_core::{
    AuthError, AuthorizationHeader, CanonicalRequest, CanonicalResponse, MessageSigner,
    REQUEST_HEADER, RESPONSE_HEADER,
};
use tracing::{debug, warn};

/// Sign `req` and set its `Authorization` header.
///
/// Names in `signed_headers` that the request does not carry are dropped from
/// the signed list. Returns the header that was set.
///
/// # Errors
///
/// Returns [`AuthError::CallerConfiguration`] if the partner or key is not
/// known to the signer.
pub fn sign_request<B: AsRef<[u8]>>(
    signer: &MessageSigner,
    partner_id: &str,
    key_id: &str,
    signed_headers: &[String],
    req: &mut Request<B>,
) -> Result<AuthorizationHeader, AuthError> {
    let mut header = AuthorizationHeader::for_key(partner_id, key_id);
    header.signed_headers = signed_headers.to_vec();

    let canonical = CanonicalRequest::for_outgoing(
        req.method(),
        req.uri(),
        &mut header.signed_headers,
        req.headers(),
        req.body().as_ref(),
    );
    signer.sign(&mut header, &canonical)?;

    let value = HeaderValue::from_str(&header.to_string()).map_err(|_| AuthError::CallerConfiguration {
        message: "Failed to sign message".to_owned(),
        source: Box::new(AuthError::InvalidHeader(
            "partner-id or key-id is not a valid header value".to_owned(),
        )),
    })?;
    req.headers_mut().insert(REQUEST_HEADER, value);

    debug!(method = %req.method(), uri = %req.uri(), partner_id, key_id, "signed request");
    Ok(header)
}

/// Verify the `X-SignedResponse` header of `resp`.
///
/// Only the signature is checked; the response timestamp is not compared
/// against the local clock. Returns the verified header.
///
/// # Errors
///
/// Returns [`AuthError::InvalidHeader`] if there is not exactly one
/// `X-SignedResponse` header or it cannot be parsed, and
/// [`AuthError::AuthorizationFailed`] if the signature does not match.
pub fn verify_response<B: AsRef<[u8]>>(
    signer: &MessageSigner,
    resp: &Response<B>,
) -> Result<AuthorizationHeader, AuthError> {
    let values: Vec<&HeaderValue> = resp.headers().get_all(RESPONSE_HEADER).iter().collect();
    let [value] = values.as_slice() else {
        warn!(status = %resp.status(), count = values.len(), "unexpected number of signed response headers");
        return Err(AuthError::InvalidHeader(format!(
            "Got {} with {} {RESPONSE_HEADER} headers, expected 1",
            resp.status(),
            values.len()
        )));
    };

    let text = value.to_str().map_err(|_| {
        AuthError::InvalidHeader(format!("Invalid {RESPONSE_HEADER} header: not visible ASCII"))
    })?;
    let header = AuthorizationHeader::parse(text).map_err(|err| {
        let detail = match err {
            AuthError::MalformedHeader(msg) => msg,
            other => other.to_string(),
        };
        AuthError::InvalidHeader(format!("Invalid {RESPONSE_HEADER} header: {detail}"))
    })?;

    let missing = header.missing_fields();
    if !missing.is_empty() {
        return Err(AuthError::InvalidHeader(format!(
            "Invalid {RESPONSE_HEADER} header: missing {}",
            missing.join(", ")
        )));
    }

    let canonical = CanonicalResponse::new(&header.signed_headers, resp.headers(), resp.body().as_ref());
    signer.verify_signature(&header, &canonical)?;

    debug!(status = %resp.status(), "verified response signature");
    Ok(header)
}

/// Signs requests as one partner and key.
#[derive(Debug, Clone)]
pub struct RequestSigner {
    signer: MessageSigner,
    partner_id: String,
    key_id: String,
    signed_headers: Vec<String>,
}

impl RequestSigner {
    /// Sign as `partner_id` with `key_id`, without signing any headers.
    pub fn new(signer: MessageSigner, partner_id: impl Into<String>, key_id: impl Into<String>) -> Self {
        Self {
            signer,
            partner_id: partner_id.into(),
            key_id: key_id.into(),
            signed_headers: Vec::new(),
        }
    }

    /// Also sign these headers whenever a request carries them.
    #[must_use]
    pub fn with_signed_headers<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.signed_headers = names.into_iter().map(Into::into).collect();
        self
    }

    /// Sign `req`. See [`sign_request`].
    ///
    /// # Errors
    ///
    /// Same as [`sign_request`].
    pub fn sign<B: AsRef<[u8]>>(&self, req: &mut Request<B>) -> Result<AuthorizationHeader, AuthError> {
        sign_request(&self.signer, &self.partner_id, &self.key_id, &self.signed_headers, req)
    }

    /// Verify `resp`. See [`verify_response`].
    ///
    /// # Errors
    ///
    /// Same as [`verify_response`].
    pub fn verify<B: AsRef<[u8]>>(&self, resp: &Response<B>) -> Result<AuthorizationHeader, AuthError> {
        verify_response(&self.signer, resp)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use partnerauth_core::canonical::{CanonicalMessage, entity_digest};
    use partnerauth_core::{FixedClock, HmacStringSigner, StaticKeyProvider};

    use super::*;

    const NOW: i64 = 1_403_052_141;

    fn signer() -> MessageSigner {
        let keys = StaticKeyProvider::new([(
            ("bob".to_owned(), "1".to_owned()),
            b"shared-secret".to_vec(),
        )]);
        MessageSigner::with_clock(
            Arc::new(HmacStringSigner::new(Arc::new(keys))),
            Arc::new(FixedClock::new(NOW)),
        )
    }

    fn request() -> Request<Vec<u8>> {
        Request::post("http://api.example.com/x?y=1")
            .header("content-type", "application/json")
            .body(b"{\"a\":1}".to_vec())
            .unwrap()
    }

    #[test]
    fn test_should_sign_request_and_prune_absent_headers() {
        let mut req = request();

        let header = sign_request(
            &signer(),
            "bob",
            "1",
            &["Content-Type".to_owned(), "X-Absent".to_owned()],
            &mut req,
        )
        .unwrap();

        assert_eq!(header.signed_headers, vec!["Content-Type"]);
        assert_eq!(header.timestamp, Some(NOW));
        let sent = req.headers().get(REQUEST_HEADER).unwrap().to_str().unwrap();
        assert_eq!(AuthorizationHeader::parse(sent).unwrap(), header);

        let canonical = CanonicalRequest::for_received(
            req.method(),
            req.uri(),
            &header.signed_headers,
            req.headers(),
            entity_digest(req.body()),
        )
        .unwrap();
        assert_eq!(
            canonical.to_canonical_string(),
            format!(
                "POST /x?y=1\nContent-Type: application/json\n{}\n",
                entity_digest(b"{\"a\":1}").unwrap()
            )
        );
        signer().verify_signature(&header, &canonical).unwrap();
    }

    #[test]
    fn test_should_fail_signing_with_unknown_key() {
        let mut req = request();
        let err = sign_request(&signer(), "bob", "9", &[], &mut req).unwrap_err();
        assert!(matches!(err, AuthError::CallerConfiguration { .. }));
        assert!(!req.headers().contains_key(REQUEST_HEADER));
    }

    fn signed_response(body: &'static [u8]) -> Response<&'static [u8]> {
        let mut resp = Response::builder()
            .header("content-type", "application/json")
            .body(body)
            .unwrap();
        let mut header = AuthorizationHeader::for_key("bob", "1");
        header.signed_headers = vec!["Content-Type".to_owned()];
        let canonical = CanonicalResponse::new(&header.signed_headers, resp.headers(), body);
        signer().sign(&mut header, &canonical).unwrap();
        resp.headers_mut().insert(
            RESPONSE_HEADER,
            HeaderValue::from_str(&header.to_string()).unwrap(),
        );
        resp
    }

    #[test]
    fn test_should_verify_signed_response() {
        let client = RequestSigner::new(signer(), "bob", "1");
        let header = client.verify(&signed_response(b"ok")).unwrap();
        assert_eq!(header.partner_id.as_deref(), Some("bob"));
    }

    #[test]
    fn test_should_reject_tampered_response() {
        let mut resp = signed_response(b"ok");
        *resp.body_mut() = &b"ko"[..];
        let err = verify_response(&signer(), &resp).unwrap_err();
        assert!(matches!(err, AuthError::AuthorizationFailed(_)));

        let mut resp = signed_response(b"ok");
        resp.headers_mut()
            .insert("content-type", HeaderValue::from_static("text/plain"));
        assert!(verify_response(&signer(), &resp).is_err());
    }

    #[test]
    fn test_should_require_exactly_one_signature_header() {
        let unsigned = Response::new(&b""[..]);
        let err = verify_response(&signer(), &unsigned).unwrap_err();
        assert!(matches!(err, AuthError::InvalidHeader(ref msg) if msg.contains("with 0 X-SignedResponse headers")));

        let mut doubled = signed_response(b"ok");
        let value = doubled.headers().get(RESPONSE_HEADER).unwrap().clone();
        doubled.headers_mut().append(RESPONSE_HEADER, value);
        let err = verify_response(&signer(), &doubled).unwrap_err();
        assert!(matches!(err, AuthError::InvalidHeader(_)));
    }

    #[test]
    fn test_should_reject_unparseable_signature_header() {
        let mut resp = Response::new(&b""[..]);
        resp.headers_mut()
            .insert(RESPONSE_HEADER, HeaderValue::from_static("garbage"));
        let err = verify_response(&signer(), &resp).unwrap_err();
        assert!(matches!(err, AuthError::InvalidHeader(ref msg) if msg == "Invalid X-SignedResponse header: format invalid"));
    }

    #[test]
    fn test_should_sign_with_request_signer() {
        let client = RequestSigner::new(signer(), "bob", "1").with_signed_headers(["Content-Type"]);
        let mut req = request();
        let header = client.sign(&mut req).unwrap();
        assert_eq!(header.signed_headers, vec!["Content-Type"]);
    }
}
