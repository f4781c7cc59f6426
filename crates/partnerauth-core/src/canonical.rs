//! Canonical message construction.
//!
//! A canonical message is the exact text that gets signed. For a request it
//! looks like this:
//!
//! ```text
//! POST /path/to/sign?foo=bar
//! Content-Type: text/html; charset=utf8
//! Accept-Language: en
//! Accept-Language: de
//! 3b6c7b1b0e3b2c6e...
//! ```
//!
//! The first line (method, path and query) is only present for requests. Each
//! signed header contributes one line per occurrence, in the order the header
//! names were declared, using the name exactly as declared. The last line is
//! the lowercase hex SHA-256 of the body, or empty when there is no body. The
//! text always ends with a newline, and the string to sign is the canonical
//! message immediately followed by the decimal timestamp.

use std::fmt::Write as _;

use http::{HeaderMap, Method, Uri};
use sha2::{Digest, Sha256};

use crate::error::AuthError;

/// A single `(name, value)` pair observed on the message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalHeader {
    /// Header name as declared in `signed-headers`.
    pub name: String,
    /// Header value with surrounding whitespace removed.
    pub value: String,
}

impl CanonicalHeader {
    /// Create a header pair.
    #[must_use]
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Anything that can be rendered into canonical text.
pub trait CanonicalMessage {
    /// Append the canonical form of this message to `out`.
    fn write_canonical(&self, out: &mut String);

    /// The canonical form of this message.
    fn to_canonical_string(&self) -> String {
        let mut out = String::with_capacity(256);
        self.write_canonical(&mut out);
        out
    }
}

/// The canonical form of an HTTP request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CanonicalRequest {
    /// Request method, e.g. `POST`.
    pub method: String,
    /// Raw request path as sent on the wire.
    pub path: String,
    /// Raw query string without the leading `?`.
    pub query: Option<String>,
    /// Signed headers in signing order.
    pub headers: Vec<CanonicalHeader>,
    /// Lowercase hex SHA-256 of the body, absent for empty bodies.
    pub entity_digest: Option<String>,
}

impl CanonicalRequest {
    /// Build the canonical form of a request about to be sent.
    ///
    /// Names in `signed_headers` that do not occur in `headers` are removed
    /// from the list in place, so the list afterwards describes exactly what
    /// was signed.
    pub fn for_outgoing(
        method: &Method,
        uri: &Uri,
        signed_headers: &mut Vec<String>,
        headers: &HeaderMap,
        body: &[u8],
    ) -> Self {
        let mut canonical_headers = Vec::with_capacity(signed_headers.len());
        signed_headers.retain(|name| {
            let values = header_values(headers, name);
            let present = !values.is_empty();
            canonical_headers.extend(values.into_iter().map(|v| CanonicalHeader::new(name, v)));
            present
        });

        Self {
            method: method.as_str().to_owned(),
            path: uri.path().to_owned(),
            query: uri.query().map(ToOwned::to_owned),
            headers: canonical_headers,
            entity_digest: entity_digest(body),
        }
    }

    /// Reconstruct the canonical form of a received request.
    ///
    /// The body digest is supplied by the caller since server side bodies are
    /// digested while they stream.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidHeader`] if a declared signed header does not
    /// occur on the request.
    pub fn for_received(
        method: &Method,
        uri: &Uri,
        signed_headers: &[String],
        headers: &HeaderMap,
        entity_digest: Option<String>,
    ) -> Result<Self, AuthError> {
        let mut canonical_headers = Vec::with_capacity(signed_headers.len());
        for name in signed_headers {
            let values = header_values(headers, name);
            if values.is_empty() {
                return Err(AuthError::InvalidHeader(format!(
                    "signed-headers specified {name}, but was not found"
                )));
            }
            canonical_headers.extend(values.into_iter().map(|v| CanonicalHeader::new(name, v)));
        }

        Ok(Self {
            method: method.as_str().to_owned(),
            path: uri.path().to_owned(),
            query: uri.query().map(ToOwned::to_owned),
            headers: canonical_headers,
            entity_digest,
        })
    }
}

impl CanonicalMessage for CanonicalRequest {
    fn write_canonical(&self, out: &mut String) {
        out.push_str(&self.method);
        out.push(' ');
        out.push_str(&self.path);
        if let Some(query) = &self.query {
            out.push('?');
            out.push_str(query);
        }
        out.push('\n');
        write_headers_and_digest(&self.headers, self.entity_digest.as_deref(), out);
    }
}

/// The canonical form of an HTTP response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CanonicalResponse {
    /// Signed headers in signing order.
    pub headers: Vec<CanonicalHeader>,
    /// Lowercase hex SHA-256 of the body, absent for empty bodies.
    pub entity_digest: Option<String>,
}

impl CanonicalResponse {
    /// Build the canonical form of a response.
    ///
    /// Names in `signed_headers` that do not occur in `headers` are skipped.
    pub fn new(signed_headers: &[String], headers: &HeaderMap, body: &[u8]) -> Self {
        let headers = signed_headers
            .iter()
            .flat_map(|name| {
                header_values(headers, name)
                    .into_iter()
                    .map(move |v| CanonicalHeader::new(name, v))
            })
            .collect();

        Self {
            headers,
            entity_digest: entity_digest(body),
        }
    }
}

impl CanonicalMessage for CanonicalResponse {
    fn write_canonical(&self, out: &mut String) {
        write_headers_and_digest(&self.headers, self.entity_digest.as_deref(), out);
    }
}

/// Lowercase hex SHA-256 of `body`, or `None` if the body is empty.
#[must_use]
pub fn entity_digest(body: &[u8]) -> Option<String> {
    if body.is_empty() {
        None
    } else {
        Some(hex::encode(Sha256::digest(body)))
    }
}

/// The exact text passed to the HMAC: canonical message then timestamp.
pub fn string_to_sign<M: CanonicalMessage + ?Sized>(message: &M, timestamp: i64) -> String {
    let mut out = message.to_canonical_string();
    let _ = write!(out, "{timestamp}");
    out
}

/// All values of `name` on the message, trimmed, in the order they appear.
///
/// Lookup is case-insensitive. Values that are not valid UTF-8 are converted
/// lossily.
fn header_values(headers: &HeaderMap, name: &str) -> Vec<String> {
    headers
        .get_all(name)
        .iter()
        .map(|v| String::from_utf8_lossy(v.as_bytes()).trim().to_owned())
        .collect()
}

fn write_headers_and_digest(headers: &[CanonicalHeader], digest: Option<&str>, out: &mut String) {
    for header in headers {
        out.push_str(&header.name);
        out.push_str(": ");
        out.push_str(&header.value);
        out.push('\n');
    }
    if let Some(digest) = digest {
        out.push_str(digest);
    }
    out.push('\n');
}
