//! The `Authorization` / `X-SignedResponse` header format.
//!
//! Example request header:
//!
//! ```text
//! Authorization: 2/HMAC_SHA256(H+SHA256(E)) partner-id=bob, key-id=1, timestamp=1403052141, signature=8fdb4d52...
//! ```
//!
//! Responses carry the same grammar in the `X-SignedResponse` header, since
//! `Authorization` is only meaningful on requests.

use std::fmt;
use std::str::FromStr;

use crate::error::AuthError;

/// Name of the header carrying the signature on requests.
pub const REQUEST_HEADER: &str = "Authorization";

/// Name of the header carrying the signature on responses.
pub const RESPONSE_HEADER: &str = "X-SignedResponse";

const PARAM_PARTNER_ID: &str = "partner-id";
const PARAM_KEY_ID: &str = "key-id";
const PARAM_SIGNED_HEADERS: &str = "signed-headers";
const PARAM_TIMESTAMP: &str = "timestamp";
const PARAM_SIGNATURE: &str = "signature";
const PARAM_REQUIRES_CANONICALIZE: &str = "requires-canonicalize";

/// Parsed (or to-be-serialized) contents of a signature header.
///
/// Every scalar field is optional so that a header can be built up
/// incrementally by the signer, and so that parsing never has to reject a
/// header just because a field is missing. Use [`missing_fields`] to check
/// whether a header is complete.
///
/// [`missing_fields`]: AuthorizationHeader::missing_fields
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthorizationHeader {
    /// Signature scheme, e.g. `2/HMAC_SHA256(H+SHA256(E))`.
    pub scheme: Option<String>,
    /// The partner who owns the signing key.
    pub partner_id: Option<String>,
    /// The ID of the key used to sign the message.
    pub key_id: Option<String>,
    /// Header names included in the signature, in signing order.
    pub signed_headers: Vec<String>,
    /// Signing time in seconds since the Unix epoch.
    pub timestamp: Option<i64>,
    /// Lowercase hex encoded signature.
    pub signature: Option<String>,
    /// Advisory flag: the signature only holds for the canonical form of the message.
    pub requires_canonicalize: Option<bool>,
}

impl AuthorizationHeader {
    /// Create an unsigned header for the given partner and key.
    #[must_use]
    pub fn for_key(partner_id: impl Into<String>, key_id: impl Into<String>) -> Self {
        Self {
            partner_id: Some(partner_id.into()),
            key_id: Some(key_id.into()),
            ..Self::default()
        }
    }

    /// Parse the textual value of a signature header.
    ///
    /// Only syntax is checked here. A successfully parsed header may still lack
    /// required fields.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::MalformedHeader`] if the value is empty, has no
    /// parameters after the scheme, or carries a non-numeric timestamp.
    ///
    /// # Examples
    ///
    /// ```
    /// use partnerauth_core::header::AuthorizationHeader;
    ///
    /// let header = AuthorizationHeader::parse(
    ///     "2/HMAC_SHA256(H+SHA256(E)) partner-id=bob, key-id=1, timestamp=1403052141, signature=abcd",
    /// )
    /// .unwrap();
    /// assert_eq!(header.partner_id.as_deref(), Some("bob"));
    /// assert_eq!(header.timestamp, Some(1_403_052_141));
    /// ```
    pub fn parse(value: &str) -> Result<Self, AuthError> {
        let value = value.trim();
        if value.is_empty() {
            return Err(AuthError::MalformedHeader("cannot be empty".to_owned()));
        }

        let (scheme, params) = value
            .split_once(char::is_whitespace)
            .ok_or_else(|| AuthError::MalformedHeader("format invalid".to_owned()))?;

        let mut header = Self {
            scheme: Some(scheme.to_owned()),
            ..Self::default()
        };

        for segment in params.trim_start().split(',').map(str::trim) {
            // Spurious commas and empty parameters are tolerated.
            let Some((key, value)) = segment.split_once('=') else {
                continue;
            };
            if value.trim().is_empty() {
                continue;
            }

            match key {
                PARAM_PARTNER_ID => header.partner_id = Some(value.to_owned()),
                PARAM_KEY_ID => header.key_id = Some(value.to_owned()),
                PARAM_SIGNED_HEADERS => {
                    header.signed_headers = value.split(';').map(ToOwned::to_owned).collect();
                }
                PARAM_TIMESTAMP => {
                    let timestamp = value.parse::<i64>().map_err(|_| {
                        AuthError::MalformedHeader(format!("invalid timestamp, {value}"))
                    })?;
                    header.timestamp = Some(timestamp);
                }
                PARAM_SIGNATURE => header.signature = Some(value.to_owned()),
                PARAM_REQUIRES_CANONICALIZE => {
                    header.requires_canonicalize = Some(value.eq_ignore_ascii_case("true"));
                }
                _ => {}
            }
        }

        Ok(header)
    }

    /// Wire names of the required fields that are not set.
    ///
    /// An empty result means the header is structurally complete.
    #[must_use]
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.scheme.is_none() {
            missing.push("scheme");
        }
        if self.partner_id.is_none() {
            missing.push(PARAM_PARTNER_ID);
        }
        if self.key_id.is_none() {
            missing.push(PARAM_KEY_ID);
        }
        if self.timestamp.is_none() {
            missing.push(PARAM_TIMESTAMP);
        }
        if self.signature.is_none() {
            missing.push(PARAM_SIGNATURE);
        }
        missing
    }
}

impl FromStr for AuthorizationHeader {
    type Err = AuthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for AuthorizationHeader {
    /// Serialize into the wire format accepted by [`AuthorizationHeader::parse`].
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut params: Vec<(&str, String)> = Vec::with_capacity(6);

        if let Some(partner_id) = &self.partner_id {
            params.push((PARAM_PARTNER_ID, partner_id.clone()));
        }
        if let Some(key_id) = &self.key_id {
            params.push((PARAM_KEY_ID, key_id.clone()));
        }
        if !self.signed_headers.is_empty() {
            params.push((PARAM_SIGNED_HEADERS, self.signed_headers.join(";")));
        }
        if let Some(timestamp) = self.timestamp {
            params.push((PARAM_TIMESTAMP, timestamp.to_string()));
        }
        if let Some(signature) = &self.signature {
            params.push((PARAM_SIGNATURE, signature.clone()));
        }
        if let Some(requires_canonicalize) = self.requires_canonicalize {
            params.push((PARAM_REQUIRES_CANONICALIZE, requires_canonicalize.to_string()));
        }

        f.write_str(self.scheme.as_deref().unwrap_or_default())?;
        for (i, (key, value)) in params.iter().enumerate() {
            let sep = if i == 0 { " " } else { ", " };
            write!(f, "{sep}{key}={value}")?;
        }
        Ok(())
    }
}
