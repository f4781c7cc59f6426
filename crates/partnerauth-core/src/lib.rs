//! Symmetric HMAC authentication for HTTP messages.
//!
//! PartnerAuth signs every request, and symmetrically every response, with an
//! HMAC over a canonical reconstruction of the message: method, path, query,
//! a declared set of headers, and the SHA-256 of the body. Peers share
//! partner-scoped secret keys, and a timestamp window protects against replay.
//!
//! This crate holds the transport independent pieces. The server side
//! interceptor lives in `partnerauth-server` and the client helpers in
//! `partnerauth-client`.
//!
//! # Usage
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use partnerauth_core::canonical::CanonicalRequest;
//! use partnerauth_core::header::AuthorizationHeader;
//! use partnerauth_core::keys::StaticKeyProvider;
//! use partnerauth_core::signer::MessageSigner;
//! use partnerauth_core::string_signer::HmacStringSigner;
//!
//! let keys = StaticKeyProvider::new([(("bob".to_owned(), "1".to_owned()), b"secret".to_vec())]);
//! let signer = MessageSigner::new(Arc::new(HmacStringSigner::new(Arc::new(keys))));
//!
//! let message = CanonicalRequest {
//!     method: "GET".to_owned(),
//!     path: "/accounts".to_owned(),
//!     ..CanonicalRequest::default()
//! };
//! let mut header = AuthorizationHeader::for_key("bob", "1");
//! signer.sign(&mut header, &message).unwrap();
//! signer.verify_signature(&header, &message).unwrap();
//! ```
//!
//! # Modules
//!
//! - [`header`] - `Authorization` / `X-SignedResponse` header codec
//! - [`canonical`] - Canonical message construction
//! - [`signer`] - Scheme aware signing and verification
//! - [`string_signer`] - Keyed HMAC over raw text
//! - [`keys`] - Key provider trait, backends and registry
//! - [`clock`] - Time source
//! - [`config`] - Environment driven configuration
//! - [`error`] - Error types

pub mod canonical;
pub mod clock;
pub mod config;
pub mod error;
pub mod header;
pub mod keys;
pub mod signer;
pub mod string_signer;

pub use canonical::{CanonicalHeader, CanonicalMessage, CanonicalRequest, CanonicalResponse};
pub use clock::{Clock, FixedClock, SystemClock};
pub use config::PartnerAuthConfig;
pub use error::{AuthError, AuthResult};
pub use header::{AuthorizationHeader, REQUEST_HEADER, RESPONSE_HEADER};
pub use keys::{KeyConfigError, KeyProvider, KeyProviderRegistry, PropertiesKeyProvider, StaticKeyProvider};
pub use signer::{MessageSigner, SCHEME};
pub use string_signer::{HmacStringSigner, KeyError, SignatureAlgorithm, StringSigner};
