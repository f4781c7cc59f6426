//! Server side PartnerAuth for hyper services.
//!
//! Put an [`AuthInterceptor`] in front of the application handler. It
//! digests the request body as the handler reads it, keeps the request's
//! context available to the handler, and signs the buffered response
//! afterwards. Inside the handler, call [`AuthorizationVerifier::get`] to
//! authenticate the caller.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use http::{Request, Response};
//! use partnerauth_core::{PartnerAuthConfig, StaticKeyProvider};
//! use partnerauth_server::{AuthComponents, BoxError, RequestBody, full_body};
//!
//! let keys = StaticKeyProvider::new([(("bob".to_owned(), "1".to_owned()), b"secret".to_vec())]);
//! let components = AuthComponents::new(Arc::new(keys), &PartnerAuthConfig::default());
//! let verifier = Arc::clone(&components.verifier);
//!
//! let service = components.interceptor(move |req: Request<RequestBody<hyper::body::Incoming>>| {
//!     let verifier = Arc::clone(&verifier);
//!     async move {
//!         use http_body_util::BodyExt;
//!         let body = req.into_body().collect().await?.to_bytes();
//!         let auth = verifier.get()?;
//!         auth.assert_valid_for_partner("bob")?;
//!         Ok::<_, BoxError>(Response::new(full_body(body)))
//!     }
//! });
//! # let _ = service;
//! ```
//!
//! # Modules
//!
//! - [`interceptor`] - The hyper service wrapping the application handler
//! - [`body`] - Digesting request body and response body helpers
//! - [`context`] - Task-scoped request context store
//! - [`request_info`] - Auth info for the current request
//! - [`verifier`] - Request verification for application code
//! - [`response_signer`] - Response signing
//! - [`components`] - One-stop wiring from configuration

pub mod body;
pub mod components;
pub mod context;
pub mod interceptor;
pub mod request_info;
pub mod response_signer;
pub mod verifier;

pub use body::{EntityDigestAccumulator, RequestBody, ResponseBody, empty_body, full_body};
pub use components::AuthComponents;
pub use context::{RequestContext, RequestContextGuard, RequestContextStore};
pub use interceptor::{AuthHandler, AuthInterceptor, BoxError, InterceptorConfig, SigningOutcome};
pub use request_info::{
    CurrentRequestAuthInfo, CurrentRequestAuthInfoProvider, InterceptorRequestInfoProvider,
};
pub use response_signer::ResponseSigner;
pub use verifier::{AuthorizationContext, AuthorizationVerifier};
