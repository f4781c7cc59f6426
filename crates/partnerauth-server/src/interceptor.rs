//! The request digesting, response signing interceptor.
//!
//! [`AuthInterceptor`] sits in front of an [`AuthHandler`] and, for every
//! request:
//!
//! 1. Without an `Authorization` header, opens a context without a digest
//!    and hands the request through untouched (`Passthrough`).
//! 2. Otherwise wraps the request body so it is digested as the handler reads
//!    it, opens the request context, and runs the handler.
//! 3. Closes the context, buffers the response body, and signs it with the
//!    partner and key named by the request's `Authorization` header.
//! 4. Sends the buffered body with `X-SignedResponse` attached (`Signed`), or
//!    without it if the request header or the signing key is unusable
//!    (`Unsigned`).
//!
//! The outcome is recorded as a [`SigningOutcome`] in the response extensions.

use std::convert::Infallible;
use std::error::Error as StdError;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use bytes::Bytes;
use http::{HeaderMap, HeaderValue, Method, Request, Response, StatusCode, Uri};
use http_body::Body;
use http_body_util::BodyExt;
use hyper::body::Incoming;
use hyper::service::Service;
use partnerauth_core::{AuthError, MessageSigner, REQUEST_HEADER, RESPONSE_HEADER};
use tracing::{debug, error, warn};

use crate::body::{EntityDigestAccumulator, RequestBody, ResponseBody, full_body};
use crate::context::{RequestContext, RequestContextStore};
use crate::request_info::parse_request_authorization;
use crate::response_signer::ResponseSigner;

/// Error type handlers may fail with.
pub type BoxError = Box<dyn StdError + Send + Sync>;

/// Future returned by [`AuthHandler::handle`].
pub type HandlerFuture =
    Pin<Box<dyn Future<Output = Result<Response<ResponseBody>, BoxError>> + Send>>;

/// Application logic running behind the interceptor.
///
/// Implemented for every `Fn(Request<RequestBody<B>>) -> impl Future` closure.
pub trait AuthHandler<B>: Send + Sync + 'static {
    /// Handle a request and produce a response.
    fn handle(&self, req: Request<RequestBody<B>>) -> HandlerFuture;
}

impl<B, F, Fut> AuthHandler<B> for F
where
    F: Fn(Request<RequestBody<B>>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Response<ResponseBody>, BoxError>> + Send + 'static,
{
    fn handle(&self, req: Request<RequestBody<B>>) -> HandlerFuture {
        Box::pin(self(req))
    }
}

/// What the interceptor did with a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SigningOutcome {
    /// The request had no `Authorization` header; nothing was digested or signed.
    Passthrough,
    /// The response was buffered but could not be signed.
    Unsigned,
    /// The response carries `X-SignedResponse`.
    Signed,
}

/// Interceptor settings.
#[derive(Debug, Clone)]
pub struct InterceptorConfig {
    /// Response headers to sign whenever the handler sets them.
    pub signed_response_headers: Vec<String>,
}

impl Default for InterceptorConfig {
    fn default() -> Self {
        Self {
            signed_response_headers: vec![String::from("Content-Type")],
        }
    }
}

/// Digests requests, scopes the request context, and signs responses.
#[derive(Debug)]
pub struct AuthInterceptor<H> {
    handler: Arc<H>,
    store: RequestContextStore,
    response_signer: ResponseSigner,
    config: Arc<InterceptorConfig>,
}

impl<H> AuthInterceptor<H> {
    /// Create an interceptor in front of `handler`.
    pub fn new(
        handler: H,
        signer: MessageSigner,
        store: RequestContextStore,
        config: InterceptorConfig,
    ) -> Self {
        Self::from_shared(Arc::new(handler), signer, store, config)
    }

    /// Create an interceptor in front of a shared `handler`.
    pub fn from_shared(
        handler: Arc<H>,
        signer: MessageSigner,
        store: RequestContextStore,
        config: InterceptorConfig,
    ) -> Self {
        Self {
            handler,
            store,
            response_signer: ResponseSigner::new(signer),
            config: Arc::new(config),
        }
    }

    /// Run one request through the interceptor.
    ///
    /// # Errors
    ///
    /// Returns the handler's error, after the request context is closed, or
    /// an error if the response body cannot be read.
    pub async fn intercept<B>(&self, req: Request<B>) -> Result<Response<ResponseBody>, BoxError>
    where
        H: AuthHandler<B>,
        B: Body<Data = Bytes> + Send + 'static,
    {
        self.store.scope(self.intercept_scoped(req)).await
    }

    async fn intercept_scoped<B>(&self, req: Request<B>) -> Result<Response<ResponseBody>, BoxError>
    where
        H: AuthHandler<B>,
        B: Body<Data = Bytes> + Send + 'static,
    {
        let (parts, body) = req.into_parts();
        let method = parts.method.clone();
        let uri = parts.uri.clone();

        if !parts.headers.contains_key(REQUEST_HEADER) {
            debug!(%method, %uri, "no Authorization header, skipping auth processing");
            let context = Arc::new(RequestContext::new(
                method,
                uri,
                parts.headers.clone(),
                None,
            ));
            let _guard = self.store.open(context)?;
            let req = Request::from_parts(parts, RequestBody::passthrough(body));
            let mut response = self.handler.handle(req).await?;
            response.extensions_mut().insert(SigningOutcome::Passthrough);
            return Ok(response);
        }

        let request_headers = parts.headers.clone();
        let digest = Arc::new(EntityDigestAccumulator::new());
        let context = Arc::new(RequestContext::new(
            method.clone(),
            uri.clone(),
            parts.headers.clone(),
            Some(Arc::clone(&digest)),
        ));

        let result = {
            let _guard = self.store.open(Arc::clone(&context))?;
            debug!(%method, %uri, "invoking handler");
            let req = Request::from_parts(parts, RequestBody::digesting(body, digest));
            self.handler.handle(req).await
        };
        let response = result?;

        match context.access_count() {
            0 => warn!(%method, %uri, "request auth info was not accessed, i.e. auth info was not checked"),
            n => debug!(%method, %uri, accesses = n, "handler finished"),
        }

        let (mut parts, body) = response.into_parts();
        let data = body.collect().await?.to_bytes();

        let outcome = self.sign(&method, &uri, &request_headers, &mut parts.headers, &data);
        parts.extensions.insert(outcome);

        Ok(Response::from_parts(parts, full_body(data)))
    }

    /// Attach `X-SignedResponse` to `response_headers` if possible.
    fn sign(
        &self,
        method: &Method,
        uri: &Uri,
        request_headers: &HeaderMap,
        response_headers: &mut HeaderMap,
        body: &Bytes,
    ) -> SigningOutcome {
        let request_header = match parse_request_authorization(request_headers) {
            Ok(header) => header,
            Err(err) => {
                debug!(%method, %uri, error = %err, "not signing response, request Authorization header unusable");
                return SigningOutcome::Unsigned;
            }
        };

        let signed = self
            .response_signer
            .sign_response(
                &request_header,
                &self.config.signed_response_headers,
                response_headers,
                body,
            )
            .and_then(|header| {
                HeaderValue::from_str(&header.to_string()).map_err(|_| {
                    AuthError::Programmer("signed response header is not a valid header value".to_owned())
                })
            });

        match signed {
            Ok(value) => {
                debug!(%method, %uri, "signed response");
                response_headers.insert(RESPONSE_HEADER, value);
                SigningOutcome::Signed
            }
            Err(err) => {
                error!(
                    %method,
                    %uri,
                    error = %err,
                    cause = ?err.source().map(ToString::to_string),
                    partner_id = request_header.partner_id.as_deref().unwrap_or_default(),
                    key_id = request_header.key_id.as_deref().unwrap_or_default(),
                    "failed to sign response"
                );
                SigningOutcome::Unsigned
            }
        }
    }
}

impl<H> Clone for AuthInterceptor<H> {
    fn clone(&self) -> Self {
        Self {
            handler: Arc::clone(&self.handler),
            store: self.store,
            response_signer: self.response_signer.clone(),
            config: Arc::clone(&self.config),
        }
    }
}

impl<H> Service<Request<Incoming>> for AuthInterceptor<H>
where
    H: AuthHandler<Incoming>,
{
    type Response = Response<ResponseBody>;
    type Error = Infallible;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn call(&self, req: Request<Incoming>) -> Self::Future {
        let interceptor = self.clone();
        Box::pin(async move {
            match interceptor.intercept(req).await {
                Ok(response) => Ok(response),
                Err(err) => Ok(error_response(err.as_ref())),
            }
        })
    }
}

/// Map a handler error to a plain text response.
///
/// Errors raised by the remote peer's auth data keep their status. Anything
/// else is a 500.
fn error_response(err: &(dyn StdError + Send + Sync + 'static)) -> Response<ResponseBody> {
    let (status, message) = match err.downcast_ref::<AuthError>() {
        Some(auth) if auth.is_recoverable() => (auth.status_code(), auth.to_string()),
        _ => {
            error!(error = %err, "request handler failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                String::from("Internal Server Error"),
            )
        }
    };

    let mut response = Response::new(full_body(message));
    *response.status_mut() = status;
    response.headers_mut().insert(
        http::header::CONTENT_TYPE,
        HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    response
}
