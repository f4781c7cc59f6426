//! End-to-end tests for PartnerAuth over a live hyper server.
//!
//! Every test starts its own server on an ephemeral local port, signs requests
//! with [`partnerauth_client`], sends them with `reqwest`, and verifies the
//! signed responses. The server's clock is fixed so timestamp windows can be
//! tested exactly.
//!
//! Run them with:
//! ```text
//! cargo test -p partnerauth-integration
//! ```

use std::net::SocketAddr;
use std::sync::{Arc, Once};

use bytes::Bytes;
use http::{HeaderValue, Request, Response, StatusCode};
use http_body_util::BodyExt;
use hyper::body::Incoming;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as HttpConnBuilder;
use partnerauth_client::RequestSigner;
use partnerauth_core::{
    FixedClock, HmacStringSigner, MessageSigner, PartnerAuthConfig, StaticKeyProvider,
};
use partnerauth_server::{
    AuthComponents, AuthHandler, AuthorizationVerifier, BoxError, RequestBody,
    RequestContextStore, ResponseBody, full_body,
};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tracing::debug;

#[cfg(test)]
mod test_context;
#[cfg(test)]
mod test_round_trip;
#[cfg(test)]
mod test_tamper;
#[cfg(test)]
mod test_window;

/// Partner the server holds a key for.
pub const PARTNER_ID: &str = "p";
/// Key id of the server's only key.
pub const KEY_ID: &str = "1";
/// The server's secret for `p` / `1`.
pub const SECRET: &[u8] = b"k1";
/// The server's fixed notion of now.
pub const NOW: i64 = 1_403_052_141;

/// Response header with the entity digest the `/twice` route saw first.
pub const ENTITY_DIGEST_HEADER: &str = "x-entity-digest";
/// Response header telling whether two context lookups saw the same digest.
pub const DIGEST_STABLE_HEADER: &str = "x-digest-stable";

static INIT: Once = Once::new();

/// Initialize tracing (once).
fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
            )
            .with_test_writer()
            .init();
    });
}

/// A PartnerAuth server running on a local ephemeral port.
#[derive(Debug)]
pub struct TestServer {
    addr: SocketAddr,
    clock: Arc<FixedClock>,
    task: JoinHandle<()>,
}

impl TestServer {
    /// Start a server holding `SECRET` for `PARTNER_ID` / `KEY_ID`.
    ///
    /// Routes:
    ///
    /// - `/twice` reads the body, looks the request context up twice, and
    ///   reports the entity digests it saw before verifying.
    /// - `/verify-first` verifies before reading the body.
    /// - Anything else reads the body, verifies, and echoes the body back.
    pub async fn start() -> Self {
        init_tracing();

        let clock = Arc::new(FixedClock::new(NOW));
        let keys = StaticKeyProvider::new([(
            (PARTNER_ID.to_owned(), KEY_ID.to_owned()),
            SECRET.to_vec(),
        )]);
        let components = AuthComponents::with_clock(
            Arc::new(keys),
            &PartnerAuthConfig::default(),
            clock.clone(),
        );
        let service =
            components.interceptor(handler(Arc::clone(&components.verifier), components.store));

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind test listener");
        let addr = listener.local_addr().expect("local address");
        debug!(%addr, "test server listening");

        let task = tokio::spawn(async move {
            let http = HttpConnBuilder::new(TokioExecutor::new());
            loop {
                let Ok((stream, _)) = listener.accept().await else {
                    continue;
                };
                let conn = http
                    .serve_connection(TokioIo::new(stream), service.clone())
                    .into_owned();
                tokio::spawn(async move {
                    let _ = conn.await;
                });
            }
        });

        Self { addr, clock, task }
    }

    /// The server's clock.
    #[must_use]
    pub fn clock(&self) -> &FixedClock {
        &self.clock
    }

    /// Send `req` to the server and collect the response.
    ///
    /// The request URI only needs a path and query; the server address is
    /// filled in.
    pub async fn send(&self, req: Request<Vec<u8>>) -> Response<Bytes> {
        let (parts, body) = req.into_parts();
        let path = parts.uri.path_and_query().map_or("/", |pq| pq.as_str());
        let url = format!("http://{}{path}", self.addr);

        let resp = reqwest::Client::new()
            .request(parts.method, url)
            .headers(parts.headers)
            .body(body)
            .send()
            .await
            .expect("send request");

        let status = resp.status();
        let headers = resp.headers().clone();
        let data = resp.bytes().await.expect("read response body");

        let mut response = Response::new(data);
        *response.status_mut() = status;
        *response.headers_mut() = headers;
        response
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// A client signing as `PARTNER_ID` / `KEY_ID` with `secret`, at time `now`,
/// and signing `Content-Type`.
#[must_use]
pub fn client(secret: &[u8], now: i64) -> RequestSigner {
    let keys = StaticKeyProvider::new([(
        (PARTNER_ID.to_owned(), KEY_ID.to_owned()),
        secret.to_vec(),
    )]);
    let signer = MessageSigner::with_clock(
        Arc::new(HmacStringSigner::new(Arc::new(keys))),
        Arc::new(FixedClock::new(now)),
    );
    RequestSigner::new(signer, PARTNER_ID, KEY_ID).with_signed_headers(["Content-Type"])
}

/// A `POST` to `uri` with a `text/plain` body.
#[must_use]
pub fn post(uri: &str, body: &[u8]) -> Request<Vec<u8>> {
    Request::post(uri)
        .header("content-type", "text/plain")
        .body(body.to_vec())
        .expect("valid request")
}

fn handler(
    verifier: Arc<AuthorizationVerifier>,
    store: RequestContextStore,
) -> impl AuthHandler<Incoming> {
    move |req: Request<RequestBody<Incoming>>| {
        let verifier = Arc::clone(&verifier);
        async move { route(req, &verifier, store).await }
    }
}

async fn route(
    req: Request<RequestBody<Incoming>>,
    verifier: &AuthorizationVerifier,
    store: RequestContextStore,
) -> Result<Response<ResponseBody>, BoxError> {
    let path = req.uri().path().to_owned();

    if path == "/verify-first" {
        let verified = verifier.get();
        let body = req.into_body().collect().await?.to_bytes();
        return Ok(match verified {
            Ok(_) => text(StatusCode::OK, body),
            Err(err) => text(err.status_code(), err.to_string()),
        });
    }

    let body = req.into_body().collect().await?.to_bytes();

    if path == "/twice" {
        let first = store.get()?.entity_digest()?;
        let second = store.get()?.entity_digest()?;
        let mut response = match verifier.get() {
            Ok(_) => text(StatusCode::OK, body),
            Err(err) => text(err.status_code(), err.to_string()),
        };
        let headers = response.headers_mut();
        headers.insert(
            ENTITY_DIGEST_HEADER,
            HeaderValue::from_str(first.as_deref().unwrap_or("none"))?,
        );
        headers.insert(
            DIGEST_STABLE_HEADER,
            HeaderValue::from_static(if first == second { "true" } else { "false" }),
        );
        return Ok(response);
    }

    Ok(match verifier.get() {
        Ok(auth) => {
            auth.assert_valid_for_partner(PARTNER_ID)?;
            text(StatusCode::OK, body)
        }
        Err(err) => text(err.status_code(), err.to_string()),
    })
}

fn text(status: StatusCode, body: impl Into<Bytes>) -> Response<ResponseBody> {
    let mut response = Response::new(full_body(body));
    *response.status_mut() = status;
    response.headers_mut().insert(
        http::header::CONTENT_TYPE,
        HeaderValue::from_static("text/plain"),
    );
    response
}
