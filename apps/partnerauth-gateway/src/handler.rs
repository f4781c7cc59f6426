//! The authenticated echo endpoint.
//!
//! `GET /health` answers without authentication. Every other request is read
//! in full, verified, and echoed back as JSON together with the caller's
//! partner and key. Authentication failures are answered here, not by the
//! interceptor, so that they are signed like any other response.

use std::sync::Arc;

use bytes::Bytes;
use http::{HeaderValue, Method, Request, Response, StatusCode};
use http_body::Body;
use http_body_util::BodyExt;
use partnerauth_server::{AuthorizationVerifier, BoxError, RequestBody, ResponseBody, full_body};
use serde::Serialize;
use tracing::{debug, info};
use uuid::Uuid;

/// Header carrying the id the gateway assigns to every request.
pub const REQUEST_ID_HEADER: &str = "X-Request-Id";

/// Version reported by the health endpoint.
const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct EchoResponse<'a> {
    request_id: &'a str,
    partner_id: &'a str,
    key_id: &'a str,
    method: &'a str,
    path: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    query: Option<&'a str>,
    body: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ErrorResponse<'a> {
    request_id: &'a str,
    error: String,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

/// Echoes authenticated requests back to the caller.
#[derive(Debug, Clone)]
pub struct EchoHandler {
    verifier: Arc<AuthorizationVerifier>,
}

impl EchoHandler {
    /// Create a handler verifying callers with `verifier`.
    #[must_use]
    pub fn new(verifier: Arc<AuthorizationVerifier>) -> Self {
        Self { verifier }
    }

    /// Handle one request.
    pub async fn handle<B>(&self, req: Request<RequestBody<B>>) -> Result<Response<ResponseBody>, BoxError>
    where
        B: Body<Data = Bytes> + Send,
        B::Error: Into<BoxError>,
    {
        if req.method() == Method::GET && req.uri().path() == "/health" {
            let health = HealthResponse {
                status: "ok",
                version: VERSION,
            };
            return json_response(StatusCode::OK, &health, None);
        }

        let request_id = Uuid::new_v4().to_string();
        let (parts, body) = req.into_parts();
        let data = body.collect().await.map_err(Into::<BoxError>::into)?.to_bytes();

        let auth = match self.verifier.get() {
            Ok(auth) => auth,
            Err(err) => {
                info!(%request_id, error = %err, "rejecting request");
                let reply = ErrorResponse {
                    request_id: &request_id,
                    error: err.to_string(),
                };
                return json_response(err.status_code(), &reply, Some(&request_id));
            }
        };

        let header = auth.authorization_header();
        debug!(%request_id, partner_id = auth.partner_id(), bytes = data.len(), "echoing request");
        let reply = EchoResponse {
            request_id: &request_id,
            partner_id: auth.partner_id(),
            key_id: header.key_id.as_deref().unwrap_or_default(),
            method: parts.method.as_str(),
            path: parts.uri.path(),
            query: parts.uri.query(),
            body: String::from_utf8_lossy(&data).into_owned(),
        };
        json_response(StatusCode::OK, &reply, Some(&request_id))
    }
}

fn json_response<T: Serialize>(
    status: StatusCode,
    value: &T,
    request_id: Option<&str>,
) -> Result<Response<ResponseBody>, BoxError> {
    let body = serde_json::to_vec(value)?;
    let mut builder = Response::builder()
        .status(status)
        .header(http::header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
    if let Some(id) = request_id {
        builder = builder.header(REQUEST_ID_HEADER, id);
    }
    Ok(builder.body(full_body(body))?)
}
