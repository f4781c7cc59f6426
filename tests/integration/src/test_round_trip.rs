//! Signed request and response round trips.

use http::{HeaderValue, Request, StatusCode};
use partnerauth_core::{AuthError, REQUEST_HEADER, RESPONSE_HEADER};
use tokio_test::{assert_err, assert_ok};

use crate::{KEY_ID, NOW, PARTNER_ID, SECRET, TestServer, client, post};

#[tokio::test]
async fn test_should_round_trip_signed_post() {
    let server = TestServer::start().await;
    let client = client(SECRET, NOW);

    let mut req = post("/x?y=1", b"hi");
    let sent = assert_ok!(client.sign(&mut req));
    assert_eq!(sent.signed_headers, vec!["Content-Type"]);

    let response = server.send(req).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(&response.body()[..], b"hi");
    let header = assert_ok!(client.verify(&response));
    assert_eq!(header.partner_id.as_deref(), Some(PARTNER_ID));
    assert_eq!(header.key_id.as_deref(), Some(KEY_ID));
    assert_eq!(header.signed_headers, vec!["Content-Type"]);
    assert_eq!(header.timestamp, Some(NOW));
}

#[tokio::test]
async fn test_should_reject_request_signed_with_other_key() {
    let server = TestServer::start().await;
    let mallory = client(b"k2", NOW);

    let mut req = post("/x?y=1", b"hi");
    assert_ok!(mallory.sign(&mut req));

    let response = server.send(req).await;

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(&response.body()[..], b"Authorization failed: Invalid signature");

    // The server answers under its own key for the claimed partner.
    assert!(response.headers().contains_key(RESPONSE_HEADER));
    assert_ok!(client(SECRET, NOW).verify(&response));
    let err = assert_err!(mallory.verify(&response));
    assert!(matches!(err, AuthError::AuthorizationFailed(_)));
}

#[tokio::test]
async fn test_should_round_trip_empty_body() {
    let server = TestServer::start().await;
    let client = client(SECRET, NOW);

    let mut req = Request::get("/status").body(Vec::new()).unwrap();
    let sent = assert_ok!(client.sign(&mut req));
    assert!(sent.signed_headers.is_empty());

    let response = server.send(req).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.body().is_empty());
    assert_ok!(client.verify(&response));
}

#[tokio::test]
async fn test_should_pass_through_request_without_authorization() {
    let server = TestServer::start().await;

    let req = post("/x", b"hi");
    assert!(!req.headers().contains_key(REQUEST_HEADER));
    let response = server.send(req).await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        &response.body()[..],
        b"Invalid authorization header: No Authorization header provided"
    );
    assert!(!response.headers().contains_key(RESPONSE_HEADER));

    let err = assert_err!(client(SECRET, NOW).verify(&response));
    assert!(matches!(err, AuthError::InvalidHeader(ref msg) if msg.contains("with 0 X-SignedResponse headers")));
}

#[tokio::test]
async fn test_should_leave_response_unsigned_for_unusable_header() {
    let server = TestServer::start().await;

    let mut req = post("/x", b"hi");
    req.headers_mut()
        .insert(REQUEST_HEADER, HeaderValue::from_static("garbage"));
    let response = server.send(req).await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(!response.headers().contains_key(RESPONSE_HEADER));
}
