//! Requests altered after signing are rejected.

use http::{HeaderValue, Request, StatusCode};
use tokio_test::assert_ok;

use crate::{NOW, SECRET, TestServer, client, post};

fn signed(uri: &str, body: &[u8]) -> Request<Vec<u8>> {
    let mut req = post(uri, body);
    assert_ok!(client(SECRET, NOW).sign(&mut req));
    req
}

async fn assert_rejected(server: &TestServer, req: Request<Vec<u8>>) {
    let response = server.send(req).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(&response.body()[..], b"Authorization failed: Invalid signature");
}

#[tokio::test]
async fn test_should_reject_tampered_body() {
    let server = TestServer::start().await;
    let mut req = signed("/x?y=1", b"hi");
    *req.body_mut() = b"ho".to_vec();
    assert_rejected(&server, req).await;
}

#[tokio::test]
async fn test_should_reject_tampered_path_and_query() {
    let server = TestServer::start().await;

    let mut req = signed("/x?y=1", b"hi");
    *req.uri_mut() = "/z?y=1".parse().unwrap();
    assert_rejected(&server, req).await;

    let mut req = signed("/x?y=1", b"hi");
    *req.uri_mut() = "/x?y=2".parse().unwrap();
    assert_rejected(&server, req).await;
}

#[tokio::test]
async fn test_should_reject_tampered_signed_header() {
    let server = TestServer::start().await;
    let mut req = signed("/x?y=1", b"hi");
    req.headers_mut()
        .insert("content-type", HeaderValue::from_static("text/html"));
    assert_rejected(&server, req).await;
}

#[tokio::test]
async fn test_should_ignore_unsigned_header_changes() {
    let server = TestServer::start().await;
    let mut req = signed("/x?y=1", b"hi");
    req.headers_mut()
        .insert("x-trace", HeaderValue::from_static("added later"));

    let response = server.send(req).await;

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_should_reject_missing_signed_header() {
    let server = TestServer::start().await;
    let mut req = signed("/x?y=1", b"hi");
    req.headers_mut().remove("content-type");

    let response = server.send(req).await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        &response.body()[..],
        b"Invalid authorization header: signed-headers specified Content-Type, but was not found"
    );
}
