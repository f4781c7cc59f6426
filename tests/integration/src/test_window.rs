//! Timestamp validity window.

use http::StatusCode;
use tokio_test::assert_ok;

use crate::{NOW, SECRET, TestServer, client, post};

async fn status_when_signed_at(server: &TestServer, timestamp: i64) -> (StatusCode, String) {
    let mut req = post("/x", b"hi");
    assert_ok!(client(SECRET, timestamp).sign(&mut req));
    let response = server.send(req).await;
    (
        response.status(),
        String::from_utf8_lossy(response.body()).into_owned(),
    )
}

#[tokio::test]
async fn test_should_accept_signature_at_window_edge() {
    let server = TestServer::start().await;

    assert_eq!(status_when_signed_at(&server, NOW - 300).await.0, StatusCode::OK);
    assert_eq!(status_when_signed_at(&server, NOW + 300).await.0, StatusCode::OK);
}

#[tokio::test]
async fn test_should_reject_signature_outside_window() {
    let server = TestServer::start().await;

    for timestamp in [NOW - 301, NOW + 301] {
        let (status, body) = status_when_signed_at(&server, timestamp).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body, "Authorization failed: Signature expired");
    }
}

#[tokio::test]
async fn test_should_expire_signature_as_server_clock_moves() {
    let server = TestServer::start().await;
    let client = client(SECRET, NOW);

    let mut req = post("/x", b"hi");
    assert_ok!(client.sign(&mut req));
    let mut replay = post("/x", b"hi");
    *replay.headers_mut() = req.headers().clone();

    assert_eq!(server.send(req).await.status(), StatusCode::OK);

    server.clock().advance(301);
    assert_eq!(server.send(replay).await.status(), StatusCode::FORBIDDEN);
}
