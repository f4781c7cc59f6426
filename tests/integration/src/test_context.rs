//! Request context and body digest behavior.

use http::StatusCode;
use partnerauth_core::canonical::entity_digest;
use tokio_test::assert_ok;

use crate::{DIGEST_STABLE_HEADER, ENTITY_DIGEST_HEADER, NOW, SECRET, TestServer, client, post};

#[tokio::test]
async fn test_should_cache_entity_digest_across_lookups() {
    let server = TestServer::start().await;
    let client = client(SECRET, NOW);

    let mut req = post("/twice", b"hi");
    assert_ok!(client.sign(&mut req));
    let response = server.send(req).await;

    assert_eq!(response.status(), StatusCode::OK);
    let expected = entity_digest(b"hi").unwrap();
    assert_eq!(response.headers()[ENTITY_DIGEST_HEADER], expected.as_str());
    assert_eq!(response.headers()[DIGEST_STABLE_HEADER], "true");
    assert_ok!(client.verify(&response));
}

#[tokio::test]
async fn test_should_report_no_digest_for_empty_body() {
    let server = TestServer::start().await;

    let mut req = post("/twice", b"");
    assert_ok!(client(SECRET, NOW).sign(&mut req));
    let response = server.send(req).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[ENTITY_DIGEST_HEADER], "none");
    assert_eq!(response.headers()[DIGEST_STABLE_HEADER], "true");
}

#[tokio::test]
async fn test_should_not_cover_body_read_after_verification() {
    let server = TestServer::start().await;

    let mut req = post("/verify-first", b"hi");
    assert_ok!(client(SECRET, NOW).sign(&mut req));
    let response = server.send(req).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let mut req = post("/verify-first", b"");
    assert_ok!(client(SECRET, NOW).sign(&mut req));
    let response = server.send(req).await;
    assert_eq!(response.status(), StatusCode::OK);
}
