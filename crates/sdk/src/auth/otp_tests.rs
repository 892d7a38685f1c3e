// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::test_http::{CannedResponse, TestServer};
use yare::parameterized;

#[parameterized(
    valid = { "A1B2C3D4", true },
    all_digits = { "12345678", true },
    all_letters = { "ABCDEFGH", true },
    too_short = { "ABC123", false },
    too_long = { "ABC123456", false },
    lowercase = { "a1b2c3d4", false },
    symbol = { "A1B2C3D!", false },
    empty = { "", false },
)]
fn otp_validation(code: &str, valid: bool) {
    assert_eq!(is_valid_otp(code), valid, "{code:?}");
}

#[tokio::test]
async fn request_otp_posts_the_email() {
    let server = TestServer::spawn(|_| CannedResponse::empty(200)).await;
    let auth = AuthClient::new(Arc::new(ApiClient::new(&server.url()).unwrap()));

    auth.request_otp("alice@example.com").await.unwrap();

    let requests = server.requests();
    assert_eq!(requests[0].path, "/auth/otp/request");
    assert_eq!(requests[0].json()["email"], "alice@example.com");
}

#[tokio::test]
async fn request_otp_rejects_bad_email_without_a_request() {
    let server = TestServer::spawn(|_| CannedResponse::empty(200)).await;
    let auth = AuthClient::new(Arc::new(ApiClient::new(&server.url()).unwrap()));

    let err = auth.request_otp("nope").await.unwrap_err();
    assert!(matches!(err, AuthError::InvalidEmail(_)));
    assert!(server.requests().is_empty());
}

#[tokio::test]
async fn verify_otp_returns_the_token_pair() {
    let server = TestServer::spawn(|request| {
        assert_eq!(request.json()["code"], "A1B2C3D4");
        CannedResponse::json(
            200,
            serde_json::json!({"accessToken": "acc-1", "refreshToken": "ref-1"}),
        )
    })
    .await;
    let auth = AuthClient::new(Arc::new(ApiClient::new(&server.url()).unwrap()));

    let pair = auth.verify_otp("alice@example.com", "A1B2C3D4").await.unwrap();
    assert_eq!(pair.access_token, "acc-1");
    assert_eq!(pair.refresh_token, "ref-1");
}

#[tokio::test]
async fn verify_otp_rejects_malformed_codes_locally() {
    let server = TestServer::spawn(|_| CannedResponse::empty(200)).await;
    let auth = AuthClient::new(Arc::new(ApiClient::new(&server.url()).unwrap()));

    let err = auth.verify_otp("alice@example.com", "bad").await.unwrap_err();
    assert!(matches!(err, AuthError::InvalidOtp));
    assert!(server.requests().is_empty());
}

#[tokio::test]
async fn refresh_posts_the_token_and_tolerates_missing_rotation() {
    let server = TestServer::spawn(|request| {
        assert_eq!(request.path, "/auth/refresh");
        assert_eq!(request.json()["refreshToken"], "ref-0");
        // No refreshToken in the response at all.
        CannedResponse::json(200, serde_json::json!({"accessToken": "acc-2"}))
    })
    .await;
    let auth = AuthClient::new(Arc::new(ApiClient::new(&server.url()).unwrap()));

    let pair = auth.refresh("ref-0").await.unwrap();
    assert_eq!(pair.access_token, "acc-2");
    assert_eq!(pair.refresh_token, "");
}

#[tokio::test]
async fn refresh_without_a_token_fails_fast() {
    let server = TestServer::spawn(|_| CannedResponse::empty(200)).await;
    let auth = AuthClient::new(Arc::new(ApiClient::new(&server.url()).unwrap()));

    assert!(matches!(auth.refresh("").await, Err(AuthError::NoRefreshToken)));
    assert!(server.requests().is_empty());
}
