// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::auth::token::make_token;
use crate::test_http::{CannedResponse, TestServer};
use sb_core::FakeClock;
use std::sync::atomic::{AtomicU32, Ordering};

const EMAIL: &str = "alice@example.com";
const FAR_EXP: u64 = 4_000_000_000;

/// Auth server that hands out `ref-<n>` rotations; from `empty_after`
/// rotations on it returns an empty refresh token.
fn rotating_server(
    counter: Arc<AtomicU32>,
    empty_after: u32,
) -> impl Fn(&crate::test_http::Recorded) -> CannedResponse + Send + Sync + 'static {
    move |request| {
        assert_eq!(request.path, "/auth/refresh");
        let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
        let refresh = if n > empty_after { String::new() } else { format!("ref-{n}") };
        CannedResponse::json(
            200,
            serde_json::json!({
                "accessToken": make_token(EMAIL, FAR_EXP, "access"),
                "refreshToken": refresh,
            }),
        )
    }
}

fn collector() -> (TokenUpdateFn, tokio::sync::mpsc::UnboundedReceiver<String>) {
    let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
    let callback: TokenUpdateFn = Arc::new(move |token: &str| {
        let _ = tx.send(token.to_string());
    });
    (callback, rx)
}

#[tokio::test]
async fn authenticate_reuses_a_valid_access_token() {
    let server = TestServer::spawn(|_| CannedResponse::empty(500)).await;
    let clock = FakeClock::new();
    clock.set_unix_ts(1_000_000);
    let access = make_token(EMAIL, FAR_EXP, "access");

    let auth = Authenticator::new(
        Arc::new(ApiClient::new(&server.url()).unwrap()),
        EMAIL,
        Some(access.clone()),
        Some("ref-0".to_string()),
        clock,
    );

    assert_eq!(auth.authenticate().await.unwrap(), access);
    assert!(server.requests().is_empty(), "no network call expected");
}

#[tokio::test]
async fn authenticate_refreshes_when_the_access_token_expired() {
    let counter = Arc::new(AtomicU32::new(0));
    let server = TestServer::spawn(rotating_server(Arc::clone(&counter), u32::MAX)).await;
    let clock = FakeClock::new();
    clock.set_unix_ts(2_000_000_000);
    let expired = make_token(EMAIL, 1_000, "access");
    let (callback, mut updates) = collector();

    let auth = Authenticator::new(
        Arc::new(ApiClient::new(&server.url()).unwrap()),
        EMAIL,
        Some(expired),
        Some("ref-0".to_string()),
        clock,
    )
    .with_token_update(callback);

    let access = auth.authenticate().await.unwrap();
    assert_eq!(access, make_token(EMAIL, FAR_EXP, "access"));
    assert_eq!(updates.recv().await.unwrap(), "ref-1");
    assert_eq!(auth.refresh_token().as_deref(), Some("ref-1"));
}

#[tokio::test]
async fn authenticate_without_any_token_fails() {
    let server = TestServer::spawn(|_| CannedResponse::empty(500)).await;
    let auth = Authenticator::new(
        Arc::new(ApiClient::new(&server.url()).unwrap()),
        EMAIL,
        None,
        None,
        FakeClock::new(),
    );
    assert!(matches!(auth.authenticate().await, Err(AuthError::NoRefreshToken)));
}

#[tokio::test]
async fn foreign_subject_is_rejected() {
    let server = TestServer::spawn(|_| {
        CannedResponse::json(
            200,
            serde_json::json!({
                "accessToken": make_token("mallory@example.com", FAR_EXP, "access"),
                "refreshToken": "ref-1",
            }),
        )
    })
    .await;
    let clock = FakeClock::new();
    clock.set_unix_ts(1_000_000);

    let auth = Authenticator::new(
        Arc::new(ApiClient::new(&server.url()).unwrap()),
        EMAIL,
        None,
        Some("ref-0".to_string()),
        clock,
    );
    let err = auth.authenticate().await.unwrap_err();
    assert!(matches!(err, AuthError::Token(ref m) if m.contains("subject")));
}

#[tokio::test]
async fn periodic_refresh_rotates_and_persists() {
    let counter = Arc::new(AtomicU32::new(0));
    let server = TestServer::spawn(rotating_server(Arc::clone(&counter), u32::MAX)).await;
    let clock = FakeClock::new();
    clock.set_unix_ts(1_000_000);
    let (callback, mut updates) = collector();

    let auth = Arc::new(
        Authenticator::new(
            Arc::new(ApiClient::new(&server.url()).unwrap()),
            EMAIL,
            None,
            Some("ref-0".to_string()),
            clock,
        )
        .with_token_update(callback)
        .with_refresh_interval(Duration::from_millis(100)),
    );

    // Initial authentication refreshes once.
    auth.authenticate().await.unwrap();
    assert_eq!(updates.recv().await.unwrap(), "ref-1");

    let cancel = CancellationToken::new();
    let runner = tokio::spawn(Arc::clone(&auth).run(cancel.clone()));

    // Two more ticks, two more rotations.
    assert_eq!(updates.recv().await.unwrap(), "ref-2");
    assert_eq!(updates.recv().await.unwrap(), "ref-3");
    assert_eq!(auth.refresh_token().as_deref(), Some("ref-3"));

    cancel.cancel();
    runner.await.unwrap();
}

#[tokio::test]
async fn empty_rotation_reaches_the_callback_but_not_the_state() {
    let counter = Arc::new(AtomicU32::new(0));
    // First rotation returns ref-1, everything after is empty.
    let server = TestServer::spawn(rotating_server(Arc::clone(&counter), 1)).await;
    let clock = FakeClock::new();
    clock.set_unix_ts(1_000_000);
    let (callback, mut updates) = collector();

    let auth = Authenticator::new(
        Arc::new(ApiClient::new(&server.url()).unwrap()),
        EMAIL,
        None,
        Some("ref-0".to_string()),
        clock,
    )
    .with_token_update(callback);

    auth.refresh_now().await.unwrap();
    assert_eq!(updates.recv().await.unwrap(), "ref-1");

    auth.refresh_now().await.unwrap();
    // The callback observes the empty rotation verbatim.
    assert_eq!(updates.recv().await.unwrap(), "");
    // The in-memory refresh token is untouched.
    assert_eq!(auth.refresh_token().as_deref(), Some("ref-1"));
}
