// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use std::path::Path;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};

const EMAIL: &str = "alice@example.com";

fn make_access_token(sub: &str) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD
        .encode(serde_json::json!({"sub": sub, "exp": 4_000_000_000u64, "type": "access"}).to_string());
    format!("{header}.{payload}.unsigned")
}

/// Tiny auth-only server: answers `/auth/refresh` with fresh tokens and
/// everything else with 404 (the events channel just keeps retrying).
async fn auth_server() -> std::net::SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        loop {
            let Ok((stream, _)) = listener.accept().await else {
                break;
            };
            tokio::spawn(async move {
                let (read_half, mut write_half) = stream.into_split();
                let mut reader = BufReader::new(read_half);
                loop {
                    let mut request_line = String::new();
                    if reader.read_line(&mut request_line).await.unwrap_or(0) == 0 {
                        return;
                    }
                    let path = request_line.split_whitespace().nth(1).unwrap_or("").to_string();
                    let mut content_length = 0usize;
                    loop {
                        let mut line = String::new();
                        if reader.read_line(&mut line).await.is_err() {
                            return;
                        }
                        if line.trim_end().is_empty() {
                            break;
                        }
                        if let Some(v) = line.to_ascii_lowercase().strip_prefix("content-length:") {
                            content_length = v.trim().parse().unwrap_or(0);
                        }
                    }
                    let mut body = vec![0u8; content_length];
                    let _ = reader.read_exact(&mut body).await;

                    let (status, payload) = if path == "/auth/refresh" {
                        let tokens = serde_json::json!({
                            "accessToken": make_access_token(EMAIL),
                            "refreshToken": "ref-rotated",
                        });
                        ("200 OK", tokens.to_string())
                    } else {
                        ("404 Not Found", String::new())
                    };
                    let response = format!(
                        "HTTP/1.1 {status}\r\ncontent-length: {}\r\n\r\n{payload}",
                        payload.len()
                    );
                    if write_half.write_all(response.as_bytes()).await.is_err() {
                        return;
                    }
                }
            });
        }
    });
    addr
}

fn test_config(dir: &Path, server: &str) -> Config {
    let path = dir.join("config.json");
    std::fs::write(
        &path,
        serde_json::json!({
            "data_dir": dir.join("SyftBox"),
            "email": EMAIL,
            "server_url": server,
            "refresh_token": "ref-0",
        })
        .to_string(),
    )
    .unwrap();
    Config::load(&path, Default::default()).unwrap()
}

#[tokio::test]
async fn datasite_starts_authenticates_and_stops() {
    let tmp = tempfile::tempdir().unwrap();
    let addr = auth_server().await;
    let config = test_config(tmp.path(), &format!("http://{addr}"));

    let datasite = Datasite::start(config).await.unwrap();

    // Authentication installed the bearer token on the API client.
    assert!(datasite.api().auth_token().is_some());

    // The rotated refresh token was persisted, access token was not.
    let raw = std::fs::read_to_string(tmp.path().join("config.json")).unwrap();
    let persisted: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(persisted["refresh_token"], "ref-rotated");
    assert!(persisted.get("access_token").is_none());

    // Workspace directories exist; the scheduler is up with no apps.
    assert!(datasite.workspace().apps_dir.is_dir());
    assert!(datasite.scheduler().unwrap().get_apps().is_empty());

    datasite.stop().await;
}

#[tokio::test]
async fn apps_disabled_skips_the_scheduler() {
    let tmp = tempfile::tempdir().unwrap();
    let addr = auth_server().await;
    let mut config = test_config(tmp.path(), &format!("http://{addr}"));
    config.apps_enabled = false;

    let datasite = Datasite::start(config).await.unwrap();
    assert!(datasite.scheduler().is_none());
    datasite.stop().await;
}

#[tokio::test]
async fn bad_refresh_token_fails_startup() {
    let tmp = tempfile::tempdir().unwrap();
    // No server listening: refresh cannot succeed.
    let mut config = test_config(tmp.path(), "http://127.0.0.1:1");
    config.refresh_token = None;

    let err = Datasite::start(config).await.unwrap_err();
    assert!(matches!(err, DaemonError::Auth(AuthError::NoRefreshToken)));
}
