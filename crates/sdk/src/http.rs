// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Authenticated HTTP transport for the SyftBox server API.
//!
//! One client per datasite: base-URL join, bearer auth, a process-wide
//! user agent, and a 3-attempt retry with exponential interval for
//! transient failures (connect errors, timeouts, 5xx).

use std::sync::OnceLock;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use url::Url;

const MAX_ATTEMPTS: u32 = 3;
const RETRY_BASE_DELAY: Duration = Duration::from_millis(500);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Process-wide user agent, e.g. `SyftBox/0.4.1 (linux; x86_64)`.
pub fn user_agent() -> &'static str {
    static USER_AGENT: OnceLock<String> = OnceLock::new();
    USER_AGENT.get_or_init(|| {
        format!(
            "SyftBox/{} ({}; {})",
            env!("CARGO_PKG_VERSION"),
            std::env::consts::OS,
            std::env::consts::ARCH
        )
    })
}

/// Errors from the server API transport.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("invalid server url {0:?}")]
    BadUrl(String),

    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("server returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("malformed response: {0}")]
    Decode(#[source] reqwest::Error),
}

impl ApiError {
    /// Status code of a non-2xx response, if that is what failed.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// HTTP client for one server + one identity.
#[derive(Debug)]
pub struct ApiClient {
    base: Url,
    http: reqwest::Client,
    auth_token: parking_lot::RwLock<Option<String>>,
}

impl ApiClient {
    pub fn new(base_url: &str) -> Result<Self, ApiError> {
        let base = Url::parse(base_url).map_err(|_| ApiError::BadUrl(base_url.to_string()))?;
        let http = reqwest::Client::builder()
            .user_agent(user_agent())
            .connect_timeout(CONNECT_TIMEOUT)
            .build()?;
        Ok(Self { base, http, auth_token: parking_lot::RwLock::new(None) })
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    /// The underlying reqwest client, for requests that go directly to
    /// the object store (presigned URLs carry their own auth).
    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }

    /// Install or clear the bearer token used on every API request.
    pub fn set_auth_token(&self, token: Option<String>) {
        *self.auth_token.write() = token;
    }

    pub fn auth_token(&self) -> Option<String> {
        self.auth_token.read().clone()
    }

    /// POST a JSON body, decode a JSON response.
    pub async fn post_json<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        let url = self.join(path)?;
        let response = self
            .execute(|| self.http.post(url.clone()).json(body))
            .await?;
        response.json().await.map_err(ApiError::Decode)
    }

    /// POST a JSON body, ignore the response body.
    pub async fn post_json_unit<B: Serialize>(&self, path: &str, body: &B) -> Result<(), ApiError> {
        let url = self.join(path)?;
        self.execute(|| self.http.post(url.clone()).json(body)).await?;
        Ok(())
    }

    /// PUT a streaming octet-stream body with an exact Content-Length.
    ///
    /// Streamed bodies cannot be replayed, so this path never retries.
    pub async fn put_octet_stream<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
        body: reqwest::Body,
        len: u64,
    ) -> Result<T, ApiError> {
        let url = self.join(path)?;
        let response = self
            .with_auth(self.http.put(url).query(query))
            .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
            .header(reqwest::header::CONTENT_LENGTH, len)
            .body(body)
            .send()
            .await?;
        let response = Self::check_status(response).await?;
        response.json().await.map_err(ApiError::Decode)
    }

    fn join(&self, path: &str) -> Result<Url, ApiError> {
        self.base
            .join(path)
            .map_err(|_| ApiError::BadUrl(format!("{}{}", self.base, path)))
    }

    fn with_auth(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.auth_token.read().as_deref() {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    /// Send with retries for transient failures. The builder closure is
    /// re-invoked per attempt so bodies are rebuilt, not replayed.
    async fn execute<F>(&self, build: F) -> Result<reqwest::Response, ApiError>
    where
        F: Fn() -> reqwest::RequestBuilder,
    {
        let mut delay = RETRY_BASE_DELAY;
        let mut last_err = ApiError::Status { status: 0, body: "no attempts made".to_string() };

        for attempt in 0..MAX_ATTEMPTS {
            if attempt > 0 {
                tokio::time::sleep(delay).await;
                delay *= 2;
            }
            match self.with_auth(build()).send().await {
                Ok(response) if response.status().is_server_error() => {
                    let status = response.status().as_u16();
                    let body = response.text().await.unwrap_or_default();
                    tracing::debug!(status, attempt, "server error, retrying");
                    last_err = ApiError::Status { status, body };
                }
                Ok(response) => return Self::check_status(response).await,
                Err(e) if e.is_connect() || e.is_timeout() => {
                    tracing::debug!(error = %e, attempt, "transient transport error, retrying");
                    last_err = e.into();
                }
                Err(e) => return Err(e.into()),
            }
        }
        Err(last_err)
    }

    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(ApiError::Status { status: status.as_u16(), body })
    }
}

#[cfg(test)]
#[path = "http_tests.rs"]
mod tests;
