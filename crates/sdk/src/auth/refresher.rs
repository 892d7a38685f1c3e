// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Background token refresh with a persistence callback.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use sb_core::Clock;

use super::{parse_claims, AuthClient, AuthError, TokenType};
use crate::ApiClient;

/// Tokens are refreshed this often once authenticated.
pub const REFRESH_INTERVAL: Duration = Duration::from_secs(12 * 60 * 60);

/// Invoked with the rotated refresh token after every successful
/// refresh — verbatim, including an empty rotation. Persisting (or
/// ignoring) it is the callback's business.
pub type TokenUpdateFn = Arc<dyn Fn(&str) + Send + Sync>;

struct TokenState {
    access: Option<String>,
    refresh: Option<String>,
}

/// Owns the token pair for one identity and keeps it fresh.
pub struct Authenticator<C: Clock> {
    auth: AuthClient,
    email: String,
    clock: C,
    refresh_interval: Duration,
    state: parking_lot::Mutex<TokenState>,
    on_update: Option<TokenUpdateFn>,
}

impl<C: Clock> Authenticator<C> {
    pub fn new(
        api: Arc<ApiClient>,
        email: impl Into<String>,
        access_token: Option<String>,
        refresh_token: Option<String>,
        clock: C,
    ) -> Self {
        Self {
            auth: AuthClient::new(api),
            email: email.into(),
            clock,
            refresh_interval: REFRESH_INTERVAL,
            state: parking_lot::Mutex::new(TokenState {
                access: access_token,
                refresh: refresh_token,
            }),
            on_update: None,
        }
    }

    /// Register the persistence callback.
    pub fn with_token_update(mut self, callback: TokenUpdateFn) -> Self {
        self.on_update = Some(callback);
        self
    }

    /// Override the refresh cadence (tests, mostly).
    pub fn with_refresh_interval(mut self, interval: Duration) -> Self {
        self.refresh_interval = interval;
        self
    }

    pub fn access_token(&self) -> Option<String> {
        self.state.lock().access.clone()
    }

    pub fn refresh_token(&self) -> Option<String> {
        self.state.lock().refresh.clone()
    }

    /// Produce a usable access token: the stored one when it is still
    /// valid and belongs to this identity, a fresh one otherwise.
    pub async fn authenticate(&self) -> Result<String, AuthError> {
        let now = self.clock.unix_ts();
        if let Some(access) = self.access_token() {
            if let Ok(claims) = parse_claims(&access, TokenType::Access, now) {
                if claims.sub == self.email {
                    return Ok(access);
                }
                tracing::warn!("stored access token belongs to a different subject");
            }
        }
        self.refresh_now().await
    }

    /// Rotate through `/auth/refresh` and notify the callback.
    pub async fn refresh_now(&self) -> Result<String, AuthError> {
        let refresh = self.refresh_token().ok_or(AuthError::NoRefreshToken)?;
        let pair = self.auth.refresh(&refresh).await?;

        let claims = parse_claims(&pair.access_token, TokenType::Access, self.clock.unix_ts())?;
        if claims.sub != self.email {
            return Err(AuthError::Token(format!(
                "token subject {:?} does not match configured email",
                claims.sub
            )));
        }

        {
            let mut state = self.state.lock();
            state.access = Some(pair.access_token.clone());
            // An empty rotation never clobbers a usable refresh token.
            if !pair.refresh_token.is_empty() {
                state.refresh = Some(pair.refresh_token.clone());
            }
        }
        if let Some(callback) = &self.on_update {
            callback(&pair.refresh_token);
        }
        tracing::info!("auth tokens refreshed");
        Ok(pair.access_token)
    }

    /// Periodic refresh until cancelled. Failures are logged and
    /// retried on the next tick.
    pub async fn run(self: Arc<Self>, cancel: CancellationToken) {
        let first = tokio::time::Instant::now() + self.refresh_interval;
        let mut ticker = tokio::time::interval_at(first, self.refresh_interval);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    if let Err(e) = self.refresh_now().await {
                        tracing::warn!(error = %e, "periodic token refresh failed");
                    }
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "refresher_tests.rs"]
mod tests;
