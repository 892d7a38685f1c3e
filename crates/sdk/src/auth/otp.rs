// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! OTP request/verify and token refresh calls.

use std::sync::Arc;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use super::AuthError;
use crate::ApiClient;

pub const OTP_REQUEST_PATH: &str = "/auth/otp/request";
pub const OTP_VERIFY_PATH: &str = "/auth/otp/verify";
pub const REFRESH_PATH: &str = "/auth/refresh";

/// An OTP is exactly 8 uppercase alphanumerics.
pub fn is_valid_otp(code: &str) -> bool {
    static OTP_RE: OnceLock<Regex> = OnceLock::new();
    let re = OTP_RE.get_or_init(|| {
        #[allow(clippy::unwrap_used)] // literal pattern
        Regex::new(r"^[0-9A-Z]{8}$").unwrap()
    });
    re.is_match(code)
}

/// Access + refresh token pair as returned by the auth endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: String,
}

#[derive(Serialize)]
struct OtpRequest<'a> {
    email: &'a str,
}

#[derive(Serialize)]
struct OtpVerify<'a> {
    email: &'a str,
    code: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RefreshRequest<'a> {
    refresh_token: &'a str,
}

/// Typed calls against the auth endpoints.
#[derive(Clone)]
pub struct AuthClient {
    api: Arc<ApiClient>,
}

impl AuthClient {
    pub fn new(api: Arc<ApiClient>) -> Self {
        Self { api }
    }

    /// `POST /auth/otp/request` — ask the server to email a code.
    pub async fn request_otp(&self, email: &str) -> Result<(), AuthError> {
        if !sb_core::is_valid_email(email) {
            return Err(AuthError::InvalidEmail(email.to_string()));
        }
        self.api.post_json_unit(OTP_REQUEST_PATH, &OtpRequest { email }).await?;
        Ok(())
    }

    /// `POST /auth/otp/verify` — exchange the code for tokens.
    pub async fn verify_otp(&self, email: &str, code: &str) -> Result<TokenPair, AuthError> {
        if !sb_core::is_valid_email(email) {
            return Err(AuthError::InvalidEmail(email.to_string()));
        }
        if !is_valid_otp(code) {
            return Err(AuthError::InvalidOtp);
        }
        Ok(self.api.post_json(OTP_VERIFY_PATH, &OtpVerify { email, code }).await?)
    }

    /// `POST /auth/refresh` — rotate the refresh token.
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, AuthError> {
        if refresh_token.is_empty() {
            return Err(AuthError::NoRefreshToken);
        }
        Ok(self.api.post_json(REFRESH_PATH, &RefreshRequest { refresh_token }).await?)
    }
}

#[cfg(test)]
#[path = "otp_tests.rs"]
mod tests;
