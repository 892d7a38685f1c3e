// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Auth lifecycle: OTP login, unverified token claims, and the
//! background refresh loop.

mod otp;
mod refresher;
mod token;

pub use otp::{is_valid_otp, AuthClient, TokenPair, OTP_REQUEST_PATH, OTP_VERIFY_PATH, REFRESH_PATH};
pub use refresher::{Authenticator, TokenUpdateFn, REFRESH_INTERVAL};
pub use token::{parse_claims, Claims, TokenType};

/// Auth errors.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("invalid email {0:?}")]
    InvalidEmail(String),

    #[error("invalid otp code")]
    InvalidOtp,

    #[error("no refresh token available")]
    NoRefreshToken,

    #[error("token rejected: {0}")]
    Token(String),

    #[error(transparent)]
    Api(#[from] crate::ApiError),
}
