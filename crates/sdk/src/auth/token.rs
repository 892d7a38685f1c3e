// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Unverified JWT claim extraction.
//!
//! Tokens are opaque to the client except for `{sub, exp, type}`.
//! Signature verification is the server's job; the client only refuses
//! tokens of the wrong type, expired tokens, and garbage.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::Deserialize;

use super::AuthError;

/// Which half of the token pair a claim set belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Access,
    Refresh,
}

/// The claims the client reads.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Claims {
    /// Subject: the account email.
    pub sub: String,
    /// Expiry, seconds since the epoch.
    pub exp: u64,
    #[serde(rename = "type")]
    pub token_type: TokenType,
}

/// Decode the payload segment of a JWT and enforce type and expiry.
/// `now` is the current unix timestamp.
pub fn parse_claims(token: &str, expected: TokenType, now: u64) -> Result<Claims, AuthError> {
    let payload = token
        .split('.')
        .nth(1)
        .ok_or_else(|| AuthError::Token("not a jwt".to_string()))?;
    let bytes = URL_SAFE_NO_PAD
        .decode(payload)
        .map_err(|e| AuthError::Token(format!("payload not base64: {e}")))?;
    let claims: Claims = serde_json::from_slice(&bytes)
        .map_err(|e| AuthError::Token(format!("payload not claims json: {e}")))?;

    if claims.token_type != expected {
        return Err(AuthError::Token(format!(
            "wrong token type: {:?}, expected {:?}",
            claims.token_type, expected
        )));
    }
    if claims.exp <= now {
        return Err(AuthError::Token("token expired".to_string()));
    }
    Ok(claims)
}

#[cfg(test)]
pub(crate) fn make_token(sub: &str, exp: u64, token_type: &str) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(
        serde_json::json!({"sub": sub, "exp": exp, "type": token_type}).to_string(),
    );
    format!("{header}.{payload}.unsigned")
}
