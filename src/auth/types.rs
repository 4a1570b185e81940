//! Session and user types.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// The current user as reported by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Stable user identifier.
    pub id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

/// An access/refresh token pair as stored in the session cookie.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,

    #[serde(default)]
    pub refresh_token: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,

    /// Lifetime of the access token in seconds, as issued.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<i64>,

    /// Expiry of the access token (unix seconds).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<User>,
}

impl Session {
    /// Build a session from a bare token pair, reading expiry from the JWT.
    pub fn from_tokens(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        let access_token = access_token.into();
        let expires_at = jwt_claims(&access_token).and_then(|c| c.exp);
        Self {
            access_token,
            refresh_token: refresh_token.into(),
            token_type: Some("bearer".to_string()),
            expires_in: None,
            expires_at,
            user: None,
        }
    }

    /// Expiry of the access token, from the stored field or the JWT `exp`.
    pub fn expiry(&self) -> Option<i64> {
        self.expires_at
            .or_else(|| jwt_claims(&self.access_token).and_then(|c| c.exp))
    }

    /// True when the access token expires within `margin_secs` of `now`.
    /// A session without any known expiry is never considered expired.
    pub fn is_expired_at(&self, now: i64, margin_secs: i64) -> bool {
        match self.expiry() {
            Some(exp) => exp <= now + margin_secs,
            None => false,
        }
    }

    pub fn is_expired(&self, margin_secs: i64) -> bool {
        self.is_expired_at(unix_now(), margin_secs)
    }

    /// Fill in `expires_at` from `expires_in` when the provider only sent
    /// the relative lifetime.
    pub fn with_absolute_expiry(mut self) -> Self {
        if self.expires_at.is_none() {
            self.expires_at = self
                .expires_in
                .map(|secs| unix_now() + secs)
                .or_else(|| jwt_claims(&self.access_token).and_then(|c| c.exp));
        }
        self
    }
}

/// Outcome of a sign-up. Projects that confirm email addresses issue no
/// session until the address is confirmed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignUp {
    pub user: User,
    pub session: Option<Session>,
}

/// The subset of access-token claims the gate reads. Signatures are the
/// provider's concern; these are only used for expiry bookkeeping.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenClaims {
    #[serde(default)]
    pub sub: Option<String>,
    #[serde(default)]
    pub exp: Option<i64>,
    #[serde(default)]
    pub email: Option<String>,
}

/// Decode the payload segment of a JWT without verifying it.
pub fn jwt_claims(token: &str) -> Option<TokenClaims> {
    let payload = token.split('.').nth(1)?;
    let bytes = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .ok()?;
    serde_json::from_slice(&bytes).ok()
}

pub(crate) fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or_default()
}

#[cfg(test)]
pub(crate) fn test_jwt(sub: &str, exp: i64) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(
        serde_json::json!({ "sub": sub, "exp": exp, "email": format!("{sub}@example.com") })
            .to_string(),
    );
    format!("{header}.{payload}.signature")
}
