//! GoTrue-compatible identity provider client.
//!
//! # Responsibilities
//! - Validate access tokens (`GET /auth/v1/user`)
//! - Refresh and issue sessions (`POST /auth/v1/token`)
//! - Register accounts (`POST /auth/v1/signup`)
//! - Revoke sessions (`POST /auth/v1/logout`)
//! - Classify failures into rejected, provider and transient errors

use std::time::Duration;

use serde::Deserialize;
use serde_json::json;
use url::Url;

use crate::auth::backend::AuthBackend;
use crate::auth::error::{AuthError, AuthResult};
use crate::auth::types::{Session, SignUp, User};
use crate::config::GateConfig;

/// HTTP client for the identity provider.
#[derive(Debug, Clone)]
pub struct GoTrueBackend {
    client: reqwest::Client,
    base: Url,
    anon_key: String,
}

impl GoTrueBackend {
    /// Create a client for the project at `base_url`.
    pub fn new(base_url: &str, anon_key: impl Into<String>, timeout: Duration) -> AuthResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AuthError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            base: base_url_with_slash(base_url)?,
            anon_key: anon_key.into(),
        })
    }

    pub fn from_config(config: &GateConfig) -> AuthResult<Self> {
        Self::new(
            &config.identity.url,
            config.identity.anon_key.clone(),
            Duration::from_secs(config.timeouts.provider_secs),
        )
    }

    fn endpoint(&self, path: &str) -> AuthResult<Url> {
        self.base
            .join(path)
            .map_err(|e| AuthError::Malformed(format!("invalid endpoint '{path}': {e}")))
    }

    async fn token_grant(&self, grant_type: &str, body: serde_json::Value) -> AuthResult<Session> {
        let mut url = self.endpoint("auth/v1/token")?;
        url.query_pairs_mut().append_pair("grant_type", grant_type);

        let response = self
            .client
            .post(url)
            .header("apikey", &self.anon_key)
            .json(&body)
            .send()
            .await?;
        let session: Session = error_for_status(response).await?.json().await?;
        Ok(session.with_absolute_expiry())
    }
}

/// A sign-up answers with a full session when the project auto-confirms
/// accounts, and with the bare user (or `{ "user": .. }`) otherwise.
fn parse_sign_up(body: serde_json::Value) -> AuthResult<SignUp> {
    if body.get("access_token").is_some() {
        let session = serde_json::from_value::<Session>(body)?.with_absolute_expiry();
        let user = session
            .user
            .clone()
            .ok_or_else(|| AuthError::Malformed("sign-up session without user".to_string()))?;
        return Ok(SignUp {
            user,
            session: Some(session),
        });
    }

    let user = match body.get("user") {
        Some(user) => serde_json::from_value::<User>(user.clone())?,
        None => serde_json::from_value::<User>(body)?,
    };
    Ok(SignUp {
        user,
        session: None,
    })
}

/// Join paths relative to the project root even when the base URL has a
/// path of its own.
pub(crate) fn base_url_with_slash(base_url: &str) -> AuthResult<Url> {
    let mut base = Url::parse(base_url)
        .map_err(|e| AuthError::Malformed(format!("invalid base url '{base_url}': {e}")))?;
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }
    Ok(base)
}

#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    msg: Option<String>,
    message: Option<String>,
    error_description: Option<String>,
    error: Option<String>,
}

fn error_message(body: &str) -> String {
    serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|b| b.msg.or(b.message).or(b.error_description).or(b.error))
        .unwrap_or_else(|| body.trim().to_string())
}

/// Map a non-success response to an [`AuthError`].
pub(crate) async fn error_for_status(response: reqwest::Response) -> AuthResult<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = error_message(&body);
    let status = status.as_u16();
    Err(match status {
        // 422: validation failures such as an existing account or a weak password.
        400 | 401 | 403 | 422 => AuthError::Rejected { status, message },
        _ => AuthError::Provider { status, message },
    })
}

impl AuthBackend for GoTrueBackend {
    async fn fetch_user(&self, access_token: &str) -> AuthResult<User> {
        let response = self
            .client
            .get(self.endpoint("auth/v1/user")?)
            .header("apikey", &self.anon_key)
            .bearer_auth(access_token)
            .send()
            .await?;
        Ok(error_for_status(response).await?.json().await?)
    }

    async fn refresh_session(&self, refresh_token: &str) -> AuthResult<Session> {
        self.token_grant("refresh_token", json!({ "refresh_token": refresh_token }))
            .await
    }

    async fn sign_in_with_password(&self, email: &str, password: &str) -> AuthResult<Session> {
        self.token_grant("password", json!({ "email": email, "password": password }))
            .await
    }

    async fn sign_up(&self, email: &str, password: &str, nickname: &str) -> AuthResult<SignUp> {
        let response = self
            .client
            .post(self.endpoint("auth/v1/signup")?)
            .header("apikey", &self.anon_key)
            .json(&json!({
                "email": email,
                "password": password,
                "data": { "nickname": nickname },
            }))
            .send()
            .await?;
        parse_sign_up(error_for_status(response).await?.json().await?)
    }

    async fn sign_out(&self, access_token: &str) -> AuthResult<()> {
        let response = self
            .client
            .post(self.endpoint("auth/v1/logout")?)
            .header("apikey", &self.anon_key)
            .bearer_auth(access_token)
            .send()
            .await?;
        error_for_status(response).await?;
        Ok(())
    }
}
