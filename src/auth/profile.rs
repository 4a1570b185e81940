//! Unlock flag lookups.

use std::future::Future;
use std::time::Duration;

use serde_json::{Map, Value};
use url::Url;

use crate::auth::error::{AuthError, AuthResult};
use crate::auth::gotrue::{base_url_with_slash, error_for_status};
use crate::config::GateConfig;

/// Point lookups of the per-user unlock flag.
pub trait ProfileStore: Send + Sync + 'static {
    /// Whether `user_id` has unlocked the deeper content. A user without a
    /// profile row is not unlocked.
    ///
    /// The lookup runs as the user, authorized by `access_token`, so row
    /// level security on the table applies.
    fn is_unlocked(
        &self,
        user_id: &str,
        access_token: &str,
    ) -> impl Future<Output = AuthResult<bool>> + Send;
}

/// Profile store backed by a PostgREST table.
#[derive(Debug, Clone)]
pub struct RestProfileStore {
    client: reqwest::Client,
    base: Url,
    api_key: String,
    table: String,
    column: String,
}

impl RestProfileStore {
    pub fn new(
        base_url: &str,
        api_key: impl Into<String>,
        table: impl Into<String>,
        column: impl Into<String>,
        timeout: Duration,
    ) -> AuthResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AuthError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            base: base_url_with_slash(base_url)?,
            api_key: api_key.into(),
            table: table.into(),
            column: column.into(),
        })
    }

    pub fn from_config(config: &GateConfig) -> AuthResult<Self> {
        Self::new(
            &config.identity.url,
            config.profile_api_key().to_string(),
            config.profiles.table.clone(),
            config.profiles.unlock_column.clone(),
            Duration::from_secs(config.timeouts.provider_secs),
        )
    }

    fn lookup_url(&self, user_id: &str) -> AuthResult<Url> {
        let mut url = self
            .base
            .join(&format!("rest/v1/{}", self.table))
            .map_err(|e| AuthError::Malformed(e.to_string()))?;
        url.query_pairs_mut()
            .append_pair("select", &self.column)
            .append_pair("id", &format!("eq.{user_id}"));
        Ok(url)
    }
}

/// Read the flag from the first returned row.
fn unlock_flag(rows: &[Map<String, Value>], column: &str) -> bool {
    rows.first()
        .and_then(|row| row.get(column))
        .and_then(Value::as_bool)
        .unwrap_or(false)
}

impl ProfileStore for RestProfileStore {
    async fn is_unlocked(&self, user_id: &str, access_token: &str) -> AuthResult<bool> {
        let response = self
            .client
            .get(self.lookup_url(user_id)?)
            .header("apikey", &self.api_key)
            .bearer_auth(access_token)
            .header("Accept", "application/json")
            .send()
            .await?;
        let rows: Vec<Map<String, Value>> = error_for_status(response).await?.json().await?;
        Ok(unlock_flag(&rows, &self.column))
    }
}
