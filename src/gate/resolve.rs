//! Session resolution for the gate.
//!
//! Every identity failure is folded into "no user" here, once, so the
//! policy only ever sees an optional user.

use std::time::Instant;

use crate::auth::{
    AuthBackend, AuthClient, AuthError, Authenticated, ProfileStore, SessionJar, SessionSettings,
};
use crate::observability::metrics;

/// Resolve the current user from the jar, refreshing tokens as needed.
/// Rotated cookies end up on the jar's baseline whatever the outcome.
pub async fn resolve_session<B: AuthBackend>(
    backend: &B,
    jar: &mut SessionJar,
    settings: &SessionSettings,
) -> Option<Authenticated> {
    let start = Instant::now();
    let result = AuthClient::new(backend, jar, settings).authenticate().await;
    metrics::record_resolution(start);

    match result {
        Ok(auth) => auth,
        Err(e) => {
            log_resolution_failure(&e);
            None
        }
    }
}

fn log_resolution_failure(error: &AuthError) {
    match error {
        AuthError::Transport(_) | AuthError::Timeout | AuthError::Provider { .. } => {
            tracing::warn!(
                error = %error,
                transient = error.is_transient(),
                "Identity provider unavailable, treating request as anonymous"
            );
        }
        AuthError::Rejected { message, .. } if message.contains("expired") => {
            tracing::info!(
                error = %error,
                "Session token rejected as expired; check clock skew between gate and provider"
            );
        }
        AuthError::Rejected { .. } => {
            tracing::info!(error = %error, "Session token rejected");
        }
        AuthError::Malformed(_) => {
            tracing::warn!(error = %error, "Ignoring malformed session cookie");
        }
        AuthError::MissingSession => {
            tracing::debug!("Expired session without refresh token");
        }
    }
}

/// Look up the unlock flag as the user. Lookup failures count as locked.
pub async fn unlock_flag<P: ProfileStore>(profiles: &P, auth: &Authenticated) -> bool {
    let user = &auth.user;
    let result = profiles
        .is_unlocked(&user.id, &auth.session.access_token)
        .await;
    metrics::record_provider_call("unlock_flag", &result);

    match result {
        Ok(unlocked) => unlocked,
        Err(e) => {
            tracing::warn!(user_id = %user.id, error = %e, "Unlock flag lookup failed, treating as locked");
            false
        }
    }
}
