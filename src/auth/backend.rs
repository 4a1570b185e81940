use std::future::Future;

use crate::auth::error::AuthResult;
use crate::auth::types::{Session, SignUp, User};

/// Network calls to the identity provider.
///
/// Implementations are stateless with respect to the request: cookie
/// handling lives in [`AuthClient`](crate::auth::AuthClient), which calls
/// these with raw tokens.
pub trait AuthBackend: Send + Sync + 'static {
    /// Validate an access token and return its user.
    fn fetch_user(&self, access_token: &str) -> impl Future<Output = AuthResult<User>> + Send;

    /// Exchange a refresh token for a new session.
    fn refresh_session(
        &self,
        refresh_token: &str,
    ) -> impl Future<Output = AuthResult<Session>> + Send;

    /// Issue a session for email/password credentials.
    fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> impl Future<Output = AuthResult<Session>> + Send;

    /// Register a new account. `nickname` is stored in the user metadata.
    fn sign_up(
        &self,
        email: &str,
        password: &str,
        nickname: &str,
    ) -> impl Future<Output = AuthResult<SignUp>> + Send;

    /// Revoke the session behind an access token.
    fn sign_out(&self, access_token: &str) -> impl Future<Output = AuthResult<()>> + Send;
}
