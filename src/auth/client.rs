//! Request-scoped identity client.
//!
//! # Responsibilities
//! - Load the session from the request's cookies
//! - Refresh expired access tokens before validating them
//! - Write rotated sessions back through the [`SessionJar`]
//! - Clear the session when the provider rejects a refresh
//!
//! # Design Decisions
//! - One client per request, borrowing the jar mutably for its lifetime
//! - Never retries; a failed call is reported to the caller once

use crate::auth::backend::AuthBackend;
use crate::auth::error::{AuthError, AuthResult};
use crate::auth::jar::SessionJar;
use crate::auth::storage::{self, CookieAttributes};
use crate::auth::types::{Session, SignUp, User};
use crate::config::GateConfig;
use crate::observability::metrics;

/// Session cookie handling settings.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub cookie_name: String,
    pub refresh_margin_secs: i64,
    pub chunk_size: usize,
    pub cookie: CookieAttributes,
}

impl SessionSettings {
    pub fn from_config(config: &GateConfig) -> Self {
        Self {
            cookie_name: config.session_cookie_name(),
            refresh_margin_secs: config.session.refresh_margin_secs,
            chunk_size: config.session.chunk_size,
            cookie: CookieAttributes {
                max_age: time::Duration::seconds(config.session.max_age_secs),
                secure: config.session.secure,
                http_only: config.session.http_only,
            },
        }
    }
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self::from_config(&GateConfig::default())
    }
}

/// A validated user together with the session that proved it.
#[derive(Debug, Clone)]
pub struct Authenticated {
    pub user: User,
    pub session: Session,
}

/// Identity provider client bound to one request's cookie jar.
pub struct AuthClient<'a, B: AuthBackend> {
    backend: &'a B,
    jar: &'a mut SessionJar,
    settings: &'a SessionSettings,
}

impl<'a, B: AuthBackend> AuthClient<'a, B> {
    pub fn new(backend: &'a B, jar: &'a mut SessionJar, settings: &'a SessionSettings) -> Self {
        Self {
            backend,
            jar,
            settings,
        }
    }

    /// The session currently stored in the jar, without contacting the
    /// provider.
    pub fn stored_session(&self) -> AuthResult<Option<Session>> {
        storage::read_session(&*self.jar, &self.settings.cookie_name)
    }

    /// Resolve the current user.
    ///
    /// Returns `Ok(None)` when no session cookie is present. An expired
    /// access token is refreshed first; the rotated session is written to
    /// the jar before the user is fetched.
    pub async fn get_user(&mut self) -> AuthResult<Option<User>> {
        Ok(self.authenticate().await?.map(|auth| auth.user))
    }

    /// Like [`get_user`](Self::get_user), but also returns the session
    /// whose access token was validated, for calls made on the user's
    /// behalf.
    pub async fn authenticate(&mut self) -> AuthResult<Option<Authenticated>> {
        let Some(session) = self.stored_session()? else {
            return Ok(None);
        };

        let session = if session.is_expired(self.settings.refresh_margin_secs) {
            self.refresh(&session).await?
        } else {
            session
        };

        let user = self.backend.fetch_user(&session.access_token).await;
        metrics::record_provider_call("fetch_user", &user);
        Ok(Some(Authenticated { user: user?, session }))
    }

    /// Adopt an externally obtained token pair.
    ///
    /// An expired pair is refreshed; otherwise the access token is validated.
    /// Either way the resulting session is written to the jar.
    pub async fn set_session(&mut self, access_token: &str, refresh_token: &str) -> AuthResult<Session> {
        let session = Session::from_tokens(access_token, refresh_token);

        if session.is_expired(self.settings.refresh_margin_secs) {
            return self.refresh(&session).await;
        }

        let user = self.backend.fetch_user(access_token).await;
        metrics::record_provider_call("fetch_user", &user);
        let session = Session {
            user: Some(user?),
            ..session
        };
        self.save(&session)?;
        Ok(session)
    }

    /// Exchange credentials for a session and store it.
    pub async fn sign_in_with_password(&mut self, email: &str, password: &str) -> AuthResult<Session> {
        let session = self.backend.sign_in_with_password(email, password).await;
        metrics::record_provider_call("sign_in", &session);
        let session = session?;
        self.save(&session)?;
        Ok(session)
    }

    /// Register an account. When the provider issues a session right away
    /// it is stored like a sign-in.
    pub async fn sign_up(&mut self, email: &str, password: &str, nickname: &str) -> AuthResult<SignUp> {
        let signed_up = self.backend.sign_up(email, password, nickname).await;
        metrics::record_provider_call("sign_up", &signed_up);
        let signed_up = signed_up?;
        if let Some(session) = &signed_up.session {
            self.save(session)?;
        }
        Ok(signed_up)
    }

    /// Revoke the stored session and clear its cookies.
    ///
    /// The cookies are cleared even when the provider call fails, so the
    /// browser is signed out locally either way.
    pub async fn sign_out(&mut self) -> AuthResult<()> {
        let stored = self.stored_session();
        let result = match &stored {
            Ok(Some(session)) => {
                let result = self.backend.sign_out(&session.access_token).await;
                metrics::record_provider_call("sign_out", &result);
                result
            }
            Ok(None) => Ok(()),
            Err(_) => Ok(()),
        };
        self.clear();
        result
    }

    async fn refresh(&mut self, session: &Session) -> AuthResult<Session> {
        if session.refresh_token.is_empty() {
            self.clear();
            return Err(AuthError::MissingSession);
        }

        tracing::debug!("Access token expired, refreshing session");
        let refreshed = self.backend.refresh_session(&session.refresh_token).await;
        metrics::record_provider_call("refresh", &refreshed);

        match refreshed {
            Ok(new_session) => {
                self.save(&new_session)?;
                Ok(new_session)
            }
            Err(e) => {
                if e.is_rejection() {
                    self.clear();
                }
                Err(e)
            }
        }
    }

    fn save(&mut self, session: &Session) -> AuthResult<()> {
        let cookies = storage::session_cookies(
            &*self.jar,
            &self.settings.cookie_name,
            session,
            self.settings.chunk_size,
            &self.settings.cookie,
        )?;
        self.jar.set_all(cookies, &storage::no_store_headers());
        Ok(())
    }

    fn clear(&mut self) {
        let cookies =
            storage::clear_cookies(&*self.jar, &self.settings.cookie_name, &self.settings.cookie);
        if !cookies.is_empty() {
            self.jar.set_all(cookies, &storage::no_store_headers());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::jar::is_removal;
    use crate::auth::types::{test_jwt, unix_now};
    use axum::http::header::{HeaderMap, HeaderValue, COOKIE};
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeBackend {
        calls: Mutex<Vec<String>>,
        reject_refresh: bool,
    }

    impl FakeBackend {
        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl AuthBackend for FakeBackend {
        async fn fetch_user(&self, access_token: &str) -> AuthResult<User> {
            self.calls.lock().unwrap().push(format!("user:{access_token}"));
            if access_token.starts_with("bad") {
                return Err(AuthError::Rejected { status: 401, message: "invalid JWT".into() });
            }
            Ok(User { id: "u1".into(), email: Some("u1@example.com".into()) })
        }

        async fn refresh_session(&self, refresh_token: &str) -> AuthResult<Session> {
            self.calls.lock().unwrap().push(format!("refresh:{refresh_token}"));
            if self.reject_refresh {
                return Err(AuthError::Rejected { status: 400, message: "Invalid Refresh Token".into() });
            }
            Ok(Session::from_tokens(test_jwt("u1", unix_now() + 3600), "rotated-refresh"))
        }

        async fn sign_in_with_password(&self, email: &str, _password: &str) -> AuthResult<Session> {
            self.calls.lock().unwrap().push(format!("sign_in:{email}"));
            Ok(Session::from_tokens(test_jwt("u1", unix_now() + 3600), "r"))
        }

        async fn sign_up(&self, email: &str, _password: &str, nickname: &str) -> AuthResult<SignUp> {
            self.calls.lock().unwrap().push(format!("sign_up:{email}:{nickname}"));
            let user = User { id: "u2".into(), email: Some(email.into()) };
            // Addresses on the confirming domain wait for email confirmation.
            let session = (!email.ends_with("@confirm.example"))
                .then(|| Session::from_tokens(test_jwt("u2", unix_now() + 3600), "r"));
            Ok(SignUp { user, session })
        }

        async fn sign_out(&self, access_token: &str) -> AuthResult<()> {
            self.calls.lock().unwrap().push(format!("sign_out:{access_token}"));
            Err(AuthError::Timeout)
        }
    }

    fn jar_with_session(settings: &SessionSettings, session: &Session) -> SessionJar {
        let value = storage::encode_session(session).unwrap();
        let mut headers = HeaderMap::new();
        headers.insert(
            COOKIE,
            HeaderValue::from_str(&format!("{}={}", settings.cookie_name, value)).unwrap(),
        );
        SessionJar::from_headers(&headers)
    }

    #[tokio::test]
    async fn test_no_cookie_means_no_user_and_no_calls() {
        let backend = FakeBackend::default();
        let settings = SessionSettings::default();
        let mut jar = SessionJar::default();

        let user = AuthClient::new(&backend, &mut jar, &settings).get_user().await.unwrap();

        assert!(user.is_none());
        assert!(backend.calls().is_empty());
        assert!(!jar.is_rotated());
    }

    #[tokio::test]
    async fn test_valid_session_is_not_rotated() {
        let backend = FakeBackend::default();
        let settings = SessionSettings::default();
        let token = test_jwt("u1", unix_now() + 3600);
        let mut jar = jar_with_session(&settings, &Session::from_tokens(token.clone(), "r"));

        let user = AuthClient::new(&backend, &mut jar, &settings).get_user().await.unwrap();

        assert_eq!(user.unwrap().id, "u1");
        assert_eq!(backend.calls(), vec![format!("user:{token}")]);
        assert!(!jar.is_rotated());
    }

    #[tokio::test]
    async fn test_expired_session_refreshes_before_fetch() {
        let backend = FakeBackend::default();
        let settings = SessionSettings::default();
        let expired = Session::from_tokens(test_jwt("u1", unix_now() - 10), "old-refresh");
        let mut jar = jar_with_session(&settings, &expired);

        let user = AuthClient::new(&backend, &mut jar, &settings).get_user().await.unwrap();

        assert!(user.is_some());
        let calls = backend.calls();
        assert_eq!(calls[0], "refresh:old-refresh");
        assert!(calls[1].starts_with("user:"));

        assert!(jar.is_rotated());
        let stored = storage::read_session(&jar, &settings.cookie_name).unwrap().unwrap();
        assert_eq!(stored.refresh_token, "rotated-refresh");
        assert!(jar.baseline().headers().contains_key("cache-control"));
    }

    #[tokio::test]
    async fn test_authenticate_returns_the_validated_session() {
        let backend = FakeBackend::default();
        let settings = SessionSettings::default();
        let expired = Session::from_tokens(test_jwt("u1", unix_now() - 10), "old-refresh");
        let mut jar = jar_with_session(&settings, &expired);

        let auth = AuthClient::new(&backend, &mut jar, &settings)
            .authenticate()
            .await
            .unwrap()
            .unwrap();

        assert_eq!(auth.user.id, "u1");
        assert_eq!(auth.session.refresh_token, "rotated-refresh");
        // The token handed back is the one the provider just validated.
        assert_eq!(backend.calls()[1], format!("user:{}", auth.session.access_token));
    }

    #[tokio::test]
    async fn test_rejected_refresh_clears_cookies() {
        let backend = FakeBackend { reject_refresh: true, ..Default::default() };
        let settings = SessionSettings::default();
        let expired = Session::from_tokens(test_jwt("u1", unix_now() - 10), "old-refresh");
        let mut jar = jar_with_session(&settings, &expired);

        let err = AuthClient::new(&backend, &mut jar, &settings).get_user().await.unwrap_err();

        assert!(err.is_rejection());
        assert!(jar.get(&settings.cookie_name).is_none());
        let baseline = jar.baseline();
        assert_eq!(baseline.cookies().len(), 1);
        assert!(is_removal(&baseline.cookies()[0]));
    }

    #[tokio::test]
    async fn test_expired_without_refresh_token() {
        let backend = FakeBackend::default();
        let settings = SessionSettings::default();
        let expired = Session::from_tokens(test_jwt("u1", unix_now() - 10), "");
        let mut jar = jar_with_session(&settings, &expired);

        let err = AuthClient::new(&backend, &mut jar, &settings).get_user().await.unwrap_err();

        assert!(matches!(err, AuthError::MissingSession));
        assert!(backend.calls().is_empty());
    }

    #[tokio::test]
    async fn test_set_session_validates_and_stores() {
        let backend = FakeBackend::default();
        let settings = SessionSettings::default();
        let mut jar = SessionJar::default();
        let token = test_jwt("u1", unix_now() + 3600);

        let session = AuthClient::new(&backend, &mut jar, &settings)
            .set_session(&token, "r")
            .await
            .unwrap();

        assert_eq!(session.user.unwrap().id, "u1");
        let stored = storage::read_session(&jar, &settings.cookie_name).unwrap().unwrap();
        assert_eq!(stored.access_token, token);
    }

    #[tokio::test]
    async fn test_set_session_rejected_token_writes_nothing() {
        let backend = FakeBackend::default();
        let settings = SessionSettings::default();
        let mut jar = SessionJar::default();

        let result = AuthClient::new(&backend, &mut jar, &settings)
            .set_session("bad-token", "r")
            .await;

        assert!(result.is_err());
        assert!(!jar.is_rotated());
    }

    #[tokio::test]
    async fn test_sign_out_clears_even_when_provider_fails() {
        let backend = FakeBackend::default();
        let settings = SessionSettings::default();
        let session = Session::from_tokens(test_jwt("u1", unix_now() + 3600), "r");
        let mut jar = jar_with_session(&settings, &session);

        let result = AuthClient::new(&backend, &mut jar, &settings).sign_out().await;

        assert!(matches!(result, Err(AuthError::Timeout)));
        assert!(jar.get(&settings.cookie_name).is_none());
        assert!(is_removal(&jar.baseline().cookies()[0]));
    }

    #[tokio::test]
    async fn test_sign_in_stores_session() {
        let backend = FakeBackend::default();
        let settings = SessionSettings::default();
        let mut jar = SessionJar::default();

        AuthClient::new(&backend, &mut jar, &settings)
            .sign_in_with_password("a@example.com", "pw")
            .await
            .unwrap();

        assert_eq!(backend.calls(), vec!["sign_in:a@example.com".to_string()]);
        assert!(storage::read_session(&jar, &settings.cookie_name).unwrap().is_some());
    }

    #[tokio::test]
    async fn test_sign_up_stores_issued_session() {
        let backend = FakeBackend::default();
        let settings = SessionSettings::default();
        let mut jar = SessionJar::default();

        let signed_up = AuthClient::new(&backend, &mut jar, &settings)
            .sign_up("bo@example.com", "pw", "bo")
            .await
            .unwrap();

        assert_eq!(signed_up.user.id, "u2");
        assert_eq!(backend.calls(), vec!["sign_up:bo@example.com:bo".to_string()]);
        assert!(jar.is_rotated());
        assert!(storage::read_session(&jar, &settings.cookie_name).unwrap().is_some());
    }

    #[tokio::test]
    async fn test_sign_up_pending_confirmation_writes_nothing() {
        let backend = FakeBackend::default();
        let settings = SessionSettings::default();
        let mut jar = SessionJar::default();

        let signed_up = AuthClient::new(&backend, &mut jar, &settings)
            .sign_up("bo@confirm.example", "pw", "bo")
            .await
            .unwrap();

        assert!(signed_up.session.is_none());
        assert!(!jar.is_rotated());
    }
}
