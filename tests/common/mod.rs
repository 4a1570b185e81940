//! Shared fixtures for the integration tests.
#![allow(dead_code)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

use axum::body::Body;
use axum::extract::Request;
use axum::http::header::{COOKIE, SET_COOKIE};
use axum::response::Response;
use axum::Router;
use axum_extra::extract::cookie::Cookie;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use tokio::net::TcpListener;
use tower::ServiceExt;

use station_gate::auth::storage::encode_session;
use station_gate::auth::{AuthBackend, AuthError, AuthResult, ProfileStore, Session, SignUp, User};
use station_gate::{GateConfig, HttpServer};

pub const PROJECT_URL: &str = "https://abcd.supabase.co";
pub const COOKIE_NAME: &str = "sb-abcd-auth-token";

pub fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs() as i64
}

/// An unsigned JWT carrying `sub` and `exp`.
pub fn jwt(sub: &str, exp: i64) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(format!(r#"{{"sub":"{sub}","exp":{exp}}}"#));
    format!("{header}.{payload}.sig")
}

/// A session for `user_id` whose access token expires at `exp`.
pub fn session(user_id: &str, exp: i64, refresh_token: &str) -> Session {
    Session {
        access_token: jwt(user_id, exp),
        refresh_token: refresh_token.to_string(),
        token_type: Some("bearer".to_string()),
        expires_in: Some(3600),
        expires_at: Some(exp),
        user: Some(User {
            id: user_id.to_string(),
            email: Some(format!("{user_id}@example.com")),
        }),
    }
}

pub fn valid_session(user_id: &str) -> Session {
    session(user_id, unix_now() + 3600, &format!("refresh-{user_id}"))
}

pub fn expired_session(user_id: &str, refresh_token: &str) -> Session {
    session(user_id, unix_now() - 60, refresh_token)
}

/// `name=value` pair for a Cookie header.
pub fn session_cookie(session: &Session) -> String {
    format!("{}={}", COOKIE_NAME, encode_session(session).unwrap())
}

#[derive(Default)]
struct IdentityState {
    users: Mutex<HashMap<String, User>>,
    refreshes: Mutex<HashMap<String, Session>>,
    calls: AtomicUsize,
    unavailable: AtomicBool,
}

/// In-process identity provider. Clones share state.
#[derive(Clone, Default)]
pub struct FakeIdentity {
    state: Arc<IdentityState>,
}

impl FakeIdentity {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept the session's access token.
    pub fn accept(&self, session: &Session) -> &Self {
        let user = session.user.clone().unwrap();
        self.state
            .users
            .lock()
            .unwrap()
            .insert(session.access_token.clone(), user);
        self
    }

    /// Answer a refresh with `refresh_token` by issuing `rotated`.
    pub fn rotate(&self, refresh_token: &str, rotated: &Session) -> &Self {
        self.accept(rotated);
        self.state
            .refreshes
            .lock()
            .unwrap()
            .insert(refresh_token.to_string(), rotated.clone());
        self
    }

    /// Make every call fail as if the provider were down.
    pub fn go_down(&self) {
        self.state.unavailable.store(true, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.state.calls.load(Ordering::SeqCst)
    }

    fn begin(&self) -> AuthResult<()> {
        self.state.calls.fetch_add(1, Ordering::SeqCst);
        if self.state.unavailable.load(Ordering::SeqCst) {
            return Err(AuthError::Transport("connection refused".to_string()));
        }
        Ok(())
    }
}

impl AuthBackend for FakeIdentity {
    async fn fetch_user(&self, access_token: &str) -> AuthResult<User> {
        self.begin()?;
        self.state
            .users
            .lock()
            .unwrap()
            .get(access_token)
            .cloned()
            .ok_or(AuthError::Rejected {
                status: 401,
                message: "invalid JWT".to_string(),
            })
    }

    async fn refresh_session(&self, refresh_token: &str) -> AuthResult<Session> {
        self.begin()?;
        self.state
            .refreshes
            .lock()
            .unwrap()
            .get(refresh_token)
            .cloned()
            .ok_or(AuthError::Rejected {
                status: 400,
                message: "Invalid Refresh Token: Refresh Token Not Found".to_string(),
            })
    }

    async fn sign_in_with_password(&self, email: &str, password: &str) -> AuthResult<Session> {
        self.begin()?;
        if password != "correct horse" {
            return Err(AuthError::Rejected {
                status: 400,
                message: "Invalid login credentials".to_string(),
            });
        }
        let user_id = email.split('@').next().unwrap_or(email);
        let session = valid_session(user_id);
        self.accept(&session);
        Ok(session)
    }

    /// Addresses already known to the provider are refused the way the
    /// provider refuses them.
    async fn sign_up(&self, email: &str, _password: &str, _nickname: &str) -> AuthResult<SignUp> {
        self.begin()?;
        if email.starts_with("ada@") {
            return Err(AuthError::Rejected {
                status: 400,
                message: "User already registered".to_string(),
            });
        }
        let user_id = email.split('@').next().unwrap_or(email);
        let session = valid_session(user_id);
        self.accept(&session);
        Ok(SignUp {
            user: session.user.clone().unwrap(),
            session: Some(session),
        })
    }

    async fn sign_out(&self, _access_token: &str) -> AuthResult<()> {
        self.begin()
    }
}

/// In-process profile store. Clones share state.
#[derive(Clone, Default)]
pub struct FakeProfiles {
    unlocked: Arc<Mutex<HashMap<String, bool>>>,
    tokens: Arc<Mutex<Vec<String>>>,
    calls: Arc<AtomicUsize>,
}

impl FakeProfiles {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, user_id: &str, unlocked: bool) -> &Self {
        self.unlocked
            .lock()
            .unwrap()
            .insert(user_id.to_string(), unlocked);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Access tokens the lookups were authorized with, in call order.
    pub fn tokens(&self) -> Vec<String> {
        self.tokens.lock().unwrap().clone()
    }
}

impl ProfileStore for FakeProfiles {
    async fn is_unlocked(&self, user_id: &str, access_token: &str) -> AuthResult<bool> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.tokens.lock().unwrap().push(access_token.to_string());
        Ok(self
            .unlocked
            .lock()
            .unwrap()
            .get(user_id)
            .copied()
            .unwrap_or(false))
    }
}

/// Start a content server that answers every path with the Cookie header
/// it received.
pub async fn start_upstream() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let app = Router::new().fallback(|request: Request| async move {
        let cookie = request
            .headers()
            .get(COOKIE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();
        Response::builder()
            .header("x-upstream-path", request.uri().path())
            .body(Body::from(format!("cookie: {cookie}")))
            .unwrap()
    });

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

/// Configuration with `/landing` as landing page and `/deeper` as the
/// unlocked area.
pub fn gate_config(upstream: SocketAddr) -> GateConfig {
    let mut config = GateConfig::default();
    config.upstream.address = upstream.to_string();
    config.identity.url = PROJECT_URL.to_string();
    config.identity.anon_key = "anon".to_string();
    config.routes.public_root = "/".to_string();
    config.routes.landing_path = "/landing".to_string();
    config.routes.unlocked_path = "/deeper".to_string();
    config
}

pub struct TestGate {
    pub server: HttpServer,
    pub identity: FakeIdentity,
    pub profiles: FakeProfiles,
}

impl TestGate {
    pub async fn start() -> Self {
        let upstream = start_upstream().await;
        Self::with_config(gate_config(upstream))
    }

    pub fn with_config(config: GateConfig) -> Self {
        let identity = FakeIdentity::new();
        let profiles = FakeProfiles::new();
        let server = HttpServer::with_providers(config, identity.clone(), profiles.clone()).unwrap();
        Self {
            server,
            identity,
            profiles,
        }
    }

    pub async fn get(&self, path: &str, cookie: Option<&str>) -> Response {
        let mut request = Request::builder().uri(path);
        if let Some(cookie) = cookie {
            request = request.header(COOKIE, cookie);
        }
        self.send(request.body(Body::empty()).unwrap()).await
    }

    pub async fn send(&self, request: Request) -> Response {
        self.server.router().oneshot(request).await.unwrap()
    }
}

pub fn location(response: &Response) -> Option<&str> {
    response
        .headers()
        .get("location")
        .and_then(|v| v.to_str().ok())
}

pub fn set_cookies(response: &Response) -> Vec<Cookie<'static>> {
    response
        .headers()
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .filter_map(|v| Cookie::parse(v.to_string()).ok())
        .collect()
}

pub async fn body_text(response: Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}
