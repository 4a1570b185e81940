//! Session endpoints.
//!
//! Thin glue over [`AuthClient`]: each handler asks the identity provider to
//! issue, adopt or revoke a session and returns the resulting cookies with
//! the same normalization the gate applies to its own responses.

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tower_http::limit::RequestBodyLimitLayer;

use crate::auth::{AuthBackend, AuthClient, AuthError, AuthResult, ProfileStore, SessionJar};
use crate::gate::{attach_session, Gate, GateSettings};

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct SignupRequest {
    pub email: String,
    pub password: String,
    pub nickname: String,
}

#[derive(Debug, Deserialize)]
pub struct SessionRequest {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: String,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct AuthResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Largest accepted JSON body on the session endpoints.
pub const MAX_BODY_BYTES: usize = 16 * 1024;

/// Routes for `/auth/login`, `/auth/signup`, `/auth/session` and
/// `/auth/logout`.
pub fn auth_routes<B: AuthBackend, P: ProfileStore>(gate: Gate<B, P>) -> Router {
    Router::new()
        .route("/auth/login", post(login::<B, P>))
        .route("/auth/signup", post(signup::<B, P>))
        .route("/auth/session", post(adopt_session::<B, P>))
        .route("/auth/logout", post(logout::<B, P>))
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .with_state(gate)
}

fn respond(result: AuthResult<()>, jar: &SessionJar, settings: &GateSettings) -> Response {
    let mut response = match result {
        Ok(()) => (
            StatusCode::OK,
            Json(AuthResponse {
                success: true,
                error: None,
            }),
        )
            .into_response(),
        Err(e) => {
            let (status, message) = match &e {
                AuthError::Rejected { message, .. } => (StatusCode::UNAUTHORIZED, message.clone()),
                _ => {
                    tracing::warn!(error = %e, "Session endpoint failed");
                    (
                        StatusCode::SERVICE_UNAVAILABLE,
                        "Identity provider unavailable".to_string(),
                    )
                }
            };
            (
                status,
                Json(AuthResponse {
                    success: false,
                    error: Some(message),
                }),
            )
                .into_response()
        }
    };
    attach_session(&mut response, jar.baseline(), &settings.session.cookie);
    response
}

async fn login<B: AuthBackend, P: ProfileStore>(
    State(gate): State<Gate<B, P>>,
    headers: HeaderMap,
    Json(body): Json<LoginRequest>,
) -> Response {
    let settings = gate.settings();
    let mut jar = SessionJar::from_headers(&headers);

    let result = AuthClient::new(gate.backend(), &mut jar, &settings.session)
        .sign_in_with_password(&body.email, &body.password)
        .await;
    match &result {
        Ok(session) => tracing::info!(
            user_id = session.user.as_ref().map(|u| u.id.as_str()).unwrap_or("-"),
            "Login succeeded"
        ),
        Err(e) => tracing::info!(error = %e, "Login failed"),
    }

    respond(result.map(|_| ()), &jar, &settings)
}

async fn signup<B: AuthBackend, P: ProfileStore>(
    State(gate): State<Gate<B, P>>,
    headers: HeaderMap,
    Json(body): Json<SignupRequest>,
) -> Response {
    let settings = gate.settings();
    let mut jar = SessionJar::from_headers(&headers);

    let result = AuthClient::new(gate.backend(), &mut jar, &settings.session)
        .sign_up(&body.email, &body.password, &body.nickname)
        .await;
    match &result {
        Ok(signed_up) => tracing::info!(
            user_id = %signed_up.user.id,
            session_issued = signed_up.session.is_some(),
            "Sign-up succeeded"
        ),
        Err(e) => tracing::info!(error = %e, "Sign-up failed"),
    }

    respond(result.map(|_| ()), &jar, &settings)
}

async fn adopt_session<B: AuthBackend, P: ProfileStore>(
    State(gate): State<Gate<B, P>>,
    headers: HeaderMap,
    Json(body): Json<SessionRequest>,
) -> Response {
    let settings = gate.settings();
    let mut jar = SessionJar::from_headers(&headers);

    let result = AuthClient::new(gate.backend(), &mut jar, &settings.session)
        .set_session(&body.access_token, &body.refresh_token)
        .await;

    respond(result.map(|_| ()), &jar, &settings)
}

/// Cookies are cleared even when the provider can't be reached, so the
/// response reports success once the browser is signed out locally.
async fn logout<B: AuthBackend, P: ProfileStore>(
    State(gate): State<Gate<B, P>>,
    headers: HeaderMap,
) -> Response {
    let settings = gate.settings();
    let mut jar = SessionJar::from_headers(&headers);

    if let Err(e) = AuthClient::new(gate.backend(), &mut jar, &settings.session)
        .sign_out()
        .await
    {
        tracing::warn!(error = %e, "Provider sign-out failed, cleared cookies locally");
    }

    respond(Ok(()), &jar, &settings)
}
