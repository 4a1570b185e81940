//! The gate as an axum middleware.
//!
//! # Flow
//! ```text
//! request
//!     → canonical path (non-canonical: 308 to it, ambiguous: 400)
//!     → classify path (assets forward immediately)
//!     → Gate::decide (session resolution + policy), panics caught
//!     → Forward: rewrite Cookie header, run downstream, attach baseline
//!     → Redirect: redirect_preserving_session
//! ```

use std::borrow::Cow;
use std::panic::AssertUnwindSafe;

use axum::extract::{Request, State};
use axum::http::header::COOKIE;
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Redirect, Response};
use futures_util::FutureExt;

use crate::auth::{AuthBackend, ProfileStore};
use crate::gate::policy::{Disposition, RedirectTarget};
use crate::gate::propagate::{attach_session, redirect_preserving_session};
use crate::gate::{Decision, Gate};
use crate::observability::metrics;
use crate::routing::{canonicalize, RouteClass};

/// Gate every request passing through the router.
///
/// Mount with
/// `axum::middleware::from_fn_with_state(gate, session_gate::<B, P>)`.
pub async fn session_gate<B: AuthBackend, P: ProfileStore>(
    State(gate): State<Gate<B, P>>,
    mut request: Request,
    next: Next,
) -> Response {
    let path = match canonicalize(request.uri().path()) {
        Ok(Cow::Borrowed(path)) => path.to_string(),
        Ok(Cow::Owned(canonical)) => {
            tracing::debug!(path = %request.uri().path(), canonical = %canonical, "Redirecting to canonical path");
            metrics::record_disposition("canonical_redirect", "unclassified");
            let location = match request.uri().query() {
                Some(query) => format!("{canonical}?{query}"),
                None => canonical,
            };
            return Redirect::permanent(&location).into_response();
        }
        Err(e) => {
            tracing::info!(path = %request.uri().path(), error = %e, "Refusing ambiguous path");
            metrics::record_disposition("rejected_path", "unclassified");
            return (StatusCode::BAD_REQUEST, "Bad request").into_response();
        }
    };

    let settings = gate.settings();
    let class = settings.routes.classify(&path);

    if class == RouteClass::Asset {
        metrics::record_disposition("asset_bypass", class.as_str());
        return next.run(request).await;
    }

    let decided = AssertUnwindSafe(gate.decide(&settings, class, request.headers()))
        .catch_unwind()
        .await;
    let Decision {
        disposition,
        jar,
        user,
    } = match decided {
        Ok(decision) => decision,
        Err(_) => {
            tracing::error!(path = %path, "Gate failed while resolving the session, forwarding unmodified");
            metrics::record_disposition("fallback_forward", class.as_str());
            return next.run(request).await;
        }
    };

    metrics::record_disposition(disposition.as_str(), class.as_str());
    tracing::debug!(
        path = %path,
        route_class = class.as_str(),
        disposition = disposition.as_str(),
        user_id = user.as_ref().map(|u| u.id.as_str()).unwrap_or("-"),
        cookies_rotated = jar.is_rotated(),
        "Gate decision"
    );

    let attrs = &settings.session.cookie;
    match disposition {
        Disposition::Redirect(target) => {
            let location = match target {
                RedirectTarget::PublicRoot => settings.routes.public_root(),
                RedirectTarget::Landing => settings.routes.landing_path(),
            };
            redirect_preserving_session(location, jar.baseline(), attrs)
        }
        Disposition::Forward => {
            if jar.is_rotated() {
                let headers = request.headers_mut();
                headers.remove(COOKIE);
                if let Some(value) = jar.cookie_header() {
                    headers.insert(COOKIE, value);
                }
            }
            if let Some(user) = user {
                request.extensions_mut().insert(user);
            }

            let mut response = next.run(request).await;
            attach_session(&mut response, jar.baseline(), attrs);
            response
        }
    }
}
