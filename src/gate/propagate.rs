//! Carrying session state onto outbound responses.
//!
//! A fresh response knows nothing about the cookies written while the
//! session was resolved. Every disposition therefore ends here: the baseline
//! cookies are re-applied with explicit attributes and the baseline headers
//! are appended, never inserted, since several `Set-Cookie` values coexist.

use axum::http::header::{HeaderMap, HeaderValue, SET_COOKIE};
use axum::response::{IntoResponse, Redirect, Response};
use axum_extra::extract::cookie::{Cookie, SameSite};

use crate::auth::jar::is_removal;
use crate::auth::{Baseline, CookieAttributes};

/// Re-build a baseline cookie with explicit attributes: root path, the
/// session lifetime (removals keep max-age 0), `SameSite=Lax`, and the
/// cookie's own secure/http-only flags, defaulting to the configured ones.
pub fn normalize(cookie: &Cookie<'_>, attrs: &CookieAttributes) -> Cookie<'static> {
    let max_age = if is_removal(cookie) {
        time::Duration::ZERO
    } else {
        attrs.max_age
    };

    Cookie::build((cookie.name().to_string(), cookie.value().to_string()))
        .path("/")
        .max_age(max_age)
        .same_site(SameSite::Lax)
        .secure(cookie.secure().unwrap_or(attrs.secure))
        .http_only(cookie.http_only().unwrap_or(attrs.http_only))
        .build()
}

/// Append baseline cookies as `Set-Cookie` headers, skipping `skip` names.
/// A cookie that can't be encoded is logged and dropped; the rest still go.
fn append_cookies(headers: &mut HeaderMap, baseline: &Baseline, attrs: &CookieAttributes, skip: &[String]) {
    for cookie in baseline.cookies() {
        if skip.iter().any(|name| name == cookie.name()) {
            continue;
        }
        let rendered = normalize(cookie, attrs).to_string();
        match HeaderValue::from_str(&rendered) {
            Ok(value) => {
                headers.append(SET_COOKIE, value);
            }
            Err(e) => {
                tracing::warn!(cookie = %cookie.name(), error = %e, "Skipping cookie that cannot be sent");
            }
        }
    }
}

fn merge_headers(headers: &mut HeaderMap, baseline: &Baseline) {
    for (name, value) in baseline.headers().iter() {
        headers.append(name.clone(), value.clone());
    }
}

/// Names of the cookies a response already sets.
fn cookies_set_by(headers: &HeaderMap) -> Vec<String> {
    headers
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .filter_map(|v| Cookie::parse(v.to_string()).ok())
        .map(|c| c.name().to_string())
        .collect()
}

/// Build a 307 redirect to `target` carrying the whole baseline.
pub fn redirect_preserving_session(
    target: &str,
    baseline: &Baseline,
    attrs: &CookieAttributes,
) -> Response {
    let mut response = Redirect::temporary(target).into_response();
    let headers = response.headers_mut();
    append_cookies(headers, baseline, attrs, &[]);
    merge_headers(headers, baseline);
    response
}

/// Add the baseline to a downstream response. Cookies the downstream
/// response sets itself win over the baseline.
pub fn attach_session(response: &mut Response, baseline: &Baseline, attrs: &CookieAttributes) {
    if baseline.is_empty() {
        return;
    }
    let headers = response.headers_mut();
    let skip = cookies_set_by(headers);
    append_cookies(headers, baseline, attrs, &skip);
    merge_headers(headers, baseline);
}
