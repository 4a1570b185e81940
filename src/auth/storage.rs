//! Session cookie encoding.
//!
//! Sessions are stored as JSON, optionally prefixed with `base64-` and
//! base64url encoded, and split into numbered chunks (`name.0`, `name.1`, ...)
//! once the value outgrows a single cookie.

use axum::http::header::{HeaderMap, HeaderValue, CACHE_CONTROL};
use axum_extra::extract::cookie::{Cookie, SameSite};
use base64::engine::general_purpose::{URL_SAFE, URL_SAFE_NO_PAD};
use base64::Engine as _;

use crate::auth::error::{AuthError, AuthResult};
use crate::auth::jar::SessionJar;
use crate::auth::types::Session;

const BASE64_PREFIX: &str = "base64-";

/// Upper bound on chunks read back, so a hostile cookie header can't make
/// the reader loop for long.
const MAX_CHUNKS: usize = 32;

/// Attributes applied to every session cookie the gate writes.
#[derive(Debug, Clone)]
pub struct CookieAttributes {
    pub max_age: time::Duration,
    pub secure: bool,
    pub http_only: bool,
}

impl Default for CookieAttributes {
    fn default() -> Self {
        Self {
            max_age: time::Duration::days(7),
            secure: false,
            http_only: false,
        }
    }
}

impl CookieAttributes {
    /// Build a session cookie with these attributes.
    pub fn cookie(&self, name: String, value: String) -> Cookie<'static> {
        Cookie::build((name, value))
            .path("/")
            .max_age(self.max_age)
            .same_site(SameSite::Lax)
            .secure(self.secure)
            .http_only(self.http_only)
            .build()
    }

    /// Build a cookie that deletes `name`.
    pub fn removal(&self, name: String) -> Cookie<'static> {
        Cookie::build((name, ""))
            .path("/")
            .max_age(time::Duration::ZERO)
            .same_site(SameSite::Lax)
            .secure(self.secure)
            .http_only(self.http_only)
            .build()
    }
}

/// Headers sent along with every session write.
pub fn no_store_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(
        CACHE_CONTROL,
        HeaderValue::from_static("private, no-cache, no-store, must-revalidate, max-age=0"),
    );
    headers
}

fn chunk_name(name: &str, index: usize) -> String {
    format!("{name}.{index}")
}

/// Names of every cookie in the jar that belongs to the session `name`.
fn stored_names(jar: &SessionJar, name: &str) -> Vec<String> {
    jar.get_all()
        .into_iter()
        .map(|c| c.name().to_string())
        .filter(|n| {
            n == name
                || n.strip_prefix(name)
                    .and_then(|rest| rest.strip_prefix('.'))
                    .is_some_and(|idx| !idx.is_empty() && idx.bytes().all(|b| b.is_ascii_digit()))
        })
        .collect()
}

/// Reassemble the raw cookie value for `name`.
fn read_raw(jar: &SessionJar, name: &str) -> Option<String> {
    if let Some(cookie) = jar.get(name) {
        return Some(cookie.value().to_string());
    }

    let mut value = String::new();
    for index in 0..MAX_CHUNKS {
        match jar.get(&chunk_name(name, index)) {
            Some(chunk) => value.push_str(chunk.value()),
            None => break,
        }
    }
    (!value.is_empty()).then_some(value)
}

/// Decode a raw cookie value into a session.
pub fn decode_session(raw: &str) -> AuthResult<Session> {
    let json = match raw.strip_prefix(BASE64_PREFIX) {
        Some(encoded) => {
            let bytes = URL_SAFE_NO_PAD
                .decode(encoded)
                .or_else(|_| URL_SAFE.decode(encoded))
                .map_err(|e| AuthError::Malformed(format!("session cookie is not base64: {e}")))?;
            String::from_utf8(bytes)
                .map_err(|e| AuthError::Malformed(format!("session cookie is not utf-8: {e}")))?
        }
        None => raw.to_string(),
    };
    Ok(serde_json::from_str(&json)?)
}

/// Encode a session into its cookie value.
pub fn encode_session(session: &Session) -> AuthResult<String> {
    let json = serde_json::to_string(session)?;
    Ok(format!("{BASE64_PREFIX}{}", URL_SAFE_NO_PAD.encode(json)))
}

/// Read the stored session, if any.
pub fn read_session(jar: &SessionJar, name: &str) -> AuthResult<Option<Session>> {
    match read_raw(jar, name) {
        Some(raw) => decode_session(&raw).map(Some),
        None => Ok(None),
    }
}

/// Cookies that store `session` under `name`, plus removals for any stale
/// chunks currently in the jar.
pub fn session_cookies(
    jar: &SessionJar,
    name: &str,
    session: &Session,
    chunk_size: usize,
    attrs: &CookieAttributes,
) -> AuthResult<Vec<Cookie<'static>>> {
    let value = encode_session(session)?;
    let mut cookies = Vec::new();
    let mut written = Vec::new();

    if value.len() <= chunk_size {
        written.push(name.to_string());
        cookies.push(attrs.cookie(name.to_string(), value));
    } else {
        // The encoded value is ASCII, so byte offsets are char boundaries.
        for (index, start) in (0..value.len()).step_by(chunk_size).enumerate() {
            let end = (start + chunk_size).min(value.len());
            let chunk = chunk_name(name, index);
            written.push(chunk.clone());
            cookies.push(attrs.cookie(chunk, value[start..end].to_string()));
        }
    }

    for stale in stored_names(jar, name) {
        if !written.contains(&stale) {
            cookies.push(attrs.removal(stale));
        }
    }
    Ok(cookies)
}

/// Removal cookies for every stored piece of the session `name`.
pub fn clear_cookies(jar: &SessionJar, name: &str, attrs: &CookieAttributes) -> Vec<Cookie<'static>> {
    stored_names(jar, name)
        .into_iter()
        .map(|n| attrs.removal(n))
        .collect()
}
