//! Request-scoped cookie jar shared between the gate and the identity client.
//!
//! The jar holds two views of the session cookies:
//! - the request's cookie set, updated in place when tokens rotate so
//!   everything downstream of the gate sees the fresh token;
//! - the [`Baseline`], an accumulator of every cookie and header the
//!   outbound response must carry so the browser persists the rotation.

use axum::http::header::{HeaderMap, HeaderValue};
use axum_extra::extract::cookie::{Cookie, CookieJar};

/// Cookies and headers that every outbound response for this request must
/// carry, whatever the final disposition is.
#[derive(Debug, Clone, Default)]
pub struct Baseline {
    cookies: Vec<Cookie<'static>>,
    headers: HeaderMap,
}

impl Baseline {
    /// Cookies to set, in write order. At most one entry per name.
    pub fn cookies(&self) -> &[Cookie<'static>] {
        &self.cookies
    }

    /// Extra response headers (never `Set-Cookie`).
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn is_empty(&self) -> bool {
        self.cookies.is_empty() && self.headers.is_empty()
    }

    fn record_cookie(&mut self, cookie: Cookie<'static>) {
        self.cookies.retain(|c| c.name() != cookie.name());
        self.cookies.push(cookie);
    }

    fn record_headers(&mut self, headers: &HeaderMap) {
        for (name, value) in headers.iter() {
            let present = self.headers.get_all(name).iter().any(|v| v == value);
            if !present {
                self.headers.append(name.clone(), value.clone());
            }
        }
    }
}

/// True for a cookie that instructs the browser to delete it.
pub fn is_removal(cookie: &Cookie<'_>) -> bool {
    cookie.max_age() == Some(time::Duration::ZERO)
}

/// Cookie jar bound to one request.
#[derive(Debug, Clone, Default)]
pub struct SessionJar {
    cookies: CookieJar,
    baseline: Baseline,
}

impl SessionJar {
    /// Parse the request's `Cookie` headers.
    pub fn from_headers(headers: &HeaderMap) -> Self {
        Self {
            cookies: CookieJar::from_headers(headers),
            baseline: Baseline::default(),
        }
    }

    /// Look up one request cookie.
    pub fn get(&self, name: &str) -> Option<Cookie<'static>> {
        self.cookies.get(name).cloned()
    }

    /// Every cookie the request currently carries, including rotations.
    pub fn get_all(&self) -> Vec<Cookie<'static>> {
        self.cookies.iter().cloned().collect()
    }

    /// Apply cookies written by the identity client.
    ///
    /// Each cookie replaces (or, for removal cookies, deletes) the request
    /// cookie of the same name and is recorded on the baseline together
    /// with `headers`.
    pub fn set_all(&mut self, cookies: Vec<Cookie<'static>>, headers: &HeaderMap) {
        for cookie in cookies {
            let name = cookie.name().to_string();
            let jar = std::mem::take(&mut self.cookies);
            self.cookies = if is_removal(&cookie) {
                jar.remove(Cookie::from(name))
            } else {
                jar.add(Cookie::new(name, cookie.value().to_string()))
            };
            self.baseline.record_cookie(cookie);
        }
        self.baseline.record_headers(headers);
    }

    /// True once the identity client wrote anything.
    pub fn is_rotated(&self) -> bool {
        !self.baseline.cookies.is_empty()
    }

    /// Render the request cookie set as a `Cookie` header value.
    pub fn cookie_header(&self) -> Option<HeaderValue> {
        let rendered = self
            .cookies
            .iter()
            .map(|c| c.stripped().to_string())
            .collect::<Vec<_>>()
            .join("; ");
        if rendered.is_empty() {
            return None;
        }
        HeaderValue::from_str(&rendered).ok()
    }

    pub fn baseline(&self) -> &Baseline {
        &self.baseline
    }

    pub fn into_baseline(self) -> Baseline {
        self.baseline
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::header::{CACHE_CONTROL, COOKIE};

    fn jar_with(cookie_header: &str) -> SessionJar {
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_str(cookie_header).unwrap());
        SessionJar::from_headers(&headers)
    }

    #[test]
    fn test_reads_request_cookies() {
        let jar = jar_with("a=1; theme=dark");
        assert_eq!(jar.get("a").unwrap().value(), "1");
        assert_eq!(jar.get_all().len(), 2);
        assert!(!jar.is_rotated());
        assert!(jar.baseline().is_empty());
    }

    #[test]
    fn test_set_all_updates_request_and_baseline() {
        let mut jar = jar_with("a=1; theme=dark");
        let mut headers = HeaderMap::new();
        headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-store"));

        jar.set_all(vec![Cookie::new("a", "2")], &headers);
        jar.set_all(vec![Cookie::new("a", "3")], &headers);

        assert_eq!(jar.get("a").unwrap().value(), "3");
        assert!(jar.is_rotated());
        let baseline = jar.baseline();
        assert_eq!(baseline.cookies().len(), 1);
        assert_eq!(baseline.cookies()[0].value(), "3");
        assert_eq!(baseline.headers().get_all(CACHE_CONTROL).iter().count(), 1);
    }

    #[test]
    fn test_removal_cookie_deletes_request_cookie() {
        let mut jar = jar_with("a=1; theme=dark");
        let removal = Cookie::build(("a", "")).max_age(time::Duration::ZERO).build();

        jar.set_all(vec![removal], &HeaderMap::new());

        assert!(jar.get("a").is_none());
        assert_eq!(jar.cookie_header().unwrap(), "theme=dark");
        assert!(is_removal(&jar.baseline().cookies()[0]));
    }

    #[test]
    fn test_empty_jar_has_no_cookie_header() {
        let jar = SessionJar::default();
        assert!(jar.cookie_header().is_none());
    }
}
