//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gate.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the session gate.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GateConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Content origin that admitted requests are forwarded to.
    pub upstream: UpstreamConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Identity provider connection settings.
    pub identity: IdentityConfig,

    /// Profile store holding the unlock flag.
    pub profiles: ProfileConfig,

    /// Path classification.
    pub routes: RoutesConfig,

    /// Session cookie settings.
    pub session: SessionConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Upstream content server.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Upstream address (e.g., "127.0.0.1:3000").
    pub address: String,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            address: "127.0.0.1:3000".to_string(),
        }
    }
}

/// Timeout configuration for various operations.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,

    /// Timeout for a single identity provider or profile store call.
    pub provider_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            request_secs: 30,
            provider_secs: 10,
        }
    }
}

/// Identity provider (GoTrue-compatible) settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct IdentityConfig {
    /// Project base URL, e.g. "https://abcd.supabase.co".
    pub url: String,

    /// Public (anon) API key sent as `apikey` on every call.
    pub anon_key: String,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:54321".to_string(),
            anon_key: String::new(),
        }
    }
}

/// Profile store settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ProfileConfig {
    /// Table holding one row per user, keyed by `id`.
    pub table: String,

    /// Boolean column carrying the unlock flag.
    pub unlock_column: String,

    /// Key used for profile lookups. Falls back to the anon key when unset.
    pub api_key: Option<String>,
}

impl Default for ProfileConfig {
    fn default() -> Self {
        Self {
            table: "profiles".to_string(),
            unlock_column: "is_physics_unlocked".to_string(),
            api_key: None,
        }
    }
}

/// Path classification settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RoutesConfig {
    /// Login screen. Authenticated users are sent on to the landing path.
    pub public_root: String,

    /// Prefix reachable by any authenticated user.
    pub landing_path: String,

    /// Prefix that additionally requires the unlock flag.
    pub unlocked_path: String,

    /// Path prefixes that skip session work entirely.
    pub asset_prefixes: Vec<String>,

    /// Exact paths that skip session work entirely.
    pub asset_paths: Vec<String>,

    /// File extensions (without the dot) that skip session work.
    pub asset_extensions: Vec<String>,
}

impl Default for RoutesConfig {
    fn default() -> Self {
        Self {
            public_root: "/".to_string(),
            landing_path: "/station".to_string(),
            unlocked_path: "/study".to_string(),
            asset_prefixes: vec!["/_next".to_string()],
            asset_paths: vec!["/favicon.ico".to_string()],
            asset_extensions: [
                "png", "jpg", "jpeg", "gif", "svg", "webp", "ico", "woff", "woff2", "ttf", "eot",
                "otf",
            ]
            .iter()
            .map(|ext| ext.to_string())
            .collect(),
        }
    }
}

/// Session cookie settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Explicit cookie name. Derived from the identity URL when unset.
    pub cookie_name: Option<String>,

    /// Cookie lifetime in seconds (matches the provider's session lifetime).
    pub max_age_secs: i64,

    /// Default `Secure` flag for cookies that don't carry one.
    pub secure: bool,

    /// Default `HttpOnly` flag for cookies that don't carry one.
    pub http_only: bool,

    /// Refresh an access token this many seconds before it expires.
    pub refresh_margin_secs: i64,

    /// Maximum length of a single cookie value before chunking.
    pub chunk_size: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cookie_name: None,
            max_age_secs: 60 * 60 * 24 * 7,
            secure: false,
            http_only: false,
            refresh_margin_secs: 30,
            chunk_size: 3180,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Emit JSON log lines instead of the human-readable format.
    pub json_logs: bool,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

impl GateConfig {
    /// Name of the session cookie.
    ///
    /// Uses the configured name, otherwise `sb-<ref>-auth-token` where `<ref>`
    /// is the first label of the identity URL host.
    pub fn session_cookie_name(&self) -> String {
        if let Some(name) = &self.session.cookie_name {
            return name.clone();
        }
        let project_ref = url::Url::parse(&self.identity.url)
            .ok()
            .and_then(|u| u.host_str().map(|h| h.split('.').next().unwrap_or(h).to_string()))
            .unwrap_or_else(|| "local".to_string());
        format!("sb-{}-auth-token", project_ref)
    }

    /// Key used for profile lookups.
    pub fn profile_api_key(&self) -> &str {
        self.profiles
            .api_key
            .as_deref()
            .unwrap_or(&self.identity.anon_key)
    }
}
