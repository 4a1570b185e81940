//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, cookie sizes)
//! - Check that route paths are usable as redirect targets
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GateConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use thiserror::Error;

use crate::config::schema::GateConfig;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// Validate a parsed configuration.
pub fn validate_config(config: &GateConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();
    let routes = &config.routes;

    for (field, path) in [
        ("routes.public_root", &routes.public_root),
        ("routes.landing_path", &routes.landing_path),
        ("routes.unlocked_path", &routes.unlocked_path),
    ] {
        if !path.starts_with('/') {
            errors.push(ValidationError::new(field, "must start with '/'"));
        }
        if path.chars().any(|c| c.is_control() || c.is_whitespace()) {
            errors.push(ValidationError::new(field, "must not contain whitespace"));
        }
    }

    if routes.landing_path == routes.public_root {
        errors.push(ValidationError::new(
            "routes.landing_path",
            "must differ from the public root",
        ));
    }
    if routes.unlocked_path == routes.public_root {
        errors.push(ValidationError::new(
            "routes.unlocked_path",
            "must differ from the public root",
        ));
    }

    match url::Url::parse(&config.identity.url) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => {}
        Ok(url) => errors.push(ValidationError::new(
            "identity.url",
            format!("unsupported scheme '{}'", url.scheme()),
        )),
        Err(e) => errors.push(ValidationError::new("identity.url", e.to_string())),
    }
    if config.identity.anon_key.trim().is_empty() {
        errors.push(ValidationError::new("identity.anon_key", "must not be empty"));
    }

    if config.upstream.address.trim().is_empty() {
        errors.push(ValidationError::new("upstream.address", "must not be empty"));
    } else if config
        .upstream
        .address
        .parse::<axum::http::uri::Authority>()
        .is_err()
    {
        errors.push(ValidationError::new(
            "upstream.address",
            "must be a host:port authority",
        ));
    }

    if config.session.max_age_secs <= 0 {
        errors.push(ValidationError::new("session.max_age_secs", "must be positive"));
    }
    if config.session.refresh_margin_secs < 0 {
        errors.push(ValidationError::new(
            "session.refresh_margin_secs",
            "must not be negative",
        ));
    }
    if config.session.chunk_size < 512 {
        errors.push(ValidationError::new("session.chunk_size", "must be at least 512"));
    }

    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::new("timeouts.request_secs", "must be positive"));
    }
    if config.timeouts.provider_secs == 0 {
        errors.push(ValidationError::new("timeouts.provider_secs", "must be positive"));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
