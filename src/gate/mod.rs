//! Request gatekeeper.
//!
//! # Data Flow
//! ```text
//! Incoming request
//!     → routing::RouteTable::classify
//!     → Asset: forward, no session work
//!     → resolve.rs (SessionJar + AuthClient → user and session, errors → None)
//!     → resolve.rs (unlock flag as the user, only for the deeper prefix)
//!     → policy.rs (RouteClass × Access → Disposition)
//!     → propagate.rs (forward with cookies | redirect with cookies)
//! ```
//!
//! # Design Decisions
//! - Per-request and stateless; the only shared state is an immutable
//!   settings snapshot swapped atomically on reload
//! - Provider failures degrade to anonymous: fail-closed for protected
//!   paths, fail-open for public ones
//! - A panic inside the gate forwards the request unmodified

pub mod middleware;
pub mod policy;
pub mod propagate;
pub mod resolve;

use std::sync::Arc;

use arc_swap::ArcSwap;
use axum::http::HeaderMap;

use crate::auth::{AuthBackend, ProfileStore, SessionJar, SessionSettings, User};
use crate::config::GateConfig;
use crate::routing::{RouteClass, RouteTable};

pub use middleware::session_gate;
pub use policy::{Access, Disposition, RedirectTarget};
pub use propagate::{attach_session, redirect_preserving_session};
pub use resolve::resolve_session;

/// Reloadable part of the configuration.
#[derive(Debug, Default)]
pub struct GateSettings {
    pub routes: RouteTable,
    pub session: SessionSettings,
}

impl GateSettings {
    pub fn from_config(config: &GateConfig) -> Self {
        Self {
            routes: RouteTable::from_config(&config.routes),
            session: SessionSettings::from_config(config),
        }
    }
}

/// Result of session resolution and policy evaluation for one request.
#[derive(Debug)]
pub struct Decision {
    pub disposition: Disposition,
    /// Request cookies after any rotation, plus the outbound baseline.
    pub jar: SessionJar,
    pub user: Option<User>,
}

/// Shared gate state: provider clients and the current settings.
pub struct Gate<B, P> {
    backend: Arc<B>,
    profiles: Arc<P>,
    settings: Arc<ArcSwap<GateSettings>>,
}

impl<B, P> Clone for Gate<B, P> {
    fn clone(&self) -> Self {
        Self {
            backend: self.backend.clone(),
            profiles: self.profiles.clone(),
            settings: self.settings.clone(),
        }
    }
}

impl<B: AuthBackend, P: ProfileStore> Gate<B, P> {
    pub fn new(backend: B, profiles: P, settings: GateSettings) -> Self {
        Self {
            backend: Arc::new(backend),
            profiles: Arc::new(profiles),
            settings: Arc::new(ArcSwap::from_pointee(settings)),
        }
    }

    /// Current settings snapshot.
    pub fn settings(&self) -> Arc<GateSettings> {
        self.settings.load_full()
    }

    /// Replace the settings; requests already in flight keep their snapshot.
    pub fn update_settings(&self, settings: GateSettings) {
        self.settings.store(Arc::new(settings));
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Resolve the session behind `headers` and evaluate the policy for a
    /// non-asset request of class `class`.
    pub async fn decide(
        &self,
        settings: &GateSettings,
        class: RouteClass,
        headers: &HeaderMap,
    ) -> Decision {
        let mut jar = SessionJar::from_headers(headers);
        let auth = resolve::resolve_session(&*self.backend, &mut jar, &settings.session).await;

        let access = match &auth {
            None => Access::Anonymous,
            Some(auth) if policy::needs_unlock_flag(class) => {
                if resolve::unlock_flag(&*self.profiles, auth).await {
                    Access::Unlocked
                } else {
                    Access::Authenticated
                }
            }
            Some(_) => Access::Authenticated,
        };

        Decision {
            disposition: policy::evaluate(class, access),
            jar,
            user: auth.map(|auth| auth.user),
        }
    }
}
