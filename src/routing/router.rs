//! Route classification.
//!
//! # Responsibilities
//! - Partition the path space into asset, public and protected classes
//! - Answer classification as a pure function of the path
//!
//! # Design Decisions
//! - Immutable after construction (thread-safe without locks)
//! - Assets are checked first so they never cost a session lookup
//! - The unlocked prefix is checked before the landing prefix, so it may be
//!   nested below it

use crate::config::RoutesConfig;
use crate::routing::matcher::{
    AnyMatcher, ExactPathMatcher, ExtensionMatcher, Matcher, PathPrefixMatcher,
};

/// Access class of a request path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteClass {
    /// Static asset; forwarded without session work.
    Asset,
    /// The public root (login screen).
    PublicRoot,
    /// Any other public path.
    Public,
    /// Requires an authenticated user.
    Authenticated,
    /// Requires an authenticated user with the unlock flag set.
    Unlocked,
}

impl RouteClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            RouteClass::Asset => "asset",
            RouteClass::PublicRoot => "public_root",
            RouteClass::Public => "public",
            RouteClass::Authenticated => "authenticated",
            RouteClass::Unlocked => "unlocked",
        }
    }
}

/// Compiled route table.
#[derive(Debug)]
pub struct RouteTable {
    assets: AnyMatcher,
    unlocked: PathPrefixMatcher,
    landing: PathPrefixMatcher,
    public_root: String,
    landing_path: String,
}

impl RouteTable {
    /// Compile the route table from configuration.
    pub fn from_config(config: &RoutesConfig) -> Self {
        let mut assets: Vec<Box<dyn Matcher>> = Vec::new();
        for prefix in &config.asset_prefixes {
            assets.push(Box::new(PathPrefixMatcher::new(prefix.clone())));
        }
        for path in &config.asset_paths {
            assets.push(Box::new(ExactPathMatcher::new(path.clone())));
        }
        if !config.asset_extensions.is_empty() {
            assets.push(Box::new(ExtensionMatcher::new(&config.asset_extensions)));
        }

        Self {
            assets: AnyMatcher::new(assets),
            unlocked: PathPrefixMatcher::new(config.unlocked_path.clone()),
            landing: PathPrefixMatcher::new(config.landing_path.clone()),
            public_root: config.public_root.clone(),
            landing_path: config.landing_path.clone(),
        }
    }

    /// Classify a request path.
    pub fn classify(&self, path: &str) -> RouteClass {
        if self.assets.matches(path) {
            RouteClass::Asset
        } else if self.unlocked.matches(path) {
            RouteClass::Unlocked
        } else if self.landing.matches(path) {
            RouteClass::Authenticated
        } else if path == self.public_root {
            RouteClass::PublicRoot
        } else {
            RouteClass::Public
        }
    }

    /// Redirect target for requests that need a login.
    pub fn public_root(&self) -> &str {
        &self.public_root
    }

    /// Redirect target for authenticated users.
    pub fn landing_path(&self) -> &str {
        &self.landing_path
    }
}

impl Default for RouteTable {
    fn default() -> Self {
        Self::from_config(&RoutesConfig::default())
    }
}
