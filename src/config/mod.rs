//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → GateConfig (validated, immutable)
//!     → GateSettings snapshot shared via ArcSwap
//!
//! On file change:
//!     watcher.rs detects change
//!     → loader.rs loads new config
//!     → validation.rs validates
//!     → atomic swap of the settings snapshot
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require full reload
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks
//! - Listener, upstream and provider endpoints are read once at startup;
//!   reloads only affect route classification and cookie settings

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{load_config, parse_config, read_config, validate, ConfigError};
pub use watcher::ConfigWatcher;
pub use schema::{
    GateConfig, IdentityConfig, ListenerConfig, ObservabilityConfig, ProfileConfig,
    RoutesConfig, SessionConfig, TimeoutConfig, UpstreamConfig,
};
