//! Session-gating gatekeeper for the station content site.
//!
//! Every request passes through [`gate::session_gate`] before reaching the
//! content upstream. The gate resolves the visitor's session from cookies,
//! refreshing tokens with the identity provider when needed, then either
//! forwards the request or redirects it to the public root or the landing
//! page. Rotated session cookies are carried on whichever response leaves.

pub mod auth;
pub mod config;
pub mod gate;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod routing;

pub use config::schema::GateConfig;
pub use gate::{Gate, GateSettings};
pub use http::HttpServer;
pub use lifecycle::Shutdown;
