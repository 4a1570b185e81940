//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request path
//!     → path.rs (canonical spelling, or refuse)
//!     → router.rs (classification lookup)
//!     → matcher.rs (evaluate match conditions)
//!     → Return: RouteClass
//!
//! Route Compilation (at startup and on reload):
//!     RoutesConfig
//!     → Compile matchers
//!     → Freeze as immutable RouteTable
//! ```
//!
//! # Design Decisions
//! - Routes compiled once, immutable at runtime
//! - No regex in hot path (prefix, exact and suffix matching only)
//! - Deterministic: same path always yields the same class

pub mod matcher;
pub mod path;
pub mod router;

pub use path::{canonicalize, PathError};
pub use router::{RouteClass, RouteTable};
