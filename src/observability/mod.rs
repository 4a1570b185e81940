//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! gate, auth, http
//!     → logging.rs (tracing subscriber: pretty or JSON, RUST_LOG aware)
//!     → metrics.rs (dispositions, provider calls, resolution latency,
//!                   upstream statuses)
//!
//! Exported:
//!     → stdout
//!     → Prometheus scrape endpoint, when enabled
//! ```
//!
//! # Design Decisions
//! - Every request runs inside a span carrying its `x-request-id`
//! - Provider failures are logged once, where they are folded into
//!   "no user", and counted by error kind
//! - Metric labels are static strings; user IDs never become labels

pub mod logging;
pub mod metrics;
