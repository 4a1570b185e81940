//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware stack)
//!     → request.rs (request ID)
//!     → gate (session resolution, redirect or forward)
//!     → handlers.rs (session endpoints) | server.rs (upstream forward)
//!     → Send to client
//! ```

pub mod handlers;
pub mod request;
pub mod server;

pub use handlers::{auth_routes, AuthResponse, LoginRequest, SessionRequest, SignupRequest};
pub use request::{request_id, MakeRequestUuidV4, X_REQUEST_ID};
pub use server::{HttpServer, ServerError, UpstreamState};
