//! Identity subsystem.
//!
//! # Data Flow
//! ```text
//! Cookie header
//!     → jar.rs (SessionJar: request cookies + outbound baseline)
//!     → storage.rs (decode chunked / base64 session cookie)
//!     → client.rs (AuthClient: refresh if expired, fetch user)
//!         → backend.rs (AuthBackend trait)
//!         → gotrue.rs (HTTP calls to the identity provider)
//!     → rotated cookies written back through the jar
//!
//! Unlock flag:
//!     profile.rs (ProfileStore trait, PostgREST lookup)
//! ```
//!
//! # Design Decisions
//! - Token verification is the provider's job; the gate only reads expiry
//! - Network seams are traits so tests can count and script calls
//! - Cookie writes always go through the jar, never straight to a response

pub mod backend;
pub mod client;
pub mod error;
pub mod gotrue;
pub mod jar;
pub mod profile;
pub mod storage;
pub mod types;

pub use backend::AuthBackend;
pub use client::{AuthClient, Authenticated, SessionSettings};
pub use error::{AuthError, AuthResult};
pub use gotrue::GoTrueBackend;
pub use jar::{Baseline, SessionJar};
pub use profile::{ProfileStore, RestProfileStore};
pub use storage::CookieAttributes;
pub use types::{Session, SignUp, User};
