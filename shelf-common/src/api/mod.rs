//! API-facing shared code
//!
//! Contains framework-independent pieces used by the HTTP layer of every
//! Shelf service.

pub mod auth;

pub use auth::{ApiKeyError, Authenticator, StaticKeyAuthenticator, API_KEY_HEADER};
