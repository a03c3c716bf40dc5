//! # Shelf Common Library
//!
//! Shared code for the Shelf backend-for-frontend services including:
//! - Error and result types
//! - Configuration loading (TOML + environment)
//! - API key verification
//! - Record helpers (identifier keys, index-by, reference merge)

pub mod api;
pub mod config;
pub mod error;
pub mod record;

pub use error::{Error, Result};
pub use record::Record;
