//! # beatfunc common library
//!
//! Shared code for the beatfunc service crates:
//! - Error type
//! - Bootstrap configuration (TOML) and work directory resolution
//! - Content fingerprinting for the analysis cache

pub mod config;
pub mod error;
pub mod fingerprint;

pub use error::{Error, Result};
pub use fingerprint::Fingerprint;
