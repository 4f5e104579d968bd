//! # TNS Common Library
//!
//! Shared code for the transient registry submission tools:
//! - Error types
//! - TOML bootstrap configuration and config file discovery
//! - Logging initialisation

pub mod config;
pub mod error;
pub mod logging;

pub use error::{Error, Result};
