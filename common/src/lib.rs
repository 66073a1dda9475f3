pub mod config;
pub mod errors;
pub mod http;
pub mod models;
pub mod utils;

pub use crate::models::*;

/// Suites tested when the config file doesn't say otherwise.
pub const DEFAULT_SUITES: &[&str] = &["testing", "unstable", "experimental"];
