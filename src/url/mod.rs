//! URL handling module
//!
//! This module provides URL normalization and host comparison for source
//! registration and link discovery.

mod host;
mod normalize;

pub use host::{extract_host, same_site};
pub use normalize::normalize_url;
