//! Shared utilities: duration parsing and configuration validation.

pub mod duration;
pub mod validation;

pub use duration::parse_duration_to_seconds;
pub use validation::{validate_distribution, validate_probability, validate_token_amount};
