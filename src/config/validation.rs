//! Semantic validation of construction options.

use crate::config::schema::ProxyOptions;

/// Error type for invalid construction options.
///
/// Surfaced synchronously from construction; fatal to the instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigError(pub String);

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Invalid configuration: {}", self.0)
    }
}

impl std::error::Error for ConfigError {}

/// Validate proxy options for semantic correctness.
pub fn validate_options(options: &ProxyOptions) -> Result<(), ConfigError> {
    // A bounded channel needs at least one slot; there is no rendezvous mode.
    if options.buffer_size == 0 {
        return Err(ConfigError("buffer_size must be at least 1".to_string()));
    }

    Ok(())
}
