use super::{types::Config, AuthMethod, ConfigError};

/// Validate configuration
/// Currently validates:
/// - Server port is not 0
/// - slskd URL is present
/// - An API key is configured when api_key auth is selected
/// - Search polling interval and deadline are non-zero
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.server.port == 0 {
        return Err(ConfigError::ValidationError(
            "server.port cannot be 0".to_string(),
        ));
    }

    if config.slskd.url.trim().is_empty() {
        return Err(ConfigError::ValidationError(
            "slskd.url cannot be empty".to_string(),
        ));
    }

    if config.auth.method == AuthMethod::ApiKey
        && config.auth.api_key.as_deref().is_none_or(str::is_empty)
    {
        return Err(ConfigError::ValidationError(
            "auth.api_key must be set when auth.method = \"api_key\"".to_string(),
        ));
    }

    if config.search.poll_interval_ms == 0 {
        return Err(ConfigError::ValidationError(
            "search.poll_interval_ms cannot be 0".to_string(),
        ));
    }

    if config.search.timeout_secs == 0 {
        return Err(ConfigError::ValidationError(
            "search.timeout_secs cannot be 0".to_string(),
        ));
    }

    Ok(())
}
