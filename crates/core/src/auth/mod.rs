//! Request authentication for the emulated Lidarr-facing APIs.
//!
//! Lidarr passes its configured key as an `apikey` query parameter to both
//! the indexer and the download client, so authenticators see the query
//! string as well as the headers.

mod api_key;
mod none;

pub use api_key::ApiKeyAuthenticator;
pub use none::NoneAuthenticator;

use std::collections::HashMap;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

use crate::config::{AuthConfig, AuthMethod};

/// Request information for authentication
#[derive(Debug, Clone)]
pub struct AuthRequest {
    /// Header names are lowercased.
    pub headers: HashMap<String, String>,
    pub query: HashMap<String, String>,
}

/// Authenticated caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Identity {
    pub principal: String,
    pub method: String,
}

impl Identity {
    pub fn anonymous() -> Self {
        Self {
            principal: "anonymous".to_string(),
            method: "none".to_string(),
        }
    }
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Authentication required")]
    NotAuthenticated,

    #[error("Invalid credentials: {0}")]
    InvalidCredentials(String),

    #[error("Configuration error: {0}")]
    ConfigurationError(String),
}

#[async_trait]
pub trait Authenticator: Send + Sync {
    /// Authenticate a request and return the identity
    async fn authenticate(&self, request: &AuthRequest) -> Result<Identity, AuthError>;

    /// Name of this authentication method
    fn method_name(&self) -> &'static str;
}

/// Factory function to create authenticator from config
pub fn create_authenticator(config: &AuthConfig) -> Result<Box<dyn Authenticator>, AuthError> {
    match config.method {
        AuthMethod::None => Ok(Box::new(NoneAuthenticator)),
        AuthMethod::ApiKey => {
            let api_key = config
                .api_key
                .clone()
                .filter(|k| !k.is_empty())
                .ok_or_else(|| {
                    AuthError::ConfigurationError(
                        "api_key must be set when using api_key auth method".to_string(),
                    )
                })?;
            Ok(Box::new(ApiKeyAuthenticator::new(api_key)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_authenticator_none() {
        let config = AuthConfig {
            method: AuthMethod::None,
            api_key: None,
        };
        let auth = create_authenticator(&config).unwrap();
        assert_eq!(auth.method_name(), "none");
    }

    #[test]
    fn test_create_authenticator_api_key() {
        let config = AuthConfig {
            method: AuthMethod::ApiKey,
            api_key: Some("secret-key".to_string()),
        };
        let auth = create_authenticator(&config).unwrap();
        assert_eq!(auth.method_name(), "api_key");
    }

    #[test]
    fn test_create_authenticator_api_key_missing_key() {
        let config = AuthConfig {
            method: AuthMethod::ApiKey,
            api_key: Some(String::new()),
        };
        let result = create_authenticator(&config);
        assert!(matches!(result, Err(AuthError::ConfigurationError(_))));
    }
}
