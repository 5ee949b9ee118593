//! API key authentication.

use async_trait::async_trait;

use super::{AuthError, AuthRequest, Authenticator, Identity};

/// Validates requests against a configured API key.
///
/// Accepts the key in any of:
/// - `apikey` query parameter (what Lidarr sends)
/// - `X-Api-Key: <key>` header
/// - `Authorization: Bearer <key>` header
pub struct ApiKeyAuthenticator {
    expected_key: String,
}

impl ApiKeyAuthenticator {
    pub fn new(api_key: String) -> Self {
        Self {
            expected_key: api_key,
        }
    }

    fn extract_key<'a>(&self, request: &'a AuthRequest) -> Option<&'a str> {
        if let Some(key) = request.query.get("apikey").filter(|k| !k.is_empty()) {
            return Some(key);
        }

        if let Some(key) = request.headers.get("x-api-key") {
            return Some(key);
        }

        request.headers.get("authorization").and_then(|header| {
            header
                .strip_prefix("Bearer ")
                .or_else(|| header.strip_prefix("bearer "))
        })
    }
}

#[async_trait]
impl Authenticator for ApiKeyAuthenticator {
    async fn authenticate(&self, request: &AuthRequest) -> Result<Identity, AuthError> {
        let provided = self
            .extract_key(request)
            .ok_or(AuthError::NotAuthenticated)?;

        if constant_time_eq(provided.as_bytes(), self.expected_key.as_bytes()) {
            Ok(Identity {
                principal: "lidarr".to_string(),
                method: "api_key".to_string(),
            })
        } else {
            Err(AuthError::InvalidCredentials("Invalid API key".to_string()))
        }
    }

    fn method_name(&self) -> &'static str {
        "api_key"
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }

    a.iter().zip(b.iter()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
