use async_trait::async_trait;

use super::{AuthError, AuthRequest, Authenticator, Identity};

/// Accepts every request as anonymous.
#[derive(Debug, Default)]
pub struct NoneAuthenticator;

#[async_trait]
impl Authenticator for NoneAuthenticator {
    async fn authenticate(&self, _request: &AuthRequest) -> Result<Identity, AuthError> {
        Ok(Identity::anonymous())
    }

    fn method_name(&self) -> &'static str {
        "none"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[tokio::test]
    async fn test_none_authenticator_returns_anonymous() {
        let request = AuthRequest {
            headers: HashMap::new(),
            query: HashMap::new(),
        };

        let identity = NoneAuthenticator.authenticate(&request).await.unwrap();
        assert_eq!(identity, Identity::anonymous());
    }
}
