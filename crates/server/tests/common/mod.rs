//! Common test utilities for in-process API testing.
//!
//! The fixture builds the full router with a `MockSlskd` injected, so both
//! gateways can be driven exactly as Lidarr would drive them.

#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

use soulbridge_core::{
    load_config_from_str, ApiKeyAuthenticator, Authenticator, NoneAuthenticator,
    testing::MockSlskd,
};
use soulbridge_server::{create_router, AppState};

/// Re-export fixtures for test convenience
pub use soulbridge_core::testing::fixtures;

pub const TEST_API_KEY: &str = "lidarr-secret";

const MULTIPART_BOUNDARY: &str = "soulbridge-test-boundary";

/// In-process server with a controllable slskd.
pub struct TestFixture {
    pub router: Router,
    pub slskd: Arc<MockSlskd>,
    pub state: Arc<AppState>,
}

/// Response from a test request
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub content_type: Option<String>,
    pub text: String,
}

impl TestResponse {
    pub fn json(&self) -> Value {
        serde_json::from_str(&self.text).expect("response body is not JSON")
    }
}

impl TestFixture {
    pub fn new() -> Self {
        Self::build(None)
    }

    /// Fixture requiring `apikey` on the protected routes.
    pub fn with_api_key() -> Self {
        Self::build(Some(TEST_API_KEY))
    }

    fn build(api_key: Option<&str>) -> Self {
        let auth_section = match api_key {
            Some(key) => format!("method = \"api_key\"\napi_key = \"{}\"", key),
            None => "method = \"none\"".to_string(),
        };
        let config = load_config_from_str(&format!(
            r#"
[auth]
{}

[server]
public_url = "http://bridge.test:8686"

[slskd]
url = "http://slskd.invalid:5030"

[search]
poll_interval_ms = 10
timeout_secs = 2

[downloads]
path = "/data/slskd/downloads"
category = "music"
"#,
            auth_section
        ))
        .expect("test config must parse");

        let authenticator: Arc<dyn Authenticator> = match api_key {
            Some(key) => Arc::new(ApiKeyAuthenticator::new(key.to_string())),
            None => Arc::new(NoneAuthenticator),
        };

        let slskd = Arc::new(MockSlskd::new());
        let state = Arc::new(AppState::new(
            config,
            authenticator,
            Arc::clone(&slskd) as Arc<dyn soulbridge_core::SlskdApi>,
        ));
        let router = create_router(Arc::clone(&state));

        Self {
            router,
            slskd,
            state,
        }
    }

    pub async fn get(&self, uri: &str) -> TestResponse {
        let request = Request::builder()
            .method("GET")
            .uri(uri)
            .body(Body::empty())
            .unwrap();
        self.send(request).await
    }

    /// POST a multipart body carrying `file` as the `name` field, plus text fields.
    pub async fn post_multipart(
        &self,
        uri: &str,
        fields: &[(&str, &str)],
        file: Option<(&str, &str)>,
    ) -> TestResponse {
        let request = Request::builder()
            .method("POST")
            .uri(uri)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", MULTIPART_BOUNDARY),
            )
            .body(Body::from(multipart_body(fields, file)))
            .unwrap();
        self.send(request).await
    }

    pub async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let bytes = response.into_body().collect().await.unwrap().to_bytes();

        TestResponse {
            status,
            content_type,
            text: String::from_utf8_lossy(&bytes).into_owned(),
        }
    }
}

/// Encode text fields and an optional `(file_name, contents)` upload.
pub fn multipart_body(fields: &[(&str, &str)], file: Option<(&str, &str)>) -> String {
    let mut body = String::new();
    for (name, value) in fields {
        body.push_str(&format!(
            "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
            MULTIPART_BOUNDARY, name, value
        ));
    }
    if let Some((file_name, contents)) = file {
        body.push_str(&format!(
            "--{}\r\nContent-Disposition: form-data; name=\"name\"; filename=\"{}\"\r\nContent-Type: application/x-nzb\r\n\r\n{}\r\n",
            MULTIPART_BOUNDARY, file_name, contents
        ));
    }
    body.push_str(&format!("--{}--\r\n", MULTIPART_BOUNDARY));
    body
}

/// Count `<item>` elements in a feed.
pub fn item_count(xml: &str) -> usize {
    xml.matches("<item>").count()
}

/// Extract the first `<guid ...>value</guid>`.
pub fn first_guid(xml: &str) -> Option<String> {
    guids(xml).into_iter().next()
}

/// Every `<guid ...>value</guid>` in document order.
pub fn guids(xml: &str) -> Vec<String> {
    let mut found = Vec::new();
    let mut rest = xml;
    while let Some(start) = rest.find("<guid") {
        let Some(open_end) = rest[start..].find('>').map(|i| start + i + 1) else {
            break;
        };
        let Some(close) = rest[open_end..].find("</guid>").map(|i| open_end + i) else {
            break;
        };
        found.push(rest[open_end..close].to_string());
        rest = &rest[close..];
    }
    found
}
