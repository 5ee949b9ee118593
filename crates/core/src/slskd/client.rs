//! slskd REST client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use crate::config::SlskdConfig;
use crate::metrics::SLSKD_REQUESTS;
use crate::resilience::{ResilientCaller, RetryPolicy};

use super::{DownloadRequest, PeerResponse, PeerTransfer, SearchSession, SlskdApi, SlskdError};

/// slskd client talking to `<url>/api/v0`.
pub struct SlskdClient {
    client: Client,
    base_url: String,
    api_key: String,
    caller: ResilientCaller,
}

impl SlskdClient {
    /// Create a new slskd client.
    pub fn new(config: &SlskdConfig) -> Result<Self, SlskdError> {
        let client = Client::builder()
            .build()
            .map_err(|e| SlskdError::ConnectionFailed(format!("HTTP client setup: {}", e)))?;

        let retry = config.retry_enabled.then(|| {
            RetryPolicy::new(
                config.max_retries,
                Duration::from_millis(config.retry_base_delay_ms),
            )
        });

        Ok(Self {
            client,
            base_url: format!("{}/api/v0", config.url.trim_end_matches('/')),
            api_key: config.api_key.clone(),
            caller: ResilientCaller::new(Duration::from_secs(config.timeout_secs as u64), retry),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Issue one request through the resilience layer and return the body.
    async fn execute(
        &self,
        operation: &str,
        method: Method,
        path: &str,
        body: Option<serde_json::Value>,
    ) -> Result<String, SlskdError> {
        let url = self.url(path);
        debug!(operation, %method, url = %url, "slskd request");

        let result = self
            .caller
            .call(operation, || {
                let mut request = self
                    .client
                    .request(method.clone(), &url)
                    .header("X-API-Key", &self.api_key);
                if let Some(body) = &body {
                    request = request.json(body);
                }

                async move {
                    let response = request.send().await.map_err(map_transport_error)?;
                    let status = response.status();
                    let text = response.text().await.map_err(map_transport_error)?;

                    if !status.is_success() {
                        return Err(SlskdError::Http {
                            status: status.as_u16(),
                            body: text.chars().take(200).collect(),
                        });
                    }
                    Ok(text)
                }
            })
            .await;

        let outcome = if result.is_ok() { "success" } else { "failure" };
        SLSKD_REQUESTS.with_label_values(&[operation, outcome]).inc();
        result
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        operation: &str,
        path: &str,
    ) -> Result<T, SlskdError> {
        let body = self.execute(operation, Method::GET, path, None).await?;
        serde_json::from_str(&body).map_err(|e| SlskdError::Decode(e.to_string()))
    }
}

fn map_transport_error(e: reqwest::Error) -> SlskdError {
    if e.is_timeout() || e.is_connect() || e.is_request() {
        SlskdError::ConnectionFailed(e.to_string())
    } else {
        SlskdError::Decode(e.to_string())
    }
}

/// `GET /transfers/downloads` nests transfers by user, then directory.
#[derive(Debug, Deserialize)]
struct UserTransfers {
    #[serde(default)]
    directories: Vec<DirectoryTransfers>,
}

#[derive(Debug, Deserialize)]
struct DirectoryTransfers {
    #[serde(default)]
    files: Vec<PeerTransfer>,
}

fn flatten_transfers(users: Vec<UserTransfers>) -> Vec<PeerTransfer> {
    users
        .into_iter()
        .flat_map(|user| user.directories)
        .flat_map(|dir| dir.files)
        .collect()
}

#[async_trait]
impl SlskdApi for SlskdClient {
    async fn start_search(&self, id: &str, text: &str) -> Result<SearchSession, SlskdError> {
        let body = json!({ "id": id, "searchText": text });
        let response = self
            .execute("start_search", Method::POST, "/searches", Some(body))
            .await?;
        serde_json::from_str(&response).map_err(|e| SlskdError::Decode(e.to_string()))
    }

    async fn search_state(&self, id: &str) -> Result<SearchSession, SlskdError> {
        self.get_json("search_state", &format!("/searches/{}", urlencoding::encode(id)))
            .await
    }

    async fn search_responses(&self, id: &str) -> Result<Vec<PeerResponse>, SlskdError> {
        self.get_json(
            "search_responses",
            &format!("/searches/{}/responses", urlencoding::encode(id)),
        )
        .await
    }

    async fn delete_search(&self, id: &str) -> Result<(), SlskdError> {
        self.execute(
            "delete_search",
            Method::DELETE,
            &format!("/searches/{}", urlencoding::encode(id)),
            None,
        )
        .await
        .map(|_| ())
    }

    async fn enqueue_downloads(
        &self,
        username: &str,
        files: &[DownloadRequest],
    ) -> Result<(), SlskdError> {
        let body = serde_json::to_value(files).map_err(|e| SlskdError::Decode(e.to_string()))?;
        self.execute(
            "enqueue_downloads",
            Method::POST,
            &format!("/transfers/downloads/{}", urlencoding::encode(username)),
            Some(body),
        )
        .await
        .map(|_| ())
    }

    async fn list_downloads(&self) -> Result<Vec<PeerTransfer>, SlskdError> {
        let users: Vec<UserTransfers> = self
            .get_json("list_downloads", "/transfers/downloads")
            .await?;
        Ok(flatten_transfers(users))
    }

    async fn cancel_download(&self, username: &str, id: &str) -> Result<(), SlskdError> {
        self.execute(
            "cancel_download",
            Method::DELETE,
            &format!(
                "/transfers/downloads/{}/{}",
                urlencoding::encode(username),
                urlencoding::encode(id)
            ),
            None,
        )
        .await
        .map(|_| ())
    }

    async fn ping(&self) -> Result<(), SlskdError> {
        self.execute("ping", Method::GET, "/application", None)
            .await
            .map(|_| ())
    }
}
