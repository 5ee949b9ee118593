use serde::{Deserialize, Serialize};
use std::net::IpAddr;

/// Root configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub auth: AuthConfig,
    #[serde(default)]
    pub server: ServerConfig,
    pub slskd: SlskdConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub downloads: DownloadsConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Externally reachable base URL, used for Torznab enclosure links.
    /// When unset the request's Host header is used.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_url: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            public_url: None,
        }
    }
}

fn default_host() -> IpAddr {
    IpAddr::V4(std::net::Ipv4Addr::UNSPECIFIED)
}

fn default_port() -> u16 {
    8686
}

/// Authentication configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AuthConfig {
    pub method: AuthMethod,
    /// API key expected from Lidarr (required when method = "api_key")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AuthMethod {
    None,
    ApiKey,
}

/// slskd daemon connection settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SlskdConfig {
    /// slskd base URL (e.g., "http://localhost:5030")
    pub url: String,
    /// slskd API key
    #[serde(default)]
    pub api_key: String,
    /// Per-call timeout in seconds (default: 10)
    #[serde(default = "default_slskd_timeout")]
    pub timeout_secs: u32,
    /// Retry transient failures (default: true)
    #[serde(default = "default_true")]
    pub retry_enabled: bool,
    /// Retries after the first attempt (default: 2)
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Base delay for exponential backoff in milliseconds (default: 500)
    #[serde(default = "default_retry_base_delay")]
    pub retry_base_delay_ms: u64,
}

fn default_slskd_timeout() -> u32 {
    10
}

fn default_true() -> bool {
    true
}

fn default_max_retries() -> u32 {
    2
}

fn default_retry_base_delay() -> u64 {
    500
}

/// Search pipeline and cache settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SearchConfig {
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,
    /// Deadline for a search to report completion
    #[serde(default = "default_search_timeout")]
    pub timeout_secs: u64,
    /// How long grouped results for a query are reused
    #[serde(default = "default_cache_ttl")]
    pub cache_ttl_secs: u64,
    /// How long a single result stays downloadable by guid
    #[serde(default = "default_result_ttl")]
    pub result_ttl_secs: u64,
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval(),
            timeout_secs: default_search_timeout(),
            cache_ttl_secs: default_cache_ttl(),
            result_ttl_secs: default_result_ttl(),
            sweep_interval_secs: default_sweep_interval(),
        }
    }
}

fn default_poll_interval() -> u64 {
    1000
}

fn default_search_timeout() -> u64 {
    15
}

fn default_cache_ttl() -> u64 {
    30 * 60
}

fn default_result_ttl() -> u64 {
    60 * 60
}

fn default_sweep_interval() -> u64 {
    5 * 60
}

/// Download client emulation settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DownloadsConfig {
    /// Directory reported to Lidarr as the completed-download location
    #[serde(default = "default_download_path")]
    pub path: String,
    /// The single SABnzbd category exposed
    #[serde(default = "default_category")]
    pub category: String,
}

impl Default for DownloadsConfig {
    fn default() -> Self {
        Self {
            path: default_download_path(),
            category: default_category(),
        }
    }
}

fn default_download_path() -> String {
    "/downloads".to_string()
}

fn default_category() -> String {
    "music".to_string()
}

/// Sanitized config for API responses (secrets redacted)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub auth: SanitizedAuthConfig,
    pub server: ServerConfig,
    pub slskd: SanitizedSlskdConfig,
    pub search: SearchConfig,
    pub downloads: DownloadsConfig,
}

#[derive(Debug, Clone, Serialize)]
pub struct SanitizedAuthConfig {
    pub method: String,
    pub api_key_configured: bool,
}

/// Sanitized slskd config (API key hidden)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedSlskdConfig {
    pub url: String,
    pub api_key_configured: bool,
    pub timeout_secs: u32,
    pub retry_enabled: bool,
    pub max_retries: u32,
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        Self {
            auth: SanitizedAuthConfig {
                method: match config.auth.method {
                    AuthMethod::None => "none".to_string(),
                    AuthMethod::ApiKey => "api_key".to_string(),
                },
                api_key_configured: config
                    .auth
                    .api_key
                    .as_ref()
                    .is_some_and(|k| !k.is_empty()),
            },
            server: config.server.clone(),
            slskd: SanitizedSlskdConfig {
                url: config.slskd.url.clone(),
                api_key_configured: !config.slskd.api_key.is_empty(),
                timeout_secs: config.slskd.timeout_secs,
                retry_enabled: config.slskd.retry_enabled,
                max_retries: config.slskd.max_retries,
            },
            search: config.search.clone(),
            downloads: config.downloads.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
[auth]
method = "none"

[slskd]
url = "http://localhost:5030"
"#;

    #[test]
    fn test_deserialize_minimal_config_uses_defaults() {
        let config: Config = toml::from_str(MINIMAL).unwrap();
        assert_eq!(config.auth.method, AuthMethod::None);
        assert_eq!(config.server.port, 8686);
        assert_eq!(config.server.host.to_string(), "0.0.0.0");
        assert_eq!(config.slskd.timeout_secs, 10);
        assert!(config.slskd.retry_enabled);
        assert_eq!(config.slskd.max_retries, 2);
        assert_eq!(config.slskd.retry_base_delay_ms, 500);
        assert_eq!(config.search.poll_interval_ms, 1000);
        assert_eq!(config.search.timeout_secs, 15);
        assert_eq!(config.search.cache_ttl_secs, 1800);
        assert_eq!(config.downloads.category, "music");
        assert_eq!(config.downloads.path, "/downloads");
    }

    #[test]
    fn test_deserialize_missing_slskd_fails() {
        let toml = r#"
[auth]
method = "none"
"#;
        let result: Result<Config, _> = toml::from_str(toml);
        assert!(result.is_err());
    }

    #[test]
    fn test_deserialize_api_key_auth() {
        let toml = r#"
[auth]
method = "api_key"
api_key = "lidarr-key"

[slskd]
url = "http://slskd:5030"
api_key = "abc"
retry_enabled = false

[downloads]
path = "/data/slskd"
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.auth.method, AuthMethod::ApiKey);
        assert_eq!(config.auth.api_key.as_deref(), Some("lidarr-key"));
        assert!(!config.slskd.retry_enabled);
        assert_eq!(config.downloads.path, "/data/slskd");
    }

    #[test]
    fn test_sanitized_config_hides_secrets() {
        let toml = r#"
[auth]
method = "api_key"
api_key = "lidarr-key"

[slskd]
url = "http://slskd:5030"
api_key = "secret"
"#;
        let config: Config = toml::from_str(toml).unwrap();
        let sanitized = SanitizedConfig::from(&config);
        assert_eq!(sanitized.auth.method, "api_key");
        assert!(sanitized.auth.api_key_configured);
        assert!(sanitized.slskd.api_key_configured);

        let json = serde_json::to_string(&sanitized).unwrap();
        assert!(!json.contains("secret"));
        assert!(!json.contains("lidarr-key"));
    }
}
