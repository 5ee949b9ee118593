//! Config file discovery and loading.
//!
//! The TOML file is read from `SOULBRIDGE_CONFIG` (default `config.toml`).
//! Any key can then be overridden from the environment with the `SOULBRIDGE_`
//! prefix and `__` between sections, e.g.:
//!
//! - `SOULBRIDGE_SLSKD__URL=http://slskd:5030`
//! - `SOULBRIDGE_SLSKD__API_KEY=...`
//! - `SOULBRIDGE_AUTH__API_KEY=...` (the key Lidarr sends as `apikey`)
//! - `SOULBRIDGE_SERVER__PUBLIC_URL=http://soulbridge:8686`
//! - `SOULBRIDGE_DOWNLOADS__PATH=/downloads`
//!
//! Secrets are usually supplied this way so the file can stay in a repo.

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use std::ffi::OsString;
use std::path::{Path, PathBuf};

use super::{types::Config, ConfigError};

/// Prefix for environment overrides.
pub const ENV_PREFIX: &str = "SOULBRIDGE_";

/// Environment variable naming the config file.
pub const CONFIG_PATH_VAR: &str = "SOULBRIDGE_CONFIG";

pub const DEFAULT_CONFIG_PATH: &str = "config.toml";

/// Config file path from `SOULBRIDGE_CONFIG`, falling back to `config.toml`.
pub fn config_path() -> PathBuf {
    config_path_from(std::env::var_os(CONFIG_PATH_VAR))
}

fn config_path_from(value: Option<OsString>) -> PathBuf {
    match value {
        Some(v) if !v.is_empty() => PathBuf::from(v),
        _ => PathBuf::from(DEFAULT_CONFIG_PATH),
    }
}

/// Load configuration from file with `SOULBRIDGE_*` environment overrides
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    load_with_env(path, Env::prefixed(ENV_PREFIX).split("__"))
}

fn load_with_env(path: &Path, env: Env) -> Result<Config, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::FileNotFound(format!(
            "{} (set {} to point elsewhere)",
            path.display(),
            CONFIG_PATH_VAR
        )));
    }

    Figment::new()
        .merge(Toml::file(path))
        // CONFIG is the file selector, not a config key.
        .merge(env.ignore(&["CONFIG"]))
        .extract()
        .map_err(|e| ConfigError::ParseError(e.to_string()))
}

/// Load configuration from TOML string (useful for testing)
pub fn load_config_from_str(toml_str: &str) -> Result<Config, ConfigError> {
    toml::from_str(toml_str).map_err(|e| ConfigError::ParseError(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_config_from_str_valid() {
        let toml = r#"
[auth]
method = "none"

[server]
port = 9000

[slskd]
url = "http://localhost:5030"
"#;
        let config = load_config_from_str(toml).unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.slskd.url, "http://localhost:5030");
    }

    #[test]
    fn test_load_config_from_str_missing_auth() {
        let toml = r#"
[slskd]
url = "http://localhost:5030"
"#;
        let result = load_config_from_str(toml);
        assert!(matches!(result, Err(ConfigError::ParseError(_))));
    }

    #[test]
    fn test_load_config_file_not_found() {
        let result = load_config(Path::new("/nonexistent/soulbridge.toml"));
        assert!(matches!(result, Err(ConfigError::FileNotFound(_))));
    }

    #[test]
    fn test_load_config_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(
            temp_file,
            r#"
[auth]
method = "none"

[server]
host = "127.0.0.1"
port = 3000

[slskd]
url = "http://127.0.0.1:5030"
api_key = "key"

[search]
timeout_secs = 30
"#
        )
        .unwrap();

        let config = load_config(temp_file.path()).unwrap();
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.server.host.to_string(), "127.0.0.1");
        assert_eq!(config.search.timeout_secs, 30);
        assert_eq!(config.search.poll_interval_ms, 1000);
    }

    #[test]
    fn test_config_path_from_env_value() {
        assert_eq!(config_path_from(None), PathBuf::from("config.toml"));
        assert_eq!(config_path_from(Some(OsString::new())), PathBuf::from("config.toml"));
        assert_eq!(
            config_path_from(Some(OsString::from("/etc/soulbridge/config.toml"))),
            PathBuf::from("/etc/soulbridge/config.toml")
        );
    }

    #[test]
    fn test_minimal_file_gets_bridge_defaults() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(
            temp_file,
            r#"
[auth]
method = "none"

[slskd]
url = "http://slskd:5030"
"#
        )
        .unwrap();

        let config = load_config(temp_file.path()).unwrap();
        assert_eq!(config.server.port, 8686);
        assert_eq!(config.slskd.timeout_secs, 10);
        assert!(config.slskd.retry_enabled);
        assert_eq!(config.slskd.max_retries, 2);
        assert_eq!(config.downloads.category, "music");
        assert!(config.server.public_url.is_none());
    }

    #[test]
    fn test_env_overrides_nested_keys() {
        // Private prefix so parallel tests never see these variables.
        let prefix = "SOULBRIDGE_LOADER_TEST_";
        std::env::set_var("SOULBRIDGE_LOADER_TEST_SLSKD__API_KEY", "from-env");
        std::env::set_var("SOULBRIDGE_LOADER_TEST_SERVER__PORT", "9191");
        std::env::set_var("SOULBRIDGE_LOADER_TEST_CONFIG", "/elsewhere.toml");

        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(
            temp_file,
            r#"
[auth]
method = "none"

[slskd]
url = "http://slskd:5030"
api_key = "from-file"
"#
        )
        .unwrap();

        let config = load_with_env(temp_file.path(), Env::prefixed(prefix).split("__")).unwrap();
        assert_eq!(config.slskd.api_key, "from-env");
        assert_eq!(config.server.port, 9191);
        assert_eq!(config.slskd.url, "http://slskd:5030");
    }
}
