//! Client configuration
//!
//! Loaded from TOML with environment overrides:
//!
//! ```toml
//! [api]
//! base_url = "https://api.worklane.example"
//! timeout_secs = 30
//!
//! [auth]
//! credentials_path = "/home/dev/.worklane/tokens.json"
//! ```
//!
//! `WORKLANE_BASE_URL` overrides `[api].base_url`. `WORKLANE_REFRESH_TOKEN`
//! supplies a bootstrap refresh token for headless environments (CI jobs,
//! service accounts); it is wrapped in [`Secret`] the moment it is read and
//! never written back to disk by this module.

use std::path::{Path, PathBuf};
use std::time::Duration;

use common::{Error, Result, Secret};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct ClientConfig {
    pub api: ApiConfig,
    #[serde(default)]
    pub auth: AuthConfig,
}

#[derive(Debug, Deserialize)]
pub struct ApiConfig {
    /// Base URL of the API, scheme included, no trailing slash.
    pub base_url: String,
    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize)]
pub struct AuthConfig {
    /// Where the token pair is persisted between runs.
    #[serde(default = "default_credentials_path")]
    pub credentials_path: PathBuf,
    /// Optional bootstrap refresh token. Only consulted when the
    /// credential file holds no session.
    #[serde(default)]
    pub refresh_token: Option<Secret<String>>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            credentials_path: default_credentials_path(),
            refresh_token: None,
        }
    }
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_credentials_path() -> PathBuf {
    PathBuf::from("worklane-tokens.json")
}

impl ClientConfig {
    /// Load configuration from a TOML file, apply environment overrides,
    /// and validate the result.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let mut config: ClientConfig = toml::from_str(&contents)?;
        config.apply_env();
        config.normalize();
        config.validate()?;
        Ok(config)
    }

    /// Programmatic configuration with defaults for everything but the
    /// base URL.
    pub fn new(base_url: impl Into<String>) -> Self {
        let mut config = Self {
            api: ApiConfig {
                base_url: base_url.into(),
                timeout_secs: default_timeout_secs(),
            },
            auth: AuthConfig::default(),
        };
        config.normalize();
        config
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.api.timeout_secs)
    }

    fn apply_env(&mut self) {
        if let Ok(url) = std::env::var("WORKLANE_BASE_URL") {
            if !url.is_empty() {
                self.api.base_url = url;
            }
        }
        if let Ok(token) = std::env::var("WORKLANE_REFRESH_TOKEN") {
            if !token.is_empty() {
                self.auth.refresh_token = Some(Secret::new(token));
            }
        }
    }

    fn normalize(&mut self) {
        self.api.base_url = self.api.base_url.trim_end_matches('/').to_string();
    }

    fn validate(&self) -> Result<()> {
        if !self.api.base_url.starts_with("http://")
            && !self.api.base_url.starts_with("https://")
        {
            return Err(Error::Config(format!(
                "api.base_url must start with http:// or https://, got {:?}",
                self.api.base_url
            )));
        }
        if self.api.timeout_secs == 0 {
            return Err(Error::Config(
                "api.timeout_secs must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Mutex;

    // Environment variables are process-global; every test that reads or
    // writes them holds this for its whole body.
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    unsafe fn set_env(key: &str, value: &str) {
        unsafe { std::env::set_var(key, value) }
    }

    unsafe fn remove_env(key: &str) {
        unsafe { std::env::remove_var(key) }
    }

    fn clear_overrides() {
        unsafe {
            remove_env("WORKLANE_BASE_URL");
            remove_env("WORKLANE_REFRESH_TOKEN");
        }
    }

    fn test_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "worklane-client-config-{name}-{}",
            std::process::id()
        ));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn write_config(dir: &Path, contents: &str) -> PathBuf {
        let path = dir.join("client.toml");
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn loads_full_config() {
        let _guard = ENV_MUTEX.lock().unwrap();
        clear_overrides();
        let dir = test_dir("full");
        let path = write_config(
            &dir,
            r#"
[api]
base_url = "https://api.worklane.example"
timeout_secs = 10

[auth]
credentials_path = "/tmp/worklane/tokens.json"
"#,
        );

        let config = ClientConfig::load(&path).unwrap();
        assert_eq!(config.api.base_url, "https://api.worklane.example");
        assert_eq!(config.timeout(), Duration::from_secs(10));
        assert_eq!(
            config.auth.credentials_path,
            PathBuf::from("/tmp/worklane/tokens.json")
        );
        assert!(config.auth.refresh_token.is_none());

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn defaults_apply_when_sections_are_sparse() {
        let _guard = ENV_MUTEX.lock().unwrap();
        clear_overrides();
        let dir = test_dir("defaults");
        let path = write_config(
            &dir,
            r#"
[api]
base_url = "https://api.worklane.example"
"#,
        );

        let config = ClientConfig::load(&path).unwrap();
        assert_eq!(config.api.timeout_secs, 30);
        assert_eq!(
            config.auth.credentials_path,
            PathBuf::from("worklane-tokens.json")
        );

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let _guard = ENV_MUTEX.lock().unwrap();
        clear_overrides();
        let err = ClientConfig::load(Path::new("/nonexistent/worklane/client.toml")).unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn invalid_toml_is_a_parse_error() {
        let _guard = ENV_MUTEX.lock().unwrap();
        clear_overrides();
        let dir = test_dir("invalid");
        let path = write_config(&dir, "[api\nbase_url = ");

        let err = ClientConfig::load(&path).unwrap_err();
        assert!(matches!(err, Error::Toml(_)));

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let _guard = ENV_MUTEX.lock().unwrap();
        clear_overrides();
        let dir = test_dir("zero-timeout");
        let path = write_config(
            &dir,
            r#"
[api]
base_url = "https://api.worklane.example"
timeout_secs = 0
"#,
        );

        let err = ClientConfig::load(&path).unwrap_err();
        assert!(err.to_string().contains("timeout_secs"));

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn non_http_scheme_is_rejected() {
        let _guard = ENV_MUTEX.lock().unwrap();
        clear_overrides();
        let dir = test_dir("scheme");
        let path = write_config(
            &dir,
            r#"
[api]
base_url = "ftp://api.worklane.example"
"#,
        );

        let err = ClientConfig::load(&path).unwrap_err();
        assert!(err.to_string().contains("base_url"));

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn trailing_slash_is_trimmed() {
        let _guard = ENV_MUTEX.lock().unwrap();
        clear_overrides();
        let dir = test_dir("slash");
        let path = write_config(
            &dir,
            r#"
[api]
base_url = "https://api.worklane.example/"
"#,
        );

        let config = ClientConfig::load(&path).unwrap();
        assert_eq!(config.api.base_url, "https://api.worklane.example");

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn env_overrides_base_url() {
        let _guard = ENV_MUTEX.lock().unwrap();
        clear_overrides();
        let dir = test_dir("env-url");
        let path = write_config(
            &dir,
            r#"
[api]
base_url = "https://api.worklane.example"
"#,
        );

        unsafe { set_env("WORKLANE_BASE_URL", "https://staging.worklane.example/") };
        let config = ClientConfig::load(&path).unwrap();
        assert_eq!(config.api.base_url, "https://staging.worklane.example");

        clear_overrides();
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn env_supplies_bootstrap_token_and_stays_redacted() {
        let _guard = ENV_MUTEX.lock().unwrap();
        clear_overrides();
        let dir = test_dir("env-token");
        let path = write_config(
            &dir,
            r#"
[api]
base_url = "https://api.worklane.example"
"#,
        );

        unsafe { set_env("WORKLANE_REFRESH_TOKEN", "rt_ci_bootstrap") };
        let config = ClientConfig::load(&path).unwrap();
        let token = config.auth.refresh_token.as_ref().unwrap();
        assert_eq!(token.expose(), "rt_ci_bootstrap");
        assert!(!format!("{config:?}").contains("rt_ci_bootstrap"));

        clear_overrides();
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn empty_env_values_are_ignored() {
        let _guard = ENV_MUTEX.lock().unwrap();
        clear_overrides();
        let dir = test_dir("env-empty");
        let path = write_config(
            &dir,
            r#"
[api]
base_url = "https://api.worklane.example"
"#,
        );

        unsafe { set_env("WORKLANE_BASE_URL", "") };
        unsafe { set_env("WORKLANE_REFRESH_TOKEN", "") };
        let config = ClientConfig::load(&path).unwrap();
        assert_eq!(config.api.base_url, "https://api.worklane.example");
        assert!(config.auth.refresh_token.is_none());

        clear_overrides();
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn bootstrap_token_can_come_from_the_file() {
        let _guard = ENV_MUTEX.lock().unwrap();
        clear_overrides();
        let dir = test_dir("file-token");
        let path = write_config(
            &dir,
            r#"
[api]
base_url = "https://api.worklane.example"

[auth]
refresh_token = "rt_from_file"
"#,
        );

        let config = ClientConfig::load(&path).unwrap();
        assert_eq!(
            config.auth.refresh_token.as_ref().unwrap().expose(),
            "rt_from_file"
        );

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
