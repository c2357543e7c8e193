use crate::allow_list::AllowList;
use serde::Deserialize;
use shared::http::Timeouts;
use std::fmt;
use std::time::Duration;
use thiserror::Error;
use url::Url;

pub const TOKEN_ENV: &str = "GITHUB_ACCESS_TOKEN";
pub const ALLOWED_USERS_ENV: &str = "ALLOWED_USERS";

const DEFAULT_API_URL: &str = "https://api.github.com";
const DEFAULT_TIMEOUT_SECS: u64 = 15;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("No {0} set in the environment")]
    MissingCredential(&'static str),

    #[error("{0} contains characters that are not allowed in an HTTP header")]
    InvalidCredential(&'static str),

    #[error("invalid config: {0}")]
    Validation(#[from] ValidationError),

    #[error("could not build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),
}

#[derive(Error, Debug, PartialEq)]
pub enum ValidationError {
    #[error("Port cannot be 0")]
    InvalidPort,

    #[error("{0} cannot be 0")]
    ZeroTimeout(&'static str),

    #[error("invalid GitHub API URL {url:?}: {reason}")]
    InvalidApiUrl { url: String, reason: String },
}

/// Settings for the badge service. Every field has a default, so an empty
/// document is a valid config.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub listener: Listener,
    /// Deadline for receiving request headers.
    pub read_timeout_secs: u64,
    /// Deadline for producing a response once the request has arrived.
    pub write_timeout_secs: u64,
    pub github: GitHubConfig,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            listener: Listener::default(),
            read_timeout_secs: DEFAULT_TIMEOUT_SECS,
            write_timeout_secs: DEFAULT_TIMEOUT_SECS,
            github: GitHubConfig::default(),
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.listener.validate()?;

        if self.read_timeout_secs == 0 {
            return Err(ValidationError::ZeroTimeout("read_timeout_secs"));
        }
        if self.write_timeout_secs == 0 {
            return Err(ValidationError::ZeroTimeout("write_timeout_secs"));
        }

        self.github.validate()
    }

    pub fn timeouts(&self) -> Timeouts {
        Timeouts {
            header_read: Duration::from_secs(self.read_timeout_secs),
            request: Duration::from_secs(self.write_timeout_secs),
        }
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct Listener {
    pub host: String,
    pub port: u16,
}

impl Default for Listener {
    fn default() -> Self {
        Listener {
            host: "127.0.0.1".into(),
            port: 80,
        }
    }
}

impl Listener {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.port == 0 {
            return Err(ValidationError::InvalidPort);
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct GitHubConfig {
    /// Base URL of the REST API. Point this at a GitHub Enterprise
    /// instance (`https://host/api/v3`) or a local fake.
    pub api_url: String,
    pub timeout_secs: u64,
}

impl Default for GitHubConfig {
    fn default() -> Self {
        GitHubConfig {
            api_url: DEFAULT_API_URL.into(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl GitHubConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.parsed_api_url()?;
        if self.timeout_secs == 0 {
            return Err(ValidationError::ZeroTimeout("github.timeout_secs"));
        }
        Ok(())
    }

    pub fn parsed_api_url(&self) -> Result<Url, ValidationError> {
        let invalid = |reason: String| ValidationError::InvalidApiUrl {
            url: self.api_url.clone(),
            reason,
        };

        let url = Url::parse(&self.api_url).map_err(|e| invalid(e.to_string()))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(invalid(format!("unsupported scheme {}", url.scheme())));
        }
        if url.cannot_be_a_base() {
            return Err(invalid("not a base URL".into()));
        }
        Ok(url)
    }
}

/// Values that come from the process environment rather than the config file.
pub struct Credentials {
    pub token: String,
    pub allow_list: AllowList,
}

impl Credentials {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let token = lookup(TOKEN_ENV)
            .filter(|token| !token.is_empty())
            .ok_or(ConfigError::MissingCredential(TOKEN_ENV))?;

        let allow_list = lookup(ALLOWED_USERS_ENV)
            .map(|users| AllowList::parse(&users))
            .unwrap_or_default();

        Ok(Credentials { token, allow_list })
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("token", &"<redacted>")
            .field("allow_list", &self.allow_list)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config: Config = serde_yaml::from_str("{}").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.listener.host, "127.0.0.1");
        assert_eq!(config.listener.port, 80);
        assert_eq!(config.github.api_url, "https://api.github.com");
        assert_eq!(config.timeouts(), Timeouts::default());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_config() {
        let yaml = r#"
            listener:
                host: 0.0.0.0
                port: 8080
            write_timeout_secs: 30
            github:
                api_url: https://github.example.com/api/v3
            "#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.listener.port, 8080);
        assert_eq!(config.read_timeout_secs, 15);
        assert_eq!(config.write_timeout_secs, 30);
        assert_eq!(config.github.timeout_secs, 15);
        assert_eq!(
            config.github.parsed_api_url().unwrap().as_str(),
            "https://github.example.com/api/v3"
        );
    }

    #[test]
    fn test_listener_fields_default_individually() {
        let config: Config = serde_yaml::from_str("listener:\n  port: 8080\n").unwrap();
        assert_eq!(config.listener.host, "127.0.0.1");
        assert_eq!(config.listener.port, 8080);

        let config: Config = serde_yaml::from_str("listener:\n  host: 0.0.0.0\n").unwrap();
        assert_eq!(config.listener.host, "0.0.0.0");
        assert_eq!(config.listener.port, 80);
    }

    #[test]
    fn test_validation() {
        let mut config = Config::default();
        config.listener.port = 0;
        assert_eq!(config.validate(), Err(ValidationError::InvalidPort));

        let mut config = Config::default();
        config.write_timeout_secs = 0;
        assert_eq!(
            config.validate(),
            Err(ValidationError::ZeroTimeout("write_timeout_secs"))
        );

        let mut config = Config::default();
        config.github.api_url = "mailto:ci@example.com".into();
        assert!(matches!(
            config.validate(),
            Err(ValidationError::InvalidApiUrl { .. })
        ));

        let mut config = Config::default();
        config.github.api_url = "not a url".into();
        assert!(matches!(
            config.validate(),
            Err(ValidationError::InvalidApiUrl { .. })
        ));
    }

    #[test]
    fn test_credentials_require_token() {
        let err = Credentials::from_lookup(env(&[])).unwrap_err();
        assert!(matches!(err, ConfigError::MissingCredential(TOKEN_ENV)));
        assert_eq!(err.to_string(), "No GITHUB_ACCESS_TOKEN set in the environment");

        let err = Credentials::from_lookup(env(&[(TOKEN_ENV, "")])).unwrap_err();
        assert!(matches!(err, ConfigError::MissingCredential(_)));
    }

    #[test]
    fn test_credentials_allow_list() {
        let credentials = Credentials::from_lookup(env(&[(TOKEN_ENV, "ghp_x")])).unwrap();
        assert_eq!(credentials.token, "ghp_x");
        assert!(credentials.allow_list.is_empty());

        let credentials = Credentials::from_lookup(env(&[
            (TOKEN_ENV, "ghp_x"),
            (ALLOWED_USERS_ENV, "alice,bob"),
        ]))
        .unwrap();
        assert!(credentials.allow_list.is_allowed("alice"));
        assert!(!credentials.allow_list.is_allowed("mallory"));
    }

    #[test]
    fn test_credentials_debug_hides_token() {
        let credentials = Credentials::from_lookup(env(&[(TOKEN_ENV, "ghp_secret")])).unwrap();
        assert!(!format!("{credentials:?}").contains("ghp_secret"));
    }
}
