//! Application configuration

use crate::error::{CoreError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use skillswap_http::client::ClientConfig;

pub const DEFAULT_DATABASE_URL: &str = "http://127.0.0.1:9000";
pub const DEFAULT_AUTH_URL: &str = "http://127.0.0.1:9099/identitytoolkit.googleapis.com/v1";

pub const ENV_DATABASE_URL: &str = "SKILLSWAP_DATABASE_URL";
pub const ENV_AUTH_URL: &str = "SKILLSWAP_AUTH_URL";
pub const ENV_API_KEY: &str = "SKILLSWAP_API_KEY";
pub const ENV_MAX_RETRIES: &str = "SKILLSWAP_MAX_RETRIES";

/// Configuration for the SkillSwap client
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Base URL of the document store
    pub database_url: String,
    /// Base URL of the auth gateway, up to and including the API version
    pub auth_url: String,
    /// Passed to the auth gateway as the `key` query parameter
    pub api_key: String,
    /// Transport settings
    pub client: ClientConfig,
    /// How many times the whole accept-follow-request sequence is tried
    pub accept_attempts: u32,
    /// Expected keep-alive interval of chat streams; `None` disables the idle timeout
    pub keep_alive_secs: Option<f64>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_url: DEFAULT_DATABASE_URL.to_string(),
            auth_url: DEFAULT_AUTH_URL.to_string(),
            api_key: String::new(),
            client: ClientConfig::default(),
            accept_attempts: 3,
            keep_alive_secs: Some(30.0),
        }
    }
}

/// Keys recognized in the persistent config file. Everything is optional.
#[derive(Debug, Default, Deserialize)]
struct FileConfig {
    database_url: Option<String>,
    auth_url: Option<String>,
    api_key: Option<String>,
    client: Option<ClientConfig>,
    accept_attempts: Option<u32>,
    keep_alive_secs: Option<f64>,
}

impl AppConfig {
    /// Defaults, then the persistent config file, then the environment.
    pub fn load() -> Result<Self> {
        Self::from_sources(skillswap_common::read_config_file(), |key| {
            std::env::var(key).ok()
        })
    }

    pub fn from_sources<F>(file: Option<Value>, env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(value) = file {
            let file: FileConfig = serde_json::from_value(value)
                .map_err(|e| CoreError::Config(format!("invalid config file: {}", e)))?;
            config.merge_file(file);
        }

        if let Some(url) = env(ENV_DATABASE_URL) {
            config.database_url = url;
        }
        if let Some(url) = env(ENV_AUTH_URL) {
            config.auth_url = url;
        }
        if let Some(key) = env(ENV_API_KEY) {
            config.api_key = key;
        }
        if let Some(retries) = env(ENV_MAX_RETRIES) {
            config.client.max_retries = retries.trim().parse().map_err(|_| {
                CoreError::Config(format!("{} must be a number, got {:?}", ENV_MAX_RETRIES, retries))
            })?;
        }

        config.validate()?;
        Ok(config)
    }

    fn merge_file(&mut self, file: FileConfig) {
        if let Some(url) = file.database_url {
            self.database_url = url;
        }
        if let Some(url) = file.auth_url {
            self.auth_url = url;
        }
        if let Some(key) = file.api_key {
            self.api_key = key;
        }
        if let Some(client) = file.client {
            self.client = client;
        }
        if let Some(attempts) = file.accept_attempts {
            self.accept_attempts = attempts;
        }
        if file.keep_alive_secs.is_some() {
            self.keep_alive_secs = file.keep_alive_secs.filter(|secs| *secs > 0.0);
        }
    }

    pub fn validate(&self) -> Result<()> {
        check_http_url("database_url", &self.database_url)?;
        check_http_url("auth_url", &self.auth_url)?;
        if self.accept_attempts == 0 {
            return Err(CoreError::Config("accept_attempts must be at least 1".into()));
        }
        Ok(())
    }
}

fn check_http_url(name: &str, value: &str) -> Result<()> {
    let url = url::Url::parse(value)
        .map_err(|e| CoreError::Config(format!("{} is not a valid URL ({}): {}", name, value, e)))?;
    match url.scheme() {
        "http" | "https" => Ok(()),
        other => Err(CoreError::Config(format!(
            "{} must use http or https, got {}",
            name, other
        ))),
    }
}
