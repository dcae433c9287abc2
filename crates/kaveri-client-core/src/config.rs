use std::env;
use std::path::PathBuf;

use crate::auth::{AuthInputError, normalize_base_url};

pub const DEFAULT_API_BASE_URL: &str = "http://127.0.0.1:5000";
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 10_000;
pub const MIN_REQUEST_TIMEOUT_MS: u64 = 250;
pub const DEFAULT_LOG_FILTER: &str = "info";
const DEFAULT_SESSION_DIR: &str = ".kaveri-admin";
const DEFAULT_SESSION_FILE: &str = "session.json";

pub const ENV_API_BASE_URL: &str = "KAVERI_API_BASE_URL";
pub const ENV_REQUEST_TIMEOUT_MS: &str = "KAVERI_REQUEST_TIMEOUT_MS";
pub const ENV_SESSION_PATH: &str = "KAVERI_SESSION_PATH";
pub const ENV_LOG_FILTER: &str = "KAVERI_LOG_FILTER";
pub const BASE_URL_SOURCE_DEFAULT: &str = "default_local";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid KAVERI_API_BASE_URL value '{value}': {source}")]
    InvalidBaseUrl {
        value: String,
        source: AuthInputError,
    },
    #[error("invalid KAVERI_REQUEST_TIMEOUT_MS value '{value}'")]
    InvalidTimeout { value: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminConfig {
    pub base_url: String,
    pub base_url_source: String,
    pub request_timeout_ms: u64,
    pub session_path: PathBuf,
    pub log_filter: String,
}

impl AdminConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let (base_url, base_url_source) = match env_non_empty(ENV_API_BASE_URL) {
            Some(raw) => {
                let base_url = normalize_base_url(&raw).map_err(|source| {
                    ConfigError::InvalidBaseUrl {
                        value: raw.clone(),
                        source,
                    }
                })?;
                (base_url, ENV_API_BASE_URL.to_string())
            }
            None => (
                DEFAULT_API_BASE_URL.to_string(),
                BASE_URL_SOURCE_DEFAULT.to_string(),
            ),
        };

        let request_timeout_ms = match env_non_empty(ENV_REQUEST_TIMEOUT_MS) {
            Some(raw) => raw
                .parse::<u64>()
                .map_err(|_| ConfigError::InvalidTimeout { value: raw.clone() })?
                .max(MIN_REQUEST_TIMEOUT_MS),
            None => DEFAULT_REQUEST_TIMEOUT_MS,
        };

        let session_path = env_non_empty(ENV_SESSION_PATH)
            .map(PathBuf::from)
            .unwrap_or_else(default_session_path);

        let log_filter =
            env_non_empty(ENV_LOG_FILTER).unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string());

        Ok(Self {
            base_url,
            base_url_source,
            request_timeout_ms,
            session_path,
            log_filter,
        })
    }

    /// Applies a command-line base URL on top of the environment.
    pub fn with_base_url_override(mut self, raw: Option<&str>) -> Result<Self, ConfigError> {
        if let Some(raw) = raw.map(str::trim).filter(|value| !value.is_empty()) {
            self.base_url =
                normalize_base_url(raw).map_err(|source| ConfigError::InvalidBaseUrl {
                    value: raw.to_string(),
                    source,
                })?;
            self.base_url_source = "flag".to_string();
        }
        Ok(self)
    }
}

fn default_session_path() -> PathBuf {
    env::var_os("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."))
        .join(DEFAULT_SESSION_DIR)
        .join(DEFAULT_SESSION_FILE)
}

fn env_non_empty(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
