//! Environment-driven configuration.
//!
//! Read once at startup. Optional values fall back to documented defaults;
//! required values that are absent or malformed become a
//! [`ConfigurationError`] and the process refuses to start.

use std::path::PathBuf;
use std::time::Duration;

use listener::QueueConfig;
use pipeline::ConfigurationError;
use processor::RetryConfig;

/// Environment variable names.
const GITHUB_TOKEN: &str = "GITHUB_TOKEN";
const GITHUB_API_URL: &str = "GITHUB_API_URL";
const DATABASE_PATH: &str = "DATABASE_PATH";
const RETRY_MAX_ATTEMPTS: &str = "RETRY_MAX_ATTEMPTS";
const RETRY_BASE_DELAY_MS: &str = "RETRY_BASE_DELAY_MS";
const RETRY_MAX_DELAY_MS: &str = "RETRY_MAX_DELAY_MS";
const QUEUE_VISIBILITY_TIMEOUT_SECS: &str = "QUEUE_VISIBILITY_TIMEOUT_SECS";
const QUEUE_MAX_DELIVERIES: &str = "QUEUE_MAX_DELIVERIES";

const DEFAULT_API_URL: &str = "https://api.github.com";
const DEFAULT_DATABASE_PATH: &str = "workflow-analyses.db";

/// Resolved runtime configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Read-API token. Only required by modes that fetch workflow content.
    github_token: Option<String>,
    /// Base URL of the read API.
    pub github_api_url: String,
    /// SQLite database file.
    pub database_path: PathBuf,
    /// Backoff schedule for fetch, write, and publish boundaries.
    pub retry: RetryConfig,
    /// Queue delivery tunables.
    pub queue: QueueConfig,
}

impl Config {
    /// Reads the full configuration from the environment.
    pub fn from_env() -> Result<Self, ConfigurationError> {
        let defaults_retry = RetryConfig::default();
        let defaults_queue = QueueConfig::default();

        let retry = RetryConfig {
            max_attempts: read_parsed(RETRY_MAX_ATTEMPTS, defaults_retry.max_attempts)?,
            base_delay: Duration::from_millis(read_parsed(
                RETRY_BASE_DELAY_MS,
                defaults_retry.base_delay.as_millis() as u64,
            )?),
            max_delay: Duration::from_millis(read_parsed(
                RETRY_MAX_DELAY_MS,
                defaults_retry.max_delay.as_millis() as u64,
            )?),
        };
        let queue = QueueConfig {
            visibility_timeout: Duration::from_secs(read_parsed(
                QUEUE_VISIBILITY_TIMEOUT_SECS,
                defaults_queue.visibility_timeout.as_secs(),
            )?),
            max_deliveries: read_parsed(QUEUE_MAX_DELIVERIES, defaults_queue.max_deliveries)?,
        };

        Ok(Self {
            github_token: read_optional(GITHUB_TOKEN),
            github_api_url: read_optional(GITHUB_API_URL)
                .unwrap_or_else(|| DEFAULT_API_URL.to_string()),
            database_path: read_optional(DATABASE_PATH)
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_DATABASE_PATH)),
            retry,
            queue,
        })
    }

    /// The read-API token, required by the full pipeline mode.
    pub fn require_github_token(&self) -> Result<&str, ConfigurationError> {
        self.github_token
            .as_deref()
            .ok_or_else(|| ConfigurationError::Missing {
                name: GITHUB_TOKEN.to_string(),
            })
    }
}

/// Reads a variable, treating unset and empty as absent.
fn read_optional(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|value| !value.is_empty())
}

/// Reads and parses a variable, falling back to `default` when absent.
fn read_parsed<T: std::str::FromStr>(
    name: &'static str,
    default: T,
) -> Result<T, ConfigurationError>
where
    T::Err: std::fmt::Display,
{
    match read_optional(name) {
        None => Ok(default),
        Some(raw) => raw.parse().map_err(|err: T::Err| ConfigurationError::Invalid {
            name: name.to_string(),
            reason: err.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Environment mutation is process-global; keep every assertion that
    // touches it in one test.
    #[test]
    fn reads_defaults_and_overrides() {
        std::env::remove_var(GITHUB_TOKEN);
        std::env::remove_var(GITHUB_API_URL);
        std::env::remove_var(DATABASE_PATH);
        std::env::remove_var(RETRY_MAX_ATTEMPTS);

        let config = Config::from_env().unwrap();
        assert_eq!(config.github_api_url, DEFAULT_API_URL);
        assert_eq!(config.database_path, PathBuf::from(DEFAULT_DATABASE_PATH));
        assert_eq!(config.retry.max_attempts, RetryConfig::default().max_attempts);
        assert!(config.require_github_token().is_err());

        std::env::set_var(GITHUB_TOKEN, "token-1");
        std::env::set_var(GITHUB_API_URL, "https://github.example.com/api/v3");
        std::env::set_var(RETRY_MAX_ATTEMPTS, "7");

        let config = Config::from_env().unwrap();
        assert_eq!(config.require_github_token().unwrap(), "token-1");
        assert_eq!(config.github_api_url, "https://github.example.com/api/v3");
        assert_eq!(config.retry.max_attempts, 7);

        std::env::set_var(RETRY_MAX_ATTEMPTS, "not-a-number");
        assert!(matches!(
            Config::from_env(),
            Err(ConfigurationError::Invalid { .. })
        ));

        std::env::remove_var(GITHUB_TOKEN);
        std::env::remove_var(GITHUB_API_URL);
        std::env::remove_var(RETRY_MAX_ATTEMPTS);
    }
}
