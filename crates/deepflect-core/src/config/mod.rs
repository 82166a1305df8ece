//! Client configuration shared by every Deepflect front end.

use std::time::Duration;

use crate::error::{Error, Result};
use crate::util::{is_http_url, normalize_text_option};

/// Environment variable naming the backend base URL.
pub const API_BASE_URL_ENV: &str = "DEEPFLECT_API_BASE_URL";

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(3);
const DEFAULT_REFRESH_SKEW: Duration = Duration::from_secs(60);

/// Endpoint and timing configuration for the API client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    api_base_url: String,
    /// How often the upload poller asks the server for upload status.
    pub poll_interval: Duration,
    /// Margin before access-token expiry in which a proactive refresh runs.
    pub refresh_skew: Duration,
}

impl ClientConfig {
    pub fn new(api_base_url: impl AsRef<str>) -> Result<Self> {
        Ok(Self {
            api_base_url: normalize_base_url(api_base_url.as_ref())?,
            poll_interval: DEFAULT_POLL_INTERVAL,
            refresh_skew: DEFAULT_REFRESH_SKEW,
        })
    }

    /// Reads the base URL from `DEEPFLECT_API_BASE_URL`.
    ///
    /// Returns `Ok(None)` when the variable is unset or blank.
    pub fn from_env() -> Result<Option<Self>> {
        normalize_text_option(std::env::var(API_BASE_URL_ENV).ok())
            .map(Self::new)
            .transpose()
    }

    #[must_use]
    pub const fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn api_base_url(&self) -> &str {
        &self.api_base_url
    }

    /// Joins `route` (which must start with `/`) onto the base URL.
    pub fn endpoint(&self, route: &str) -> String {
        format!("{}{}", self.api_base_url, route)
    }
}

pub fn normalize_base_url(raw: &str) -> Result<String> {
    let base = raw.trim().trim_end_matches('/');
    if base.is_empty() {
        return Err(Error::InvalidConfiguration(
            "API base URL must not be empty".to_string(),
        ));
    }
    if !is_http_url(base) {
        return Err(Error::InvalidConfiguration(
            "API base URL must include http:// or https://".to_string(),
        ));
    }
    Ok(base.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_base_url_rejects_invalid_values() {
        assert!(normalize_base_url("").is_err());
        assert!(normalize_base_url("api.example.com").is_err());
    }

    #[test]
    fn normalize_base_url_trims_trailing_slash() {
        assert_eq!(
            normalize_base_url(" https://api.example.com/ ").unwrap(),
            "https://api.example.com"
        );
    }

    #[test]
    fn new_config_uses_default_timings() {
        let config = ClientConfig::new("https://api.example.com").unwrap();
        assert_eq!(config.poll_interval, Duration::from_secs(3));
        assert_eq!(config.refresh_skew, Duration::from_secs(60));
        assert_eq!(
            config.endpoint("/api/v1/auth/login"),
            "https://api.example.com/api/v1/auth/login"
        );
    }

    #[test]
    fn poll_interval_can_be_overridden() {
        let config = ClientConfig::new("https://api.example.com")
            .unwrap()
            .with_poll_interval(Duration::from_secs(10));
        assert_eq!(config.poll_interval, Duration::from_secs(10));
        assert_eq!(config.refresh_skew, Duration::from_secs(60));
    }
}
