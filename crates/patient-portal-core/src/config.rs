//! Client configuration.

use std::{
    env,
    fmt::{Debug, Display},
    str::FromStr,
    time::Duration,
};

use tracing::{info, warn};

pub const DEFAULT_BACKEND_URL: &str = "http://localhost:8000";
pub const DEFAULT_TIMEOUT_MS: u64 = 5000;

pub const BACKEND_URL_VAR: &str = "PATIENT_PORTAL_BACKEND_URL";
pub const TIMEOUT_VAR: &str = "PATIENT_PORTAL_TIMEOUT_MS";
pub const FALLBACK_VAR: &str = "PATIENT_PORTAL_OFFLINE_FALLBACK";

/// What `fetch_patients` does when the backend cannot answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FallbackMode {
    /// Surface the error
    #[default]
    Disabled,
    /// Substitute the canned patient list, tagged as fallback
    CannedPatients,
}

impl FromStr for FallbackMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" | "canned" => Ok(FallbackMode::CannedPatients),
            "0" | "false" | "no" | "off" | "" => Ok(FallbackMode::Disabled),
            other => Err(format!("unrecognized fallback mode '{other}'")),
        }
    }
}

/// Settings for the API client.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    /// Backend origin, without trailing slash
    pub base_url: String,
    pub timeout: Duration,
    pub fallback: FallbackMode,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new(DEFAULT_BACKEND_URL)
    }
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: normalize_base_url(base_url.into()),
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            fallback: FallbackMode::Disabled,
        }
    }

    /// Load from `PATIENT_PORTAL_*` environment variables, with defaults.
    pub fn from_env() -> Self {
        let base_url = try_load(BACKEND_URL_VAR, DEFAULT_BACKEND_URL.to_string());
        let timeout_ms = try_load(TIMEOUT_VAR, DEFAULT_TIMEOUT_MS);
        let fallback = try_load(FALLBACK_VAR, FallbackMode::Disabled);

        Self::new(base_url)
            .with_timeout(Duration::from_millis(timeout_ms))
            .with_fallback(fallback)
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_fallback(mut self, fallback: FallbackMode) -> Self {
        self.fallback = fallback;
        self
    }

    /// Absolute URL for an API path such as `/api/v1/patients`.
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

fn normalize_base_url(url: String) -> String {
    url.trim().trim_end_matches('/').to_string()
}

fn try_load<T>(key: &str, default: T) -> T
where
    T: FromStr + Debug,
    T::Err: Display,
{
    let Ok(raw) = env::var(key) else {
        info!("{key} not set, using default: {default:?}");
        return default;
    };

    match raw.parse() {
        Ok(value) => value,
        Err(e) => {
            warn!("Invalid {key} value: {e}, using default: {default:?}");
            default
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.base_url, "http://localhost:8000");
        assert_eq!(config.timeout, Duration::from_millis(5000));
        assert_eq!(config.fallback, FallbackMode::Disabled);
    }

    #[test]
    fn test_trailing_slash_removed() {
        let config = ClientConfig::new("http://api.example.com/ ");
        assert_eq!(
            config.url("/api/v1/patients"),
            "http://api.example.com/api/v1/patients"
        );
    }

    #[test]
    fn test_fallback_parse() {
        assert_eq!("1".parse(), Ok(FallbackMode::CannedPatients));
        assert_eq!("TRUE".parse(), Ok(FallbackMode::CannedPatients));
        assert_eq!("off".parse(), Ok(FallbackMode::Disabled));
        assert!("maybe".parse::<FallbackMode>().is_err());
    }

    #[test]
    fn test_try_load_invalid_uses_default() {
        // Variable name unique to this test
        env::set_var("PATIENT_PORTAL_TEST_TIMEOUT", "soon");
        let value = try_load("PATIENT_PORTAL_TEST_TIMEOUT", 250u64);
        assert_eq!(value, 250);
        env::remove_var("PATIENT_PORTAL_TEST_TIMEOUT");
    }

    #[test]
    fn test_try_load_uses_typed_default() {
        env::remove_var("PATIENT_PORTAL_TEST_UNSET");
        let mode = try_load("PATIENT_PORTAL_TEST_UNSET", FallbackMode::CannedPatients);
        assert_eq!(mode, FallbackMode::CannedPatients);

        env::set_var("PATIENT_PORTAL_TEST_MODE", "sometimes");
        let mode = try_load("PATIENT_PORTAL_TEST_MODE", FallbackMode::CannedPatients);
        assert_eq!(mode, FallbackMode::CannedPatients);
        env::remove_var("PATIENT_PORTAL_TEST_MODE");
    }
}
