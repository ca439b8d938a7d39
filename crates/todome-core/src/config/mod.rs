//! Sync configuration.
//!
//! Provides the `SyncConfig` struct used by every client to locate the remote
//! store and to tune background sync cadence.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::util::{is_http_url, normalize_text_option};

/// Default cadence of the background push.
pub const DEFAULT_PUSH_INTERVAL_SECS: u64 = 30;
/// Default per-request timeout for remote calls.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;

/// Remote endpoint and scheduling configuration.
///
/// `api_key` is the public (anon) key of the backend; `access_token` is the
/// signed-in user's bearer token when one exists.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct SyncConfig {
    #[serde(default)]
    pub remote_url: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default = "default_push_interval_secs")]
    pub push_interval_secs: u64,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

const fn default_push_interval_secs() -> u64 {
    DEFAULT_PUSH_INTERVAL_SECS
}

const fn default_request_timeout_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            remote_url: None,
            api_key: None,
            access_token: None,
            push_interval_secs: DEFAULT_PUSH_INTERVAL_SECS,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
        }
    }
}

impl SyncConfig {
    /// Read configuration from `TODOME_*` environment variables.
    ///
    /// Unset or blank variables keep their defaults; an unparsable interval is
    /// an error rather than a silent fallback.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self {
            remote_url: normalize_text_option(lookup("TODOME_REMOTE_URL")),
            api_key: normalize_text_option(lookup("TODOME_API_KEY")),
            access_token: normalize_text_option(lookup("TODOME_ACCESS_TOKEN")),
            ..Self::default()
        };

        if let Some(raw) = normalize_text_option(lookup("TODOME_PUSH_INTERVAL_SECS")) {
            config.push_interval_secs = raw.parse().map_err(|_| {
                Error::InvalidInput(format!("TODOME_PUSH_INTERVAL_SECS must be a number, got '{raw}'"))
            })?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Whether a remote endpoint is configured
    pub fn is_configured(&self) -> bool {
        normalize_text_option(self.remote_url.clone()).is_some()
    }

    /// Interval between background pushes
    pub const fn push_interval(&self) -> Duration {
        Duration::from_secs(self.push_interval_secs)
    }

    /// Remote URL trimmed, scheme-checked, without trailing slash
    pub fn normalized_remote_url(&self) -> Result<String> {
        let url = normalize_text_option(self.remote_url.clone())
            .ok_or_else(|| Error::InvalidInput("Remote URL is required".to_string()))?;
        if !is_http_url(&url) {
            return Err(Error::InvalidInput(
                "Remote URL must include http:// or https://".to_string(),
            ));
        }
        Ok(url.trim_end_matches('/').to_string())
    }

    /// Check the values that have hard constraints
    pub fn validate(&self) -> Result<()> {
        if self.is_configured() {
            self.normalized_remote_url()?;
        }
        if self.push_interval_secs == 0 {
            return Err(Error::InvalidInput(
                "push_interval_secs must be greater than zero".to_string(),
            ));
        }
        if self.request_timeout_secs == 0 {
            return Err(Error::InvalidInput(
                "request_timeout_secs must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn default_is_not_configured() {
        let config = SyncConfig::default();
        assert!(!config.is_configured());
        assert_eq!(config.push_interval(), Duration::from_secs(30));
    }

    #[test]
    fn from_lookup_reads_values() {
        let config = SyncConfig::from_lookup(lookup_from(&[
            ("TODOME_REMOTE_URL", " https://project.supabase.co/ "),
            ("TODOME_API_KEY", "anon"),
            ("TODOME_PUSH_INTERVAL_SECS", "45"),
        ]))
        .unwrap();

        assert!(config.is_configured());
        assert_eq!(
            config.normalized_remote_url().unwrap(),
            "https://project.supabase.co"
        );
        assert_eq!(config.api_key.as_deref(), Some("anon"));
        assert_eq!(config.access_token, None);
        assert_eq!(config.push_interval_secs, 45);
    }

    #[test]
    fn from_lookup_rejects_bad_values() {
        assert!(SyncConfig::from_lookup(lookup_from(&[("TODOME_REMOTE_URL", "ftp://x")])).is_err());
        assert!(
            SyncConfig::from_lookup(lookup_from(&[("TODOME_PUSH_INTERVAL_SECS", "soon")])).is_err()
        );
        assert!(SyncConfig::from_lookup(lookup_from(&[("TODOME_PUSH_INTERVAL_SECS", "0")])).is_err());
    }

    #[test]
    fn deserialize_rejects_unknown_fields() {
        let error = serde_json::from_str::<SyncConfig>(r#"{"remote_url": "https://x", "typo": 1}"#)
            .unwrap_err();
        assert!(error.to_string().contains("unknown field"));
    }

    #[test]
    fn deserialize_fills_defaults() {
        let config: SyncConfig = serde_json::from_str(r#"{"remote_url": "https://x"}"#).unwrap();
        assert_eq!(config.push_interval_secs, DEFAULT_PUSH_INTERVAL_SECS);
        assert_eq!(config.request_timeout_secs, DEFAULT_REQUEST_TIMEOUT_SECS);
    }
}
