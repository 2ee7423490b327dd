//! Configuration loaded from the environment.

use crate::error::{DdnsError, Result};
use std::fmt;
use std::time::Duration;

pub const ENV_HOSTNAME: &str = "INFOMANIAK_DDNS_HOSTNAME";
pub const ENV_USERNAME: &str = "INFOMANIAK_DDNS_USERNAME";
pub const ENV_PASSWORD: &str = "INFOMANIAK_DDNS_PASSWORD";
pub const ENV_INTERVAL: &str = "DDNS_INTERVAL_SECONDS";
pub const ENV_ENABLE_IPV6: &str = "DDNS_ENABLE_IPV6";
pub const ENV_UPDATE_URL: &str = "DDNS_UPDATE_URL";

/// Default polling interval in seconds.
pub const DEFAULT_INTERVAL_SECS: u64 = 300;

/// Lowest accepted polling interval, keeps the provider API from being spammed.
pub const MIN_INTERVAL_SECS: u64 = 15;

/// Default provider update endpoint.
pub const DEFAULT_UPDATE_URL: &str = "https://infomaniak.com/nic/update";

/// Basic auth credentials for the update endpoint.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"********")
            .finish()
    }
}

/// The record being kept in sync. Immutable once loaded.
#[derive(Debug, Clone)]
pub struct Target {
    /// Hostname to update (e.g., "home.example.com").
    pub hostname: String,
    pub credentials: Credentials,
    /// Polling interval in seconds, never below [`MIN_INTERVAL_SECS`].
    pub interval_secs: u64,
    /// Whether the AAAA record is also maintained.
    pub enable_ipv6: bool,
    /// Provider update endpoint.
    pub update_url: String,
}

impl Target {
    /// Create a target with default interval, IPv4 only.
    pub fn new(hostname: String, username: String, password: String) -> Self {
        Self {
            hostname,
            credentials: Credentials { username, password },
            interval_secs: DEFAULT_INTERVAL_SECS,
            enable_ipv6: false,
            update_url: DEFAULT_UPDATE_URL.to_string(),
        }
    }

    /// Load the target from process environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load the target through an arbitrary variable lookup.
    ///
    /// Intervals below [`MIN_INTERVAL_SECS`] are raised to it. A value that is
    /// not a non-negative integer (`"-5"`, `"5m"`) is a `Config` error, not
    /// clamped.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let missing: Vec<&str> = [ENV_HOSTNAME, ENV_USERNAME, ENV_PASSWORD]
            .into_iter()
            .filter(|key| var(*key).is_none())
            .collect();

        if !missing.is_empty() {
            return Err(DdnsError::Config(format!(
                "Missing environment variables: {}",
                missing.join(", ")
            )));
        }

        let mut target = Self::new(
            var(ENV_HOSTNAME).unwrap_or_default(),
            var(ENV_USERNAME).unwrap_or_default(),
            var(ENV_PASSWORD).unwrap_or_default(),
        );

        if let Some(raw) = var(ENV_INTERVAL) {
            let secs: u64 = raw.parse().map_err(|_| {
                DdnsError::Config(format!(
                    "{} must be a number of seconds, got {:?}",
                    ENV_INTERVAL, raw
                ))
            })?;
            target.interval_secs = secs;
        }
        target.interval_secs = target.interval_secs.max(MIN_INTERVAL_SECS);

        target.enable_ipv6 = var(ENV_ENABLE_IPV6)
            .map(|v| parse_flag(&v))
            .unwrap_or(false);

        if let Some(url) = var(ENV_UPDATE_URL) {
            target.update_url = url;
        }

        Ok(target)
    }

    /// Polling interval as a duration.
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    fn required() -> Vec<(&'static str, &'static str)> {
        vec![
            (ENV_HOSTNAME, "home.example.com"),
            (ENV_USERNAME, "ddns"),
            (ENV_PASSWORD, "s3cret"),
        ]
    }

    #[test]
    fn test_defaults() {
        let target = Target::from_lookup(lookup(&required())).unwrap();
        assert_eq!(target.hostname, "home.example.com");
        assert_eq!(target.credentials.username, "ddns");
        assert_eq!(target.interval_secs, 300);
        assert!(!target.enable_ipv6);
        assert_eq!(target.update_url, DEFAULT_UPDATE_URL);
    }

    #[test]
    fn test_empty_hostname_is_fatal() {
        let mut vars = required();
        vars[0] = (ENV_HOSTNAME, "   ");
        let err = Target::from_lookup(lookup(&vars)).unwrap_err();
        assert!(matches!(err, DdnsError::Config(ref msg) if msg.contains(ENV_HOSTNAME)));
    }

    #[test]
    fn test_missing_credentials_listed() {
        let err = Target::from_lookup(lookup(&[(ENV_HOSTNAME, "home.example.com")])).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains(ENV_USERNAME));
        assert!(msg.contains(ENV_PASSWORD));
        assert!(!msg.contains(ENV_HOSTNAME));
    }

    #[test]
    fn test_interval_floor() {
        let mut vars = required();
        vars.push((ENV_INTERVAL, "5"));
        let target = Target::from_lookup(lookup(&vars)).unwrap();
        assert_eq!(target.interval_secs, MIN_INTERVAL_SECS);
    }

    #[test]
    fn test_interval_override() {
        let mut vars = required();
        vars.push((ENV_INTERVAL, "60"));
        let target = Target::from_lookup(lookup(&vars)).unwrap();
        assert_eq!(target.interval(), Duration::from_secs(60));
    }

    #[test]
    fn test_invalid_interval() {
        let mut vars = required();
        vars.push((ENV_INTERVAL, "five"));
        assert!(matches!(
            Target::from_lookup(lookup(&vars)),
            Err(DdnsError::Config(_))
        ));
    }

    #[test]
    fn test_negative_interval_rejected() {
        let mut vars = required();
        vars.push((ENV_INTERVAL, "-5"));
        let err = Target::from_lookup(lookup(&vars)).unwrap_err();
        assert!(matches!(err, DdnsError::Config(ref msg) if msg.contains(ENV_INTERVAL)));
    }

    #[test]
    fn test_ipv6_flag() {
        for (value, expected) in [("TRUE", true), ("on", true), ("1", true), ("no", false), ("", false)] {
            let mut vars = required();
            vars.push((ENV_ENABLE_IPV6, value));
            let target = Target::from_lookup(lookup(&vars)).unwrap();
            assert_eq!(target.enable_ipv6, expected, "value {:?}", value);
        }
    }

    #[test]
    fn test_password_redacted() {
        let target = Target::from_lookup(lookup(&required())).unwrap();
        let debug = format!("{:?}", target);
        assert!(!debug.contains("s3cret"));
        assert!(debug.contains("ddns"));
    }
}
