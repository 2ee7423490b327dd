//! Infomaniak dyndns provider.

use super::{DdnsProvider, UpdateOutcome};
use crate::config::{Credentials, DEFAULT_UPDATE_URL};
use crate::error::{DdnsError, Result};
use async_trait::async_trait;
use std::time::Duration;

/// Sent on every update; providers answer `badagent` to generic agents.
pub const USER_AGENT: &str = concat!("infomaniak-ddns/", env!("CARGO_PKG_VERSION"));

const UPDATE_TIMEOUT: Duration = Duration::from_secs(15);

/// Infomaniak provider speaking the `/nic/update` protocol.
pub struct InfomaniakProvider {
    client: reqwest::Client,
    credentials: Credentials,
    update_url: String,
}

impl InfomaniakProvider {
    /// Create a new Infomaniak provider.
    pub fn new(credentials: Credentials) -> Result<Self> {
        Self::with_base_url(credentials, DEFAULT_UPDATE_URL.to_string())
    }

    /// Create with custom update endpoint (for testing or other dyndns providers).
    pub fn with_base_url(credentials: Credentials, update_url: String) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(UPDATE_TIMEOUT)
            .build()?;

        Ok(Self {
            client,
            credentials,
            update_url,
        })
    }
}

#[async_trait]
impl DdnsProvider for InfomaniakProvider {
    fn name(&self) -> &'static str {
        "infomaniak"
    }

    async fn update_record(&self, hostname: &str, ip: &str) -> Result<UpdateOutcome> {
        tracing::info!("Updating {} -> {} via {}", hostname, ip, self.update_url);

        let response = self
            .client
            .get(&self.update_url)
            .query(&[("hostname", hostname), ("myip", ip)])
            .basic_auth(&self.credentials.username, Some(&self.credentials.password))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    DdnsError::Network(format!(
                        "Update request timed out after {}s",
                        UPDATE_TIMEOUT.as_secs()
                    ))
                } else {
                    DdnsError::Network(format!("Update request failed: {}", e))
                }
            })?;

        let status = response.status();
        let text = response.text().await?;
        let body = text.trim();

        if status.is_success() {
            tracing::debug!("HTTP {} - {}", status, body);
        } else {
            tracing::warn!("Update endpoint answered HTTP {}: {}", status, body);
        }

        Ok(UpdateOutcome::classify(body))
    }

    async fn validate(&self) -> Result<()> {
        let url = reqwest::Url::parse(&self.update_url).map_err(|e| {
            DdnsError::Config(format!("Invalid update URL {:?}: {}", self.update_url, e))
        })?;

        if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
            return Err(DdnsError::Config(format!(
                "Update URL must be http(s) with a host, got {:?}",
                self.update_url
            )));
        }

        // Basic auth splits on the first ':', so it can't appear in the user id.
        if self.credentials.username.contains(':') {
            return Err(DdnsError::Config("Username must not contain ':'".to_string()));
        }

        Ok(())
    }
}
