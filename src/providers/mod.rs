//! DDNS update providers.

mod infomaniak;


pub use infomaniak::InfomaniakProvider;

use crate::config::Target;
use crate::error::Result;
use async_trait::async_trait;
use std::fmt;

/// Classified response of a dyndns-style update endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// `good`: record set to the new address.
    Updated,
    /// `nochg`: record already had this address.
    Unchanged,
    /// `nohost`: hostname unknown to this account.
    HostUnknown,
    /// `badauth`: invalid credentials.
    AuthFailed,
    /// `abuse`: blocked for too many requests.
    RateLimited,
    /// `badagent`: User-Agent refused.
    AgentRejected,
    /// `badsys`, `!donator` or `numhost`: request not supported for this account.
    ServerUnsupported,
    /// `911`: provider-side failure, try again later.
    TemporaryServerError,
    /// Anything else.
    Unrecognized,
}

/// Tokens in match order. The first token found in the body wins, so a body
/// carrying both `good` and `911` is `Updated`. Keep this order stable.
const TOKENS: &[(&str, UpdateOutcome)] = &[
    ("good", UpdateOutcome::Updated),
    ("nochg", UpdateOutcome::Unchanged),
    ("nohost", UpdateOutcome::HostUnknown),
    ("badauth", UpdateOutcome::AuthFailed),
    ("abuse", UpdateOutcome::RateLimited),
    ("badagent", UpdateOutcome::AgentRejected),
    ("badsys", UpdateOutcome::ServerUnsupported),
    ("!donator", UpdateOutcome::ServerUnsupported),
    ("numhost", UpdateOutcome::ServerUnsupported),
    ("911", UpdateOutcome::TemporaryServerError),
];

impl UpdateOutcome {
    /// Classify a response body by case-insensitive substring match.
    pub fn classify(body: &str) -> Self {
        let body = body.trim().to_lowercase();
        TOKENS
            .iter()
            .find(|(token, _)| body.contains(token))
            .map(|(_, outcome)| *outcome)
            .unwrap_or(UpdateOutcome::Unrecognized)
    }

    /// Whether the record now holds the requested address.
    pub fn is_success(self) -> bool {
        matches!(self, UpdateOutcome::Updated | UpdateOutcome::Unchanged)
    }

    /// Human-readable explanation for logs.
    pub fn description(self) -> &'static str {
        match self {
            UpdateOutcome::Updated => "DNS record updated",
            UpdateOutcome::Unchanged => "DNS record already up to date",
            UpdateOutcome::HostUnknown => "hostname unknown to the provider (nohost)",
            UpdateOutcome::AuthFailed => "invalid credentials (badauth)",
            UpdateOutcome::RateLimited => "blocked by the provider for abuse",
            UpdateOutcome::AgentRejected => "User-Agent rejected (badagent)",
            UpdateOutcome::ServerUnsupported => "request not supported for this account",
            UpdateOutcome::TemporaryServerError => "temporary provider error (911), retry later",
            UpdateOutcome::Unrecognized => "unrecognized response, check the record manually",
        }
    }
}

impl fmt::Display for UpdateOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

/// Trait for DDNS providers.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DdnsProvider: Send + Sync {
    /// Get the provider name.
    fn name(&self) -> &'static str;

    /// Point `hostname` at `ip`.
    ///
    /// Transport failures are errors; anything the provider answered is an
    /// [`UpdateOutcome`].
    async fn update_record(&self, hostname: &str, ip: &str) -> Result<UpdateOutcome>;

    /// Validate provider configuration/credentials.
    async fn validate(&self) -> Result<()>;
}

/// Create the provider for a target.
pub fn create_provider(target: &Target) -> Result<Box<dyn DdnsProvider>> {
    Ok(Box::new(InfomaniakProvider::with_base_url(
        target.credentials.clone(),
        target.update_url.clone(),
    )?))
}
