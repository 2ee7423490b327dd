//! Reconciliation of the published record with the current public IP.

use crate::config::Target;
use crate::detector::{AddressFamily, IpSource};
use crate::error::{DdnsError, Result};
use crate::providers::{DdnsProvider, UpdateOutcome};
use futures_util::FutureExt;
use std::net::{IpAddr, Ipv6Addr};
use std::panic::AssertUnwindSafe;

/// What one reconcile step did for one address family.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reconciliation {
    /// Published record already matches the public IP.
    InSync { ip: String },
    /// Mismatch, but this IP was already sent to the provider.
    AlreadyAttempted { ip: String },
    /// Update sent and answered.
    Updated { ip: String, outcome: UpdateOutcome },
    /// Update sent but the provider could not be reached.
    UpdateFailed { ip: String, reason: String },
}

/// Last address handed to the provider, per family. Process-local.
#[derive(Debug, Default, Clone)]
struct ObservedState {
    last_ipv4: Option<String>,
    last_ipv6: Option<String>,
}

impl ObservedState {
    fn last(&self, family: AddressFamily) -> Option<&str> {
        match family {
            AddressFamily::V4 => self.last_ipv4.as_deref(),
            AddressFamily::V6 => self.last_ipv6.as_deref(),
        }
    }

    fn remember(&mut self, family: AddressFamily, ip: &str) {
        let slot = match family {
            AddressFamily::V4 => &mut self.last_ipv4,
            AddressFamily::V6 => &mut self.last_ipv6,
        };
        *slot = Some(ip.to_string());
    }
}

/// Keeps one target's records in sync.
pub struct Reconciler {
    target: Target,
    source: Box<dyn IpSource>,
    provider: Box<dyn DdnsProvider>,
    state: ObservedState,
}

impl Reconciler {
    pub fn new(target: Target, source: Box<dyn IpSource>, provider: Box<dyn DdnsProvider>) -> Self {
        Self {
            target,
            source,
            provider,
            state: ObservedState::default(),
        }
    }

    pub fn target(&self) -> &Target {
        &self.target
    }

    /// Last IP attempted (or confirmed) for `family`, if any.
    pub fn last_attempted(&self, family: AddressFamily) -> Option<&str> {
        self.state.last(family)
    }

    /// Families processed each cycle, in order.
    pub fn families(&self) -> Vec<AddressFamily> {
        if self.target.enable_ipv6 {
            vec![AddressFamily::V4, AddressFamily::V6]
        } else {
            vec![AddressFamily::V4]
        }
    }

    /// Bring the `family` record in line with the public IP.
    ///
    /// Errors leave the remembered state untouched.
    pub async fn reconcile(&mut self, family: AddressFamily) -> Result<Reconciliation> {
        let hostname = self.target.hostname.clone();

        let public_ip = self.source.fetch_public_ip(family).await?;

        if family == AddressFamily::V6 {
            validate_ipv6(&public_ip)?;
        }

        let dns_ip = self.source.resolve_hostname_ip(&hostname, family).await;
        match &dns_ip {
            Some(ip) => tracing::info!("{} published for {}: {}", family, hostname, ip),
            None => tracing::info!("No existing {} record for {}", family, hostname),
        }

        let in_sync = dns_ip
            .as_deref()
            .is_some_and(|dns_ip| same_address(family, &public_ip, dns_ip));

        if in_sync {
            tracing::info!("{} unchanged ({}), nothing to do", family, public_ip);
            self.state.remember(family, &public_ip);
            return Ok(Reconciliation::InSync { ip: public_ip });
        }

        let already_sent = self
            .state
            .last(family)
            .is_some_and(|last| same_address(family, last, &public_ip));

        if already_sent {
            tracing::info!(
                "{} {} already sent to {}, waiting for the next cycle",
                family,
                public_ip,
                self.provider.name()
            );
            return Ok(Reconciliation::AlreadyAttempted { ip: public_ip });
        }

        let result = self.provider.update_record(&hostname, &public_ip).await;
        self.state.remember(family, &public_ip);

        Ok(match result {
            Ok(outcome) => {
                if outcome.is_success() {
                    tracing::info!("{} {} for {}: {}", family, public_ip, hostname, outcome);
                } else {
                    tracing::error!("{} {} for {}: {}", family, public_ip, hostname, outcome);
                }
                Reconciliation::Updated {
                    ip: public_ip,
                    outcome,
                }
            }
            Err(e) => {
                tracing::warn!("{} update for {} failed: {}", family, hostname, e);
                Reconciliation::UpdateFailed {
                    ip: public_ip,
                    reason: e.to_string(),
                }
            }
        })
    }

    /// One full pass: IPv4, then IPv6 when enabled.
    ///
    /// A failure aborts only the family it happened in.
    pub async fn run_cycle(&mut self) -> Vec<(AddressFamily, Result<Reconciliation>)> {
        let mut results = Vec::new();

        for family in self.families() {
            tracing::debug!("Checking {} for {}", family, self.target.hostname);
            let result = self.reconcile(family).await;
            if let Err(e) = &result {
                tracing::warn!("{} check aborted: {}", family, e);
            }
            results.push((family, result));
        }

        results
    }

    /// Run cycles until the process is stopped.
    ///
    /// A panic inside a cycle is logged and the loop carries on after the
    /// usual sleep.
    pub async fn run_forever(&mut self) {
        let interval = self.target.interval();

        tracing::info!(
            "Watching {} (IPv6: {}, interval: {}s)",
            self.target.hostname,
            if self.target.enable_ipv6 { "on" } else { "off" },
            interval.as_secs()
        );

        loop {
            if let Err(panic) = AssertUnwindSafe(self.run_cycle()).catch_unwind().await {
                let message = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                tracing::error!("Unhandled failure in update cycle: {}", message);
            }

            tokio::time::sleep(interval).await;
        }
    }
}

/// Reject anything the v6 lookup returned that is not an IPv6 address.
fn validate_ipv6(ip: &str) -> Result<()> {
    match ip.parse::<IpAddr>() {
        Ok(IpAddr::V6(_)) => Ok(()),
        Ok(IpAddr::V4(_)) => {
            tracing::warn!(
                "IPv6 lookup returned an IPv4 address ({}); IPv6 connectivity is probably missing",
                ip
            );
            Err(DdnsError::Validation(format!(
                "expected an IPv6 address, got IPv4 {}",
                ip
            )))
        }
        Err(_) => {
            tracing::warn!("IPv6 lookup returned an invalid address: {:?}", ip);
            Err(DdnsError::Validation(format!("invalid IP address {:?}", ip)))
        }
    }
}

/// Address equality for `family`. IPv6 compares canonical forms.
fn same_address(family: AddressFamily, public_ip: &str, dns_ip: &str) -> bool {
    match family {
        AddressFamily::V4 => public_ip == dns_ip,
        AddressFamily::V6 => match (public_ip.parse::<Ipv6Addr>(), dns_ip.parse::<Ipv6Addr>()) {
            (Ok(a), Ok(b)) => a.to_string() == b.to_string(),
            _ => {
                tracing::warn!(
                    "Could not normalize {} / {}, comparing as text",
                    public_ip,
                    dns_ip
                );
                public_ip.eq_ignore_ascii_case(dns_ip)
            }
        },
    }
}
