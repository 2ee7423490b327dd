//! Public IP detection and published record lookup.

use crate::error::{DdnsError, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::fmt;
use std::net::IpAddr;
use std::time::Duration;

/// Public IPv4 lookup endpoint.
pub const IPV4_LOOKUP_URL: &str = "https://api.ipify.org?format=json";

/// Public IPv6 lookup endpoint. Answers with an IPv4 address on v4-only paths.
pub const IPV6_LOOKUP_URL: &str = "https://api64.ipify.org?format=json";

const LOOKUP_TIMEOUT: Duration = Duration::from_secs(10);

/// IP address family, handled independently throughout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddressFamily {
    V4,
    V6,
}

impl AddressFamily {
    /// Whether `ip` belongs to this family.
    pub fn matches(self, ip: &IpAddr) -> bool {
        match self {
            AddressFamily::V4 => ip.is_ipv4(),
            AddressFamily::V6 => ip.is_ipv6(),
        }
    }
}

impl fmt::Display for AddressFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AddressFamily::V4 => f.write_str("IPv4"),
            AddressFamily::V6 => f.write_str("IPv6"),
        }
    }
}

/// Source of the two addresses the reconciler compares.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait IpSource: Send + Sync {
    /// Current public IP for `family`, as reported by the lookup service.
    async fn fetch_public_ip(&self, family: AddressFamily) -> Result<String>;

    /// Address currently published for `hostname`, `None` when there is none.
    async fn resolve_hostname_ip(&self, hostname: &str, family: AddressFamily) -> Option<String>;
}

#[derive(Debug, Deserialize)]
struct LookupResponse {
    ip: Option<String>,
}

/// IP detector backed by ipify and the system resolver.
pub struct IpDetector {
    client: reqwest::Client,
    ipv4_url: String,
    ipv6_url: String,
}

impl IpDetector {
    /// Create a new IP detector with the default lookup endpoints.
    pub fn new() -> Result<Self> {
        Self::with_endpoints(IPV4_LOOKUP_URL.to_string(), IPV6_LOOKUP_URL.to_string())
    }

    /// Create a new IP detector with custom lookup endpoints.
    pub fn with_endpoints(ipv4_url: String, ipv6_url: String) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(LOOKUP_TIMEOUT).build()?;

        Ok(Self {
            client,
            ipv4_url,
            ipv6_url,
        })
    }

    fn endpoint(&self, family: AddressFamily) -> &str {
        match family {
            AddressFamily::V4 => &self.ipv4_url,
            AddressFamily::V6 => &self.ipv6_url,
        }
    }
}

#[async_trait]
impl IpSource for IpDetector {
    async fn fetch_public_ip(&self, family: AddressFamily) -> Result<String> {
        let url = self.endpoint(family);

        let response = self.client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                DdnsError::Network(format!(
                    "Timed out after {}s fetching public {} from {}",
                    LOOKUP_TIMEOUT.as_secs(),
                    family,
                    url
                ))
            } else {
                DdnsError::Network(format!("Request to {} failed: {}", url, e))
            }
        })?;

        if !response.status().is_success() {
            return Err(DdnsError::Network(format!(
                "HTTP {} from {}",
                response.status(),
                url
            )));
        }

        let body = response.text().await?;
        let parsed: LookupResponse = serde_json::from_str(&body)?;

        match parsed.ip.as_deref().map(str::trim) {
            Some(ip) if !ip.is_empty() => {
                tracing::debug!("Public {} reported by {}: {}", family, url, ip);
                Ok(ip.to_string())
            }
            _ => Err(DdnsError::Parse(format!(
                "Response from {} has no \"ip\" field: {}",
                url,
                body.trim()
            ))),
        }
    }

    async fn resolve_hostname_ip(&self, hostname: &str, family: AddressFamily) -> Option<String> {
        match tokio::net::lookup_host((hostname, 0)).await {
            Ok(addrs) => {
                let found = addrs.map(|addr| addr.ip()).find(|ip| family.matches(ip));
                if found.is_none() {
                    tracing::info!("No {} record published for {}", family, hostname);
                }
                found.map(|ip| ip.to_string())
            }
            Err(e) if is_missing_name(&e) => {
                tracing::info!("No {} record published for {} ({})", family, hostname, e);
                None
            }
            Err(e) => {
                tracing::warn!("Resolving {} ({}) failed: {}", hostname, family, e);
                None
            }
        }
    }
}

/// Resolver answers meaning the name has no address (EAI_NONAME, EAI_NODATA).
fn is_missing_name(err: &std::io::Error) -> bool {
    const MARKERS: &[&str] = &[
        "name or service not known",
        "no address associated with hostname",
        "nodename nor servname provided",
        "no such host is known",
    ];

    if err.kind() == std::io::ErrorKind::NotFound {
        return true;
    }
    let message = err.to_string().to_ascii_lowercase();
    MARKERS.iter().any(|marker| message.contains(marker))
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn detector_for(server: &MockServer) -> IpDetector {
        IpDetector::with_endpoints(
            format!("{}/v4?format=json", server.uri()),
            format!("{}/v6?format=json", server.uri()),
        )
        .unwrap()
    }

    #[test]
    fn test_family_matches() {
        let v4: IpAddr = "203.0.113.5".parse().unwrap();
        let v6: IpAddr = "2001:db8::1".parse().unwrap();
        assert!(AddressFamily::V4.matches(&v4));
        assert!(!AddressFamily::V4.matches(&v6));
        assert!(AddressFamily::V6.matches(&v6));
        assert_eq!(AddressFamily::V6.to_string(), "IPv6");
    }

    #[tokio::test]
    async fn test_fetch_public_ipv4() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/v4"))
            .and(query_param("format", "json"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"ip": "198.51.100.7"})),
            )
            .expect(1)
            .mount(&mock_server)
            .await;

        let detector = detector_for(&mock_server);
        let ip = detector.fetch_public_ip(AddressFamily::V4).await.unwrap();
        assert_eq!(ip, "198.51.100.7");
    }

    #[tokio::test]
    async fn test_fetch_public_ipv6_uses_v6_endpoint() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/v6"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"ip": "2001:db8::1"})),
            )
            .expect(1)
            .mount(&mock_server)
            .await;

        let detector = detector_for(&mock_server);
        let ip = detector.fetch_public_ip(AddressFamily::V6).await.unwrap();
        assert_eq!(ip, "2001:db8::1");
    }

    #[tokio::test]
    async fn test_fetch_missing_ip_field() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"addr": "1.2.3.4"})))
            .mount(&mock_server)
            .await;

        let detector = detector_for(&mock_server);
        let err = detector.fetch_public_ip(AddressFamily::V4).await.unwrap_err();
        assert!(matches!(err, DdnsError::Parse(_)));
    }

    #[tokio::test]
    async fn test_fetch_malformed_body() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("198.51.100.7"))
            .mount(&mock_server)
            .await;

        let detector = detector_for(&mock_server);
        let err = detector.fetch_public_ip(AddressFamily::V4).await.unwrap_err();
        assert!(matches!(err, DdnsError::Parse(_)));
    }

    #[tokio::test]
    async fn test_fetch_http_error() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&mock_server)
            .await;

        let detector = detector_for(&mock_server);
        let err = detector.fetch_public_ip(AddressFamily::V4).await.unwrap_err();
        assert!(matches!(err, DdnsError::Network(_)));
    }

    #[tokio::test]
    async fn test_fetch_unreachable() {
        let mock_server = MockServer::start().await;
        let detector = detector_for(&mock_server);
        drop(mock_server);

        let err = detector.fetch_public_ip(AddressFamily::V4).await.unwrap_err();
        assert!(matches!(err, DdnsError::Network(_)));
    }

    #[test]
    fn test_missing_name_vs_resolver_failure() {
        use std::io::{Error, ErrorKind};

        let nxdomain = Error::new(
            ErrorKind::Other,
            "failed to lookup address information: Name or service not known",
        );
        let nodata = Error::new(
            ErrorKind::Other,
            "failed to lookup address information: No address associated with hostname",
        );
        let outage = Error::new(
            ErrorKind::Other,
            "failed to lookup address information: Temporary failure in name resolution",
        );

        assert!(is_missing_name(&nxdomain));
        assert!(is_missing_name(&nodata));
        assert!(!is_missing_name(&outage));
    }

    #[tokio::test]
    async fn test_resolve_filters_by_family() {
        let detector = IpDetector::new().unwrap();

        let v4 = detector
            .resolve_hostname_ip("203.0.113.5", AddressFamily::V4)
            .await;
        assert_eq!(v4.as_deref(), Some("203.0.113.5"));

        let v6 = detector
            .resolve_hostname_ip("203.0.113.5", AddressFamily::V6)
            .await;
        assert_eq!(v6, None);
    }
}
