//! # infomaniak-ddns
//!
//! A Dynamic DNS client that keeps one Infomaniak hostname pointed at the
//! host's current public IP.
//!
//! ## Features
//!
//! - Public IPv4 (and optionally IPv6) detection through ipify
//! - Compares against the record published in DNS before touching the provider
//! - Remembers the last address sent per family so a rejected update is not
//!   retried every cycle
//! - Classifies `/nic/update` answers (`good`, `nochg`, `badauth`, ...)
//!
//! ## Usage
//!
//! ```bash
//! export INFOMANIAK_DDNS_HOSTNAME=home.example.com
//! export INFOMANIAK_DDNS_USERNAME=ddns-user
//! export INFOMANIAK_DDNS_PASSWORD=secret
//! export DDNS_ENABLE_IPV6=true
//!
//! # Poll forever (every DDNS_INTERVAL_SECONDS, default 300)
//! infomaniak-ddns
//!
//! # Single check
//! infomaniak-ddns --once
//! ```

pub mod config;
pub mod detector;
pub mod error;
pub mod providers;
pub mod reconciler;

pub use config::Target;
pub use detector::{AddressFamily, IpDetector};
pub use error::{DdnsError, Result};
pub use reconciler::Reconciler;
