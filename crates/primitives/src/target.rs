use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::module::Module;

/// A single schedulable entry of the target registry.
///
/// Identity is `(hostname, module)`. The registry is the owner: discovery
/// creates rows, the publisher advances `last_queued_at`, the chronicler
/// advances `last_checked_at`. The pipeline never deletes targets.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Target {
    pub hostname: String,
    pub module: Module,
    /// Listening port; module default applies when absent.
    pub port: Option<u16>,
    #[serde(default)]
    pub user_submitted: bool,
    pub last_queued_at: Option<DateTime<Utc>>,
    pub last_checked_at: Option<DateTime<Utc>>,
    /// Advertised version hint carried through to the check request.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

impl Target {
    pub fn new(hostname: impl Into<String>, module: Module) -> Self {
        Self {
            hostname: hostname.into(),
            module,
            port: None,
            user_submitted: false,
            last_queued_at: None,
            last_checked_at: None,
            version: None,
        }
    }

    pub fn port(&self) -> u16 {
        self.port.unwrap_or_else(|| self.module.default_port())
    }
}

/// Rough address class of a hostname, used to order listings the way the
/// fleet is browsed: named hosts first, then hidden services, then bare IPs.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum HostClass {
    Domain,
    Onion,
    Ip,
    Unknown,
}

pub fn classify_host(host: &str) -> HostClass {
    if host.ends_with(".onion") {
        return HostClass::Onion;
    }
    if host.parse::<std::net::IpAddr>().is_ok() {
        return HostClass::Ip;
    }
    let looks_like_domain = host.contains('.')
        && !host.starts_with('-')
        && host
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '.');
    if looks_like_domain {
        HostClass::Domain
    } else {
        HostClass::Unknown
    }
}
