use std::{net::IpAddr, time::Duration};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{check::CheckRequest, module::Module};

/// Whether a probe reached the server and got a usable answer.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Online,
    Offline,
}

/// Failure taxonomy carried in `ProbeResult.error_kind`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// DNS failure or no TCP connect within the reachability window.
    HostUnreachable,
    /// Mid-stream socket error or TLS handshake failure.
    ConnectionError,
    /// Undecodable response, missing `result`, malformed header, bad gRPC
    /// status.
    ProtocolError,
    /// Probe budget or a terminal per-operation deadline exceeded.
    Timeout,
    /// SOCKS handshake failure for a `.onion` target.
    TorError,
    /// Bug in the probe itself; published, never swallowed.
    InternalError,
}

/// Probe-side outcome, before the worker stamps identity and timing.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProbeReport {
    pub status: Status,
    pub ping_ms: Option<f64>,
    #[serde(default)]
    pub resolved_ips: Vec<String>,
    pub response_data: serde_json::Value,
    pub error_kind: Option<ErrorKind>,
    pub error_detail: Option<String>,
}

impl ProbeReport {
    pub fn online(ping_ms: f64, resolved_ips: Vec<String>, response_data: serde_json::Value) -> Self {
        Self {
            status: Status::Online,
            ping_ms: Some(ping_ms),
            resolved_ips,
            response_data,
            error_kind: None,
            error_detail: None,
        }
    }

    pub fn offline(kind: ErrorKind, detail: impl Into<String>) -> Self {
        Self {
            status: Status::Offline,
            ping_ms: None,
            resolved_ips: Vec::new(),
            response_data: serde_json::Value::Null,
            error_kind: Some(kind),
            error_detail: Some(detail.into()),
        }
    }

    pub fn with_resolved_ips(mut self, ips: Vec<String>) -> Self {
        self.resolved_ips = ips;
        self
    }

    pub fn is_online(&self) -> bool {
        self.status == Status::Online
    }
}

/// Identity stamped onto every result a worker publishes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CheckerIdentity {
    pub id: String,
    pub location: String,
}

impl CheckerIdentity {
    pub fn new(id: impl Into<String>, location: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            location: location.into(),
        }
    }
}

/// A completed check as published on `result.<module>`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProbeResult {
    pub check_id: String,
    pub host: String,
    pub module: Module,
    pub resolved_ip: Option<String>,
    pub ip_version: Option<u8>,
    pub status: Status,
    pub ping_ms: Option<f64>,
    pub response_data: serde_json::Value,
    pub error_kind: Option<ErrorKind>,
    pub error_detail: Option<String>,
    pub checker_id: String,
    pub checker_location: String,
    pub checked_at: DateTime<Utc>,
    pub user_submitted: bool,
}

impl ProbeResult {
    /// Stamps a probe report into the wire record for a request.
    pub fn stamp(
        request: &CheckRequest,
        report: ProbeReport,
        identity: &CheckerIdentity,
        checked_at: DateTime<Utc>,
    ) -> Self {
        let resolved_ip = report.resolved_ips.first().cloned();
        let ip_version = resolved_ip
            .as_deref()
            .and_then(|s| s.parse::<IpAddr>().ok())
            .map(|ip| match ip {
                IpAddr::V4(_) => 4,
                IpAddr::V6(_) => 6,
            });

        Self {
            check_id: request.check_id.clone(),
            host: request.host.clone(),
            module: request.module,
            resolved_ip,
            ip_version,
            status: report.status,
            ping_ms: report.ping_ms,
            response_data: report.response_data,
            error_kind: report.error_kind,
            error_detail: report.error_detail,
            checker_id: identity.id.clone(),
            checker_location: identity.location.clone(),
            checked_at,
            user_submitted: request.user_submitted,
        }
    }
}

/// Converts a measured round trip into the wire `ping_ms` value, rounded to
/// two decimals.
pub fn ping_millis(elapsed: Duration) -> f64 {
    (elapsed.as_secs_f64() * 1000.0 * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> CheckRequest {
        CheckRequest {
            host: "electrum.example.org".to_string(),
            port: 50002,
            module: Module::Btc,
            check_id: "c1".to_string(),
            user_submitted: true,
            dry_run: false,
            version: None,
        }
    }

    #[test]
    fn test_online_report_invariants() {
        let r = ProbeReport::online(12.34, vec!["203.0.113.7".into()], serde_json::json!({}));
        assert!(r.is_online());
        assert!(r.ping_ms.is_some(), "online implies a measured ping");
        assert!(r.error_kind.is_none(), "online implies no error kind");
    }

    #[test]
    fn test_offline_report_invariants() {
        let r = ProbeReport::offline(ErrorKind::HostUnreachable, "no route");
        assert!(!r.is_online());
        assert!(r.ping_ms.is_none());
        assert_eq!(r.error_kind, Some(ErrorKind::HostUnreachable));
    }

    #[test]
    fn test_stamp_derives_ip_fields() {
        let report = ProbeReport::online(
            5.0,
            vec!["2001:db8::1".into(), "203.0.113.7".into()],
            serde_json::json!({"height": 840123}),
        );
        let identity = CheckerIdentity::new("checker-1", "eu-west");
        let res = ProbeResult::stamp(&request(), report, &identity, Utc::now());

        assert_eq!(res.resolved_ip.as_deref(), Some("2001:db8::1"));
        assert_eq!(res.ip_version, Some(6));
        assert!(res.user_submitted, "user flag is echoed from the request");
        assert_eq!(res.checker_id, "checker-1");
    }

    #[test]
    fn test_stamp_offline_has_no_ip() {
        let report = ProbeReport::offline(ErrorKind::Timeout, "budget exceeded");
        let identity = CheckerIdentity::new("checker-1", "eu-west");
        let res = ProbeResult::stamp(&request(), report, &identity, Utc::now());
        assert!(res.resolved_ip.is_none());
        assert!(res.ip_version.is_none());
        assert_eq!(res.status, Status::Offline);
    }

    #[test]
    fn test_error_kind_wire_names() {
        let json = serde_json::to_string(&ErrorKind::HostUnreachable).unwrap();
        assert_eq!(json, "\"host_unreachable\"");
        let json = serde_json::to_string(&ErrorKind::TorError).unwrap();
        assert_eq!(json, "\"tor_error\"");
    }

    #[test]
    fn test_ping_millis_rounding() {
        assert_eq!(ping_millis(Duration::from_micros(12_345)), 12.35);
        assert_eq!(ping_millis(Duration::from_millis(250)), 250.0);
    }
}
