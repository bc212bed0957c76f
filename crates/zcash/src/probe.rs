use std::time::{Duration, Instant};

use async_trait::async_trait;
use hosh_primitives::{result::ping_millis, CheckRequest, ErrorKind, Module, Probe, ProbeReport};
use serde_json::json;
use tonic::{
    transport::{Channel, ClientTlsConfig},
    Code,
};
use tracing::*;

use crate::proto::{compact_tx_streamer_client::CompactTxStreamerClient, ChainSpec};

const GRPC_TIMEOUT: Duration = Duration::from_secs(10);

/// Probes lightwalletd servers over TLS gRPC.
#[derive(Default)]
pub struct ZcashProbe;

impl ZcashProbe {
    pub fn new() -> Self {
        Self
    }

    pub async fn probe_lightwalletd(&self, host: &str, port: u16) -> ProbeReport {
        if host.ends_with(".onion") {
            // No SOCKS path through tonic; hidden-service lightwalletd
            // targets are reported instead of silently skipped.
            return ProbeReport::offline(
                ErrorKind::TorError,
                "lightwalletd checks are not routed over tor",
            );
        }

        let resolved_ips = match tokio::net::lookup_host((host, port)).await {
            Ok(addrs) => {
                let mut ips: Vec<String> = Vec::new();
                for addr in addrs {
                    let ip = addr.ip().to_string();
                    if !ips.contains(&ip) {
                        ips.push(ip);
                    }
                }
                ips
            }
            Err(e) => {
                return ProbeReport::offline(
                    ErrorKind::HostUnreachable,
                    format!("could not resolve {host}: {e}"),
                )
            }
        };

        let endpoint = match Channel::from_shared(format!("https://{host}:{port}")) {
            Ok(endpoint) => endpoint,
            Err(e) => {
                return ProbeReport::offline(
                    ErrorKind::InternalError,
                    format!("invalid endpoint for {host}:{port}: {e}"),
                )
            }
        };
        let tls = ClientTlsConfig::new()
            .with_native_roots()
            .domain_name(host);
        let endpoint = match endpoint.tls_config(tls) {
            Ok(endpoint) => endpoint
                .connect_timeout(GRPC_TIMEOUT)
                .timeout(GRPC_TIMEOUT),
            Err(e) => {
                return ProbeReport::offline(
                    ErrorKind::ConnectionError,
                    format!("tls config rejected: {e}"),
                )
            }
        };

        let channel = match endpoint.connect().await {
            Ok(channel) => channel,
            Err(e) => {
                debug!(%host, %port, err = %e, "lightwalletd connect failed");
                return ProbeReport::offline(ErrorKind::HostUnreachable, e.to_string())
                    .with_resolved_ips(resolved_ips);
            }
        };

        let mut client = CompactTxStreamerClient::new(channel);
        let started = Instant::now();
        match client.get_latest_block(ChainSpec {}).await {
            Ok(response) => {
                let ping = ping_millis(started.elapsed());
                let block = response.into_inner();
                // Hash arrives in internal byte order; display reversed.
                let mut hash = block.hash;
                hash.reverse();
                info!(%host, height = block.height, ping_ms = ping, "lightwalletd tip");
                ProbeReport::online(
                    ping,
                    resolved_ips,
                    json!({"height": block.height, "hash": hex::encode(hash)}),
                )
            }
            Err(status) => {
                let kind = match status.code() {
                    Code::DeadlineExceeded | Code::Cancelled => ErrorKind::Timeout,
                    Code::Unavailable => ErrorKind::ConnectionError,
                    _ => ErrorKind::ProtocolError,
                };
                ProbeReport::offline(
                    kind,
                    format!("grpc {:?}: {}", status.code(), status.message()),
                )
                .with_resolved_ips(resolved_ips)
            }
        }
    }
}

#[async_trait]
impl Probe for ZcashProbe {
    fn module(&self) -> Module {
        Module::Zec
    }

    async fn probe(&self, request: &CheckRequest) -> ProbeReport {
        self.probe_lightwalletd(&request.host, request.port).await
    }
}

#[cfg(test)]
mod tests {
    use hosh_primitives::Status;

    use super::*;

    #[tokio::test]
    async fn test_onion_target_reports_tor_error() {
        let probe = ZcashProbe::new();
        let report = probe.probe_lightwalletd("lwd.onion", 9067).await;
        assert_eq!(report.status, Status::Offline);
        assert_eq!(report.error_kind, Some(ErrorKind::TorError));
    }

    #[tokio::test]
    async fn test_refused_port_reports_unreachable() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let probe = ZcashProbe::new();
        let report = probe.probe_lightwalletd("127.0.0.1", port).await;
        assert_eq!(report.status, Status::Offline);
        assert_eq!(report.error_kind, Some(ErrorKind::HostUnreachable));
        assert!(report.ping_ms.is_none());
    }
}
