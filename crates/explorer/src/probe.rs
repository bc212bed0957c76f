use std::time::{Duration, Instant};

use async_trait::async_trait;
use hosh_config::ExplorerConfig;
use hosh_primitives::{
    result::ping_millis, CheckRequest, ErrorKind, Module, Probe, ProbeReport,
};
use serde_json::json;
use tracing::*;

use crate::extractor::Extractor;

const HTTP_TIMEOUT: Duration = Duration::from_secs(10);
const USER_AGENT: &str = concat!("hosh-checker/", env!("CARGO_PKG_VERSION"));

/// Probes block explorers over HTTP(S), with a SOCKS-proxied client for
/// `.onion` explorer urls.
pub struct HttpProbe {
    explorers: Vec<ExplorerConfig>,
    clearnet: reqwest::Client,
    tor: reqwest::Client,
}

impl HttpProbe {
    pub fn new(
        explorers: Vec<ExplorerConfig>,
        tor_proxy_addr: &str,
    ) -> Result<Self, reqwest::Error> {
        let clearnet = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(HTTP_TIMEOUT)
            .build()?;
        let tor = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(HTTP_TIMEOUT)
            .proxy(reqwest::Proxy::all(format!("socks5h://{tor_proxy_addr}"))?)
            .build()?;
        Ok(Self {
            explorers,
            clearnet,
            tor,
        })
    }

    fn find_explorer(&self, key: &str) -> Option<&ExplorerConfig> {
        self.explorers
            .iter()
            .find(|e| e.explorer_id == key || e.url == key)
    }

    /// Fetches one explorer page and extracts the reported tip.
    pub async fn probe_explorer(&self, explorer: &ExplorerConfig) -> ProbeReport {
        let extractor = match Extractor::compile(&explorer.extractor) {
            Ok(extractor) => extractor,
            Err(e) => {
                return ProbeReport::offline(
                    ErrorKind::InternalError,
                    format!("extractor for {} does not compile: {e}", explorer.explorer_id),
                )
            }
        };

        let uses_tor = explorer.url.contains(".onion");
        let client = if uses_tor { &self.tor } else { &self.clearnet };

        let started = Instant::now();
        let response = match client.get(&explorer.url).send().await {
            Ok(response) => response,
            Err(e) => {
                let kind = if uses_tor {
                    ErrorKind::TorError
                } else if e.is_timeout() {
                    ErrorKind::Timeout
                } else if e.is_connect() {
                    ErrorKind::HostUnreachable
                } else {
                    ErrorKind::ConnectionError
                };
                debug!(explorer = %explorer.explorer_id, err = %e, "explorer fetch failed");
                return ProbeReport::offline(kind, e.to_string());
            }
        };

        let status = response.status();
        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => return ProbeReport::offline(ErrorKind::ConnectionError, e.to_string()),
        };
        let ping = ping_millis(started.elapsed());

        if !status.is_success() {
            return ProbeReport::offline(
                ErrorKind::ProtocolError,
                format!("unexpected http status {status}"),
            );
        }

        match extractor.extract(&body) {
            Ok(height) => {
                info!(explorer = %explorer.explorer_id, %height, ping_ms = ping, "explorer tip");
                ProbeReport::online(
                    ping,
                    Vec::new(),
                    json!({
                        "block_height": height,
                        "explorer_id": explorer.explorer_id,
                        "chain": explorer.chain,
                        "url": explorer.url,
                    }),
                )
            }
            Err(e) => ProbeReport::offline(ErrorKind::ProtocolError, e.to_string()),
        }
    }
}

#[async_trait]
impl Probe for HttpProbe {
    fn module(&self) -> Module {
        Module::Http
    }

    async fn probe(&self, request: &CheckRequest) -> ProbeReport {
        match self.find_explorer(&request.host) {
            Some(explorer) => self.probe_explorer(explorer).await,
            None => ProbeReport::offline(
                ErrorKind::ProtocolError,
                format!("no configured explorer matches '{}'", request.host),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use hosh_config::ExtractorSpec;
    use hosh_primitives::Status;
    use tokio::{
        io::{AsyncReadExt, AsyncWriteExt},
        net::TcpListener,
    };

    use super::*;

    /// One-shot HTTP fixture returning `status` and `body`.
    async fn spawn_http_fixture(status: &'static str, body: &'static str) -> u16 {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        tokio::spawn(async move {
            loop {
                let Ok((mut stream, _)) = listener.accept().await else {
                    break;
                };
                let mut buf = [0u8; 2048];
                let _ = stream.read(&mut buf).await;
                let response = format!(
                    "HTTP/1.1 {status}\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                    body.len()
                );
                let _ = stream.write_all(response.as_bytes()).await;
            }
        });

        port
    }

    fn explorer_for(port: u16, extractor: ExtractorSpec) -> ExplorerConfig {
        ExplorerConfig {
            explorer_id: "fixture".to_string(),
            chain: Module::Btc,
            url: format!("http://127.0.0.1:{port}/height"),
            extractor,
        }
    }

    fn probe_with(explorer: ExplorerConfig) -> HttpProbe {
        HttpProbe::new(vec![explorer], "127.0.0.1:1").unwrap()
    }

    fn request_for(host: &str) -> CheckRequest {
        CheckRequest {
            host: host.to_string(),
            port: 443,
            module: Module::Http,
            check_id: "c1".to_string(),
            user_submitted: false,
            dry_run: false,
            version: None,
        }
    }

    #[tokio::test]
    async fn test_happy_path_regex() {
        let port = spawn_http_fixture("200 OK", "840123").await;
        let probe = probe_with(explorer_for(
            port,
            ExtractorSpec::Regex {
                pattern: r"(\d+)".to_string(),
            },
        ));

        let report = probe.probe(&request_for("fixture")).await;
        assert_eq!(report.status, Status::Online);
        assert_eq!(report.response_data["block_height"], 840123);
        assert_eq!(report.response_data["explorer_id"], "fixture");
        assert!(report.ping_ms.is_some());
    }

    #[tokio::test]
    async fn test_happy_path_json_path() {
        let port =
            spawn_http_fixture("200 OK", r#"{"data":{"best_block_height":840123}}"#).await;
        let probe = probe_with(explorer_for(
            port,
            ExtractorSpec::JsonPath {
                path: "data.best_block_height".to_string(),
            },
        ));

        let report = probe.probe(&request_for("fixture")).await;
        assert_eq!(report.status, Status::Online);
        assert_eq!(report.response_data["block_height"], 840123);
    }

    #[tokio::test]
    async fn test_http_error_status_is_protocol_error() {
        let port = spawn_http_fixture("500 Internal Server Error", "oops").await;
        let probe = probe_with(explorer_for(
            port,
            ExtractorSpec::Regex {
                pattern: r"(\d+)".to_string(),
            },
        ));

        let report = probe.probe(&request_for("fixture")).await;
        assert_eq!(report.status, Status::Offline);
        assert_eq!(report.error_kind, Some(ErrorKind::ProtocolError));
    }

    #[tokio::test]
    async fn test_unknown_explorer_id() {
        let port = spawn_http_fixture("200 OK", "840123").await;
        let probe = probe_with(explorer_for(
            port,
            ExtractorSpec::Regex {
                pattern: r"(\d+)".to_string(),
            },
        ));

        let report = probe.probe(&request_for("not-configured")).await;
        assert_eq!(report.status, Status::Offline);
        assert_eq!(report.error_kind, Some(ErrorKind::ProtocolError));
    }

    #[tokio::test]
    async fn test_extraction_miss_is_protocol_error() {
        let port = spawn_http_fixture("200 OK", "maintenance page").await;
        let probe = probe_with(explorer_for(
            port,
            ExtractorSpec::Regex {
                pattern: r"height=(\d+)".to_string(),
            },
        ));

        let report = probe.probe(&request_for("fixture")).await;
        assert_eq!(report.status, Status::Offline);
        assert_eq!(report.error_kind, Some(ErrorKind::ProtocolError));
    }
}
