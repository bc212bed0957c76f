use std::time::{Duration, Instant};

use async_trait::async_trait;
use hosh_primitives::{
    result::ping_millis, CheckRequest, ErrorKind, Module, Probe, ProbeReport,
};
use serde_json::{json, Value};
use tokio::{
    io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt},
    time::timeout,
};
use tokio_rustls::{rustls::pki_types::ServerName, TlsConnector};
use tracing::*;

use crate::{
    dialer::{resolve_host, DialError, Dialer},
    header::parse_header_hex,
    tls::insecure_connector,
};

/// Method asked first unless the caller requests another one.
pub const DEFAULT_METHOD: &str = "blockchain.headers.subscribe";
/// Fallbacks tried in order when the primary method is refused.
const FALLBACK_METHODS: [&str; 2] = ["server.features", "blockchain.numblocks.subscribe"];

pub const DEFAULT_SSL_PORT: u16 = 50002;
pub const DEFAULT_TCP_PORT: u16 = 50001;

const REACHABILITY_TIMEOUT: Duration = Duration::from_secs(5);
const RPC_TIMEOUT: Duration = Duration::from_secs(10);
/// Response framing cap; a header subscription answer is a few hundred
/// bytes, anything near this is garbage.
const MAX_RESPONSE_BYTES: usize = 1 << 20;

/// SSL/plaintext port preferences. SSL attempts always come first.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct PortSpec {
    pub ssl: Option<u16>,
    pub tcp: Option<u16>,
}

impl PortSpec {
    pub fn ssl(port: u16) -> Self {
        Self {
            ssl: Some(port),
            tcp: None,
        }
    }

    pub fn tcp(port: u16) -> Self {
        Self {
            ssl: None,
            tcp: Some(port),
        }
    }

    /// Mapping for bus-driven checks: the request port is the SSL port, and
    /// the default pair also gets the plaintext fallback.
    pub fn from_request_port(port: u16) -> Self {
        if port == DEFAULT_TCP_PORT {
            Self::tcp(port)
        } else if port == DEFAULT_SSL_PORT {
            Self {
                ssl: Some(port),
                tcp: Some(DEFAULT_TCP_PORT),
            }
        } else {
            Self::ssl(port)
        }
    }

    fn attempts(&self) -> Vec<TransportAttempt> {
        let mut attempts = Vec::new();
        if let Some(port) = self.ssl {
            attempts.push(TransportAttempt { port, use_ssl: true });
        }
        if let Some(port) = self.tcp {
            attempts.push(TransportAttempt {
                port,
                use_ssl: false,
            });
        }
        attempts
    }
}

impl From<u16> for PortSpec {
    /// A bare port means plaintext, matching the probe contract.
    fn from(port: u16) -> Self {
        Self::tcp(port)
    }
}

#[derive(Copy, Clone, Debug)]
struct TransportAttempt {
    port: u16,
    use_ssl: bool,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ConnectionType {
    Ssl,
    Plaintext,
}

impl ConnectionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionType::Ssl => "SSL",
            ConnectionType::Plaintext => "Plaintext",
        }
    }
}

/// How a single (transport, method) attempt failed.
enum AttemptError {
    /// Try the next method on the same transport.
    Method {
        kind: ErrorKind,
        detail: String,
        rpc_error: Option<Value>,
    },
    /// The transport is unusable; move on to the next one.
    Transport { kind: ErrorKind, detail: String },
}

struct AttemptSuccess {
    result: Value,
    ping_ms: f64,
    method: String,
    connection_type: ConnectionType,
    self_signed: bool,
}

/// Probes Electrum servers. One instance serves a whole worker; per-check
/// state lives on the stack.
pub struct ElectrumProbe {
    tor_proxy: String,
    tls: TlsConnector,
}

impl ElectrumProbe {
    pub fn new(tor_proxy: impl Into<String>) -> Self {
        Self {
            tor_proxy: tor_proxy.into(),
            tls: insecure_connector(),
        }
    }

    /// Runs the full probe state machine against one server.
    ///
    /// `method` defaults to [`DEFAULT_METHOD`]; `params` are only applied to
    /// the caller-requested method, fallbacks always get `[]`.
    pub async fn probe_server(
        &self,
        host: &str,
        ports: PortSpec,
        method: Option<&str>,
        params: &Value,
    ) -> ProbeReport {
        let attempts = ports.attempts();
        if attempts.is_empty() {
            return ProbeReport::offline(ErrorKind::InternalError, "no ports configured");
        }

        let dialer = Dialer::for_host(host, &self.tor_proxy);

        let resolved_ips: Vec<String> = if dialer.is_tor() {
            Vec::new()
        } else {
            match resolve_host(host).await {
                Ok(ips) => ips.iter().map(ToString::to_string).collect(),
                Err(e) => {
                    return ProbeReport::offline(ErrorKind::HostUnreachable, e.to_string());
                }
            }
        };

        // Reachability pre-check: one cheap connect before spending RPC
        // deadlines on a dead host.
        let mut last_dial: Option<DialError> = None;
        let mut reachable = false;
        for attempt in &attempts {
            match dialer.connect(host, attempt.port, REACHABILITY_TIMEOUT).await {
                Ok(_stream) => {
                    reachable = true;
                    break;
                }
                Err(e) => {
                    debug!(%host, port = attempt.port, err = %e, "reachability connect failed");
                    last_dial = Some(e);
                }
            }
        }
        if !reachable {
            let is_tor = last_dial.as_ref().is_some_and(|e| e.is_tor());
            let kind = if is_tor {
                ErrorKind::TorError
            } else {
                ErrorKind::HostUnreachable
            };
            let detail = last_dial
                .map(|e| e.to_string())
                .unwrap_or_else(|| "server is unreachable".to_string());
            return ProbeReport::offline(kind, detail).with_resolved_ips(resolved_ips);
        }

        let primary = method.unwrap_or(DEFAULT_METHOD);
        let mut methods: Vec<(&str, Value)> = vec![(primary, params.clone())];
        for fallback in FALLBACK_METHODS {
            if fallback != primary {
                methods.push((fallback, json!([])));
            }
        }

        let mut protocol_failure: Option<String> = None;
        let mut last_error: Option<(ErrorKind, String)> = None;

        for transport in &attempts {
            for (method_name, method_params) in &methods {
                match self
                    .run_attempt(&dialer, host, *transport, method_name, method_params)
                    .await
                {
                    Ok(success) => match build_response_data(&success, &resolved_ips) {
                        Ok(data) => {
                            info!(
                                %host,
                                method = %success.method,
                                transport = success.connection_type.as_str(),
                                ping_ms = success.ping_ms,
                                "probe succeeded"
                            );
                            return ProbeReport::online(success.ping_ms, resolved_ips, data);
                        }
                        Err(detail) => {
                            warn!(%host, method = %method_name, %detail, "response parse failed");
                            protocol_failure = Some(detail);
                        }
                    },
                    Err(AttemptError::Method {
                        kind,
                        detail,
                        rpc_error,
                    }) => {
                        debug!(%host, method = %method_name, %detail, "method attempt failed");
                        if let Some(err) = rpc_error {
                            protocol_failure = Some(err.to_string());
                        }
                        last_error = Some((kind, detail));
                    }
                    Err(AttemptError::Transport { kind, detail }) => {
                        debug!(%host, port = transport.port, %detail, "transport attempt failed");
                        last_error = Some((kind, detail));
                        break;
                    }
                }
            }
        }

        // All (transport, method) pairs exhausted. The most informative
        // failure wins: a protocol-level refusal beats a connect failure.
        let (kind, detail) = match (protocol_failure, last_error) {
            (Some(detail), _) => (ErrorKind::ProtocolError, detail),
            (None, Some((kind, detail))) => (kind, detail),
            (None, None) => (
                ErrorKind::ConnectionError,
                "all methods failed".to_string(),
            ),
        };
        ProbeReport::offline(kind, detail).with_resolved_ips(resolved_ips)
    }

    async fn run_attempt(
        &self,
        dialer: &Dialer,
        host: &str,
        transport: TransportAttempt,
        method: &str,
        params: &Value,
    ) -> Result<AttemptSuccess, AttemptError> {
        let stream = dialer
            .connect(host, transport.port, RPC_TIMEOUT)
            .await
            .map_err(|e| AttemptError::Transport {
                kind: if e.is_tor() {
                    ErrorKind::TorError
                } else {
                    ErrorKind::ConnectionError
                },
                detail: e.to_string(),
            })?;

        let request = format!("{}\n", json!({"id": 1, "method": method, "params": params}));

        let (raw, ping_ms) = if transport.use_ssl {
            let server_name = ServerName::try_from(host.to_string()).map_err(|e| {
                AttemptError::Transport {
                    kind: ErrorKind::ConnectionError,
                    detail: format!("invalid tls server name: {e}"),
                }
            })?;
            let mut tls_stream = match timeout(RPC_TIMEOUT, self.tls.connect(server_name, stream))
                .await
            {
                Ok(Ok(stream)) => stream,
                Ok(Err(e)) => {
                    return Err(AttemptError::Transport {
                        kind: ErrorKind::ConnectionError,
                        detail: format!("tls handshake failed: {e}"),
                    })
                }
                Err(_) => {
                    return Err(AttemptError::Transport {
                        kind: ErrorKind::ConnectionError,
                        detail: "tls handshake timed out".to_string(),
                    })
                }
            };
            exchange(&mut tls_stream, &request).await?
        } else {
            let mut stream = stream;
            exchange(&mut stream, &request).await?
        };

        let response: Value =
            serde_json::from_slice(&raw).map_err(|e| AttemptError::Method {
                kind: ErrorKind::ProtocolError,
                detail: format!("undecodable response: {e}"),
                rpc_error: None,
            })?;

        let connection_type = if transport.use_ssl {
            ConnectionType::Ssl
        } else {
            ConnectionType::Plaintext
        };

        match response.get("result") {
            Some(result) if !result.is_null() => Ok(AttemptSuccess {
                result: result.clone(),
                ping_ms,
                method: method.to_string(),
                connection_type,
                self_signed: transport.use_ssl,
            }),
            _ => Err(AttemptError::Method {
                kind: ErrorKind::ProtocolError,
                detail: "response missing 'result' field".to_string(),
                rpc_error: response.get("error").cloned(),
            }),
        }
    }
}

#[async_trait]
impl Probe for ElectrumProbe {
    fn module(&self) -> Module {
        Module::Btc
    }

    async fn probe(&self, request: &CheckRequest) -> ProbeReport {
        let ports = PortSpec::from_request_port(request.port);
        self.probe_server(&request.host, ports, None, &json!([])).await
    }
}

/// Sends one newline-framed request and reads one response. The round trip
/// is measured from just before the send to just after the receive.
async fn exchange<S>(stream: &mut S, request: &str) -> Result<(Vec<u8>, f64), AttemptError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let started = Instant::now();

    match timeout(RPC_TIMEOUT, stream.write_all(request.as_bytes())).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => return Err(io_error(e)),
        Err(_) => return Err(rpc_timeout("request send timed out")),
    }

    let raw = match timeout(RPC_TIMEOUT, read_response(stream)).await {
        Ok(result) => result?,
        Err(_) => return Err(rpc_timeout("response read timed out")),
    };

    Ok((raw, ping_millis(started.elapsed())))
}

/// Reads until the first newline or until the buffer is a complete JSON
/// value, whichever comes first, capped at [`MAX_RESPONSE_BYTES`].
async fn read_response<S>(stream: &mut S) -> Result<Vec<u8>, AttemptError>
where
    S: AsyncRead + Unpin,
{
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];

    loop {
        let n = stream.read(&mut chunk).await.map_err(io_error)?;
        if n == 0 {
            if buf.is_empty() {
                return Err(AttemptError::Method {
                    kind: ErrorKind::ConnectionError,
                    detail: "connection closed before response".to_string(),
                    rpc_error: None,
                });
            }
            // Some servers close instead of framing; let the decoder judge.
            return Ok(buf);
        }

        let scan_from = buf.len();
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf[scan_from..].iter().position(|b| *b == b'\n') {
            buf.truncate(scan_from + pos);
            return Ok(buf);
        }

        if buf.len() > MAX_RESPONSE_BYTES {
            return Err(AttemptError::Method {
                kind: ErrorKind::ProtocolError,
                detail: "response exceeds framing cap".to_string(),
                rpc_error: None,
            });
        }

        if serde_json::from_slice::<serde::de::IgnoredAny>(&buf).is_ok() {
            return Ok(buf);
        }
    }
}

fn io_error(e: std::io::Error) -> AttemptError {
    AttemptError::Method {
        kind: ErrorKind::ConnectionError,
        detail: e.to_string(),
        rpc_error: None,
    }
}

fn rpc_timeout(detail: &str) -> AttemptError {
    AttemptError::Method {
        kind: ErrorKind::Timeout,
        detail: detail.to_string(),
        rpc_error: None,
    }
}

/// Builds `response_data` from a successful RPC result.
///
/// A `hex` field holding an 80-byte header is replaced by its parsed fields;
/// a bare integer result is the reported height; any other object passes
/// through under its own keys.
fn build_response_data(
    success: &AttemptSuccess,
    resolved_ips: &[String],
) -> Result<Value, String> {
    let mut data = serde_json::Map::new();

    match &success.result {
        Value::Object(fields) => {
            for (key, value) in fields {
                if key != "hex" {
                    data.insert(key.clone(), value.clone());
                }
            }
            if let Some(hex_value) = fields.get("hex") {
                let hex_str = hex_value
                    .as_str()
                    .ok_or_else(|| "header hex is not a string".to_string())?;
                let header = parse_header_hex(hex_str).map_err(|e| e.to_string())?;
                let header_json =
                    serde_json::to_value(&header).map_err(|e| e.to_string())?;
                if let Value::Object(header_fields) = header_json {
                    data.extend(header_fields);
                }
            }
        }
        Value::Number(height) => {
            data.insert("height".to_string(), Value::Number(height.clone()));
        }
        other => {
            data.insert("result".to_string(), other.clone());
        }
    }

    data.insert("method_used".to_string(), json!(success.method));
    data.insert(
        "connection_type".to_string(),
        json!(success.connection_type.as_str()),
    );
    data.insert("self_signed".to_string(), json!(success.self_signed));
    data.insert("resolved_ips".to_string(), json!(resolved_ips));

    Ok(Value::Object(data))
}
