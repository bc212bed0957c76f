use std::{io, net::IpAddr, time::Duration};

use thiserror::Error;
use tokio::{net::TcpStream, time::timeout};
use tracing::*;

use crate::socks::{socks5_connect, SocksError};

pub const ONION_SUFFIX: &str = ".onion";

#[derive(Debug, Error)]
pub enum DialError {
    #[error("could not resolve {host}: {source}")]
    Resolve { host: String, source: io::Error },
    #[error("connect to {host}:{port} failed: {source}")]
    Connect {
        host: String,
        port: u16,
        source: io::Error,
    },
    #[error("connect to {host}:{port} timed out")]
    ConnectTimeout { host: String, port: u16 },
    #[error("tor proxy {proxy} unreachable: {detail}")]
    ProxyUnreachable { proxy: String, detail: String },
    #[error("socks handshake with {proxy} failed: {source}")]
    Socks { proxy: String, source: SocksError },
    #[error("socks handshake with {proxy} timed out")]
    SocksTimeout { proxy: String },
}

impl DialError {
    /// True when the failure is on the Tor side rather than the target's.
    pub fn is_tor(&self) -> bool {
        matches!(
            self,
            DialError::ProxyUnreachable { .. }
                | DialError::Socks { .. }
                | DialError::SocksTimeout { .. }
        )
    }
}

/// Connect capability for one probe. Chosen per host; no global socket
/// state is ever touched.
#[derive(Clone, Debug)]
pub enum Dialer {
    /// System resolver plus direct connect.
    Clearnet,
    /// SOCKS5 CONNECT through the Tor proxy.
    Tor { proxy: String },
}

impl Dialer {
    pub fn for_host(host: &str, tor_proxy: &str) -> Self {
        if host.ends_with(ONION_SUFFIX) {
            Dialer::Tor {
                proxy: tor_proxy.to_string(),
            }
        } else {
            Dialer::Clearnet
        }
    }

    pub fn is_tor(&self) -> bool {
        matches!(self, Dialer::Tor { .. })
    }

    /// Opens a TCP stream to `host:port` within `deadline`.
    pub async fn connect(
        &self,
        host: &str,
        port: u16,
        deadline: Duration,
    ) -> Result<TcpStream, DialError> {
        match self {
            Dialer::Clearnet => match timeout(deadline, TcpStream::connect((host, port))).await {
                Ok(Ok(stream)) => Ok(stream),
                Ok(Err(source)) => Err(DialError::Connect {
                    host: host.to_string(),
                    port,
                    source,
                }),
                Err(_) => Err(DialError::ConnectTimeout {
                    host: host.to_string(),
                    port,
                }),
            },
            Dialer::Tor { proxy } => {
                let mut stream = match timeout(deadline, TcpStream::connect(proxy.as_str())).await {
                    Ok(Ok(stream)) => stream,
                    Ok(Err(source)) => {
                        return Err(DialError::ProxyUnreachable {
                            proxy: proxy.clone(),
                            detail: source.to_string(),
                        })
                    }
                    Err(_) => {
                        return Err(DialError::ProxyUnreachable {
                            proxy: proxy.clone(),
                            detail: "connect timed out".to_string(),
                        })
                    }
                };

                match timeout(deadline, socks5_connect(&mut stream, host, port)).await {
                    Ok(Ok(())) => {
                        trace!(%host, %port, %proxy, "tor circuit established");
                        Ok(stream)
                    }
                    Ok(Err(source)) => Err(DialError::Socks {
                        proxy: proxy.clone(),
                        source,
                    }),
                    Err(_) => Err(DialError::SocksTimeout {
                        proxy: proxy.clone(),
                    }),
                }
            }
        }
    }
}

/// Resolves every address of `host`, deduplicated, order unspecified.
/// `.onion` hosts resolve to nothing by design.
pub async fn resolve_host(host: &str) -> Result<Vec<IpAddr>, DialError> {
    if host.ends_with(ONION_SUFFIX) {
        return Ok(Vec::new());
    }

    let addrs = tokio::net::lookup_host((host, 0u16))
        .await
        .map_err(|source| DialError::Resolve {
            host: host.to_string(),
            source,
        })?;

    let mut ips = Vec::new();
    for addr in addrs {
        let ip = addr.ip();
        if !ips.contains(&ip) {
            ips.push(ip);
        }
    }
    Ok(ips)
}
