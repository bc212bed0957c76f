//! Minimal SOCKS5 CONNECT client (RFC 1928), no authentication, hostname
//! address type only. The hostname is passed through so resolution happens
//! at the Tor exit, never locally.

use std::io;

use thiserror::Error;
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::TcpStream,
};

#[derive(Debug, Error)]
pub enum SocksError {
    #[error("proxy io error: {0}")]
    Io(#[from] io::Error),
    #[error("proxy offered no acceptable auth method")]
    NoAcceptableAuth,
    #[error("proxy protocol violation: {0}")]
    Protocol(&'static str),
    #[error("proxy refused connect: {0}")]
    Refused(&'static str),
}

/// Performs the SOCKS5 handshake and CONNECT on an open proxy stream. On
/// success the stream is tunneled to `host:port`.
pub async fn socks5_connect(
    stream: &mut TcpStream,
    host: &str,
    port: u16,
) -> Result<(), SocksError> {
    if host.len() > 255 {
        return Err(SocksError::Protocol("hostname longer than 255 bytes"));
    }

    // Greeting: version 5, one method, no-auth.
    stream.write_all(&[0x05, 0x01, 0x00]).await?;
    let mut choice = [0u8; 2];
    stream.read_exact(&mut choice).await?;
    if choice[0] != 0x05 {
        return Err(SocksError::Protocol("unexpected version in method choice"));
    }
    if choice[1] != 0x00 {
        return Err(SocksError::NoAcceptableAuth);
    }

    // CONNECT with a domain-typed address.
    let mut request = Vec::with_capacity(7 + host.len());
    request.extend_from_slice(&[0x05, 0x01, 0x00, 0x03, host.len() as u8]);
    request.extend_from_slice(host.as_bytes());
    request.extend_from_slice(&port.to_be_bytes());
    stream.write_all(&request).await?;

    let mut head = [0u8; 4];
    stream.read_exact(&mut head).await?;
    if head[0] != 0x05 {
        return Err(SocksError::Protocol("unexpected version in reply"));
    }
    if head[1] != 0x00 {
        return Err(SocksError::Refused(reply_name(head[1])));
    }

    // Drain the bound address trailing the reply.
    let addr_len = match head[3] {
        0x01 => 4,
        0x04 => 16,
        0x03 => {
            let mut len = [0u8; 1];
            stream.read_exact(&mut len).await?;
            len[0] as usize
        }
        _ => return Err(SocksError::Protocol("unexpected address type in reply")),
    };
    let mut bound = vec![0u8; addr_len + 2];
    stream.read_exact(&mut bound).await?;

    Ok(())
}

fn reply_name(code: u8) -> &'static str {
    match code {
        0x01 => "general failure",
        0x02 => "connection not allowed",
        0x03 => "network unreachable",
        0x04 => "host unreachable",
        0x05 => "connection refused",
        0x06 => "ttl expired",
        0x07 => "command not supported",
        0x08 => "address type not supported",
        _ => "unknown failure",
    }
}
