//! Wire-level probe tests against local fixture servers.

use hosh_electrum::{probe::PortSpec, ElectrumProbe, DEFAULT_METHOD};
use hosh_primitives::{ErrorKind, Status};
use serde_json::json;
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::{TcpListener, TcpStream},
};

const GENESIS_HEADER_HEX: &str = "0100000000000000000000000000000000000000000000000000000000000000000000003ba3edfd7a7b12b27ac72c3e67768f617fc81bc3888a51323a9fb8aa4b1e5e4a29ab5f49ffff001d1dac2b7c";

const NO_TOR: &str = "127.0.0.1:1";

fn header_response() -> String {
    format!(
        "{}\n",
        json!({"id": 1, "result": {"hex": GENESIS_HEADER_HEX, "height": 840123}})
    )
}

/// Reads one request line off a fixture connection. Returns `None` when the
/// peer closed without sending anything (the reachability pre-check does
/// exactly that).
async fn read_request(stream: &mut TcpStream) -> Option<String> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    loop {
        let n = stream.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
        if buf.contains(&b'\n') {
            return Some(String::from_utf8_lossy(&buf).into_owned());
        }
    }
}

/// Spawns a plaintext Electrum fixture that answers the scripted responses
/// in order, one RPC connection each. Connections that close without a
/// request (reachability probes) do not consume a script entry.
async fn spawn_fixture(responses: Vec<String>) -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        let mut pending = responses.into_iter();
        let mut next = pending.next();
        while next.is_some() {
            let Ok((mut stream, _)) = listener.accept().await else {
                break;
            };
            if read_request(&mut stream).await.is_some() {
                let response = next.take().unwrap();
                let _ = stream.write_all(response.as_bytes()).await;
                next = pending.next();
            }
        }
    });

    port
}

/// A dead port: bound once, then released.
async fn refused_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    port
}

#[tokio::test]
async fn test_plaintext_happy_path() {
    let port = spawn_fixture(vec![header_response()]).await;
    let probe = ElectrumProbe::new(NO_TOR);

    let report = probe
        .probe_server("127.0.0.1", PortSpec::tcp(port), None, &json!([]))
        .await;

    assert_eq!(report.status, Status::Online);
    assert!(report.ping_ms.is_some(), "online implies measured ping");
    assert!(report.error_kind.is_none());

    let data = &report.response_data;
    assert_eq!(data["height"], 840123);
    assert_eq!(data["method_used"], DEFAULT_METHOD);
    assert_eq!(data["connection_type"], "Plaintext");
    assert_eq!(data["self_signed"], false);
    assert_eq!(data["version"], 1);
    assert_eq!(
        data["merkle_root"],
        "4a5e1e4baab89f3a32518a88c31bc87f618f76673e2cc77ab2127b7afdeda33b"
    );
    assert_eq!(data["timestamp"], 1231006505);
    assert_eq!(data["timestamp_human"], "2009-01-03T18:15:05");
    assert_eq!(data["bits"], 486604799_u32);
    assert_eq!(data["nonce"], 2083236893_u32);
    assert_eq!(report.resolved_ips, vec!["127.0.0.1".to_string()]);
}

#[tokio::test]
async fn test_ssl_refused_falls_back_to_plaintext() {
    let dead = refused_port().await;
    let live = spawn_fixture(vec![header_response()]).await;
    let probe = ElectrumProbe::new(NO_TOR);

    let spec = PortSpec {
        ssl: Some(dead),
        tcp: Some(live),
    };
    let report = probe
        .probe_server("127.0.0.1", spec, None, &json!([]))
        .await;

    assert_eq!(report.status, Status::Online);
    assert_eq!(report.response_data["connection_type"], "Plaintext");
    assert_eq!(report.response_data["self_signed"], false);
}

#[tokio::test]
async fn test_method_fallback_to_server_features() {
    let responses = vec![
        format!("{}\n", json!({"id": 1, "error": {"code": -32601}})),
        format!(
            "{}\n",
            json!({"id": 1, "result": {"server_version": "ElectrumX 1.16.0"}})
        ),
    ];
    let port = spawn_fixture(responses).await;
    let probe = ElectrumProbe::new(NO_TOR);

    let report = probe
        .probe_server("127.0.0.1", PortSpec::tcp(port), None, &json!([]))
        .await;

    assert_eq!(report.status, Status::Online);
    let data = &report.response_data;
    assert_eq!(data["method_used"], "server.features");
    assert_eq!(data["server_version"], "ElectrumX 1.16.0");
    assert!(
        data.get("height").is_none(),
        "features response carries no height"
    );
}

#[tokio::test]
async fn test_unreachable_host() {
    let dead_a = refused_port().await;
    let dead_b = refused_port().await;
    let probe = ElectrumProbe::new(NO_TOR);

    let spec = PortSpec {
        ssl: Some(dead_a),
        tcp: Some(dead_b),
    };
    let report = probe
        .probe_server("127.0.0.1", spec, None, &json!([]))
        .await;

    assert_eq!(report.status, Status::Offline);
    assert_eq!(report.error_kind, Some(ErrorKind::HostUnreachable));
    assert!(report.ping_ms.is_none());
}

#[tokio::test]
async fn test_null_result_is_protocol_error() {
    // One null-result answer per fallback method.
    let null_resp = format!("{}\n", json!({"id": 1, "result": null}));
    let port = spawn_fixture(vec![null_resp.clone(), null_resp.clone(), null_resp]).await;
    let probe = ElectrumProbe::new(NO_TOR);

    let report = probe
        .probe_server("127.0.0.1", PortSpec::tcp(port), None, &json!([]))
        .await;

    assert_eq!(report.status, Status::Offline);
    assert_eq!(report.error_kind, Some(ErrorKind::ProtocolError));
}

#[tokio::test]
async fn test_malformed_header_is_protocol_error() {
    let bad = format!(
        "{}\n",
        json!({"id": 1, "result": {"hex": "deadbeef", "height": 1}})
    );
    let port = spawn_fixture(vec![bad.clone(), bad.clone(), bad]).await;
    let probe = ElectrumProbe::new(NO_TOR);

    let report = probe
        .probe_server("127.0.0.1", PortSpec::tcp(port), None, &json!([]))
        .await;

    assert_eq!(report.status, Status::Offline);
    assert_eq!(report.error_kind, Some(ErrorKind::ProtocolError));
}

#[tokio::test]
async fn test_response_spanning_reads_without_newline() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        loop {
            let Ok((mut stream, _)) = listener.accept().await else {
                break;
            };
            if read_request(&mut stream).await.is_none() {
                continue;
            }
            // Unframed response split mid-value; the reader must stop once
            // the JSON completes.
            let body = json!({"id": 1, "result": {"hex": GENESIS_HEADER_HEX, "height": 840123}})
                .to_string();
            let (a, b) = body.split_at(body.len() / 2);
            stream.write_all(a.as_bytes()).await.unwrap();
            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
            stream.write_all(b.as_bytes()).await.unwrap();
            // Keep the connection open; no newline will ever come.
            tokio::time::sleep(std::time::Duration::from_secs(30)).await;
        }
    });

    let probe = ElectrumProbe::new(NO_TOR);
    let report = probe
        .probe_server("127.0.0.1", PortSpec::tcp(port), None, &json!([]))
        .await;

    assert_eq!(report.status, Status::Online);
    assert_eq!(report.response_data["height"], 840123);
}

/// Minimal SOCKS5 server fixture: accepts the no-auth handshake and a
/// domain CONNECT, then speaks the Electrum fixture protocol in-tunnel.
async fn spawn_socks_fixture(responses: Vec<String>) -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        let mut pending = responses.into_iter();
        let mut next = pending.next();
        while next.is_some() {
            let Ok((mut stream, _)) = listener.accept().await else {
                break;
            };

            // Method negotiation.
            let mut greeting = [0u8; 2];
            if stream.read_exact(&mut greeting).await.is_err() {
                continue;
            }
            let mut methods = vec![0u8; greeting[1] as usize];
            if stream.read_exact(&mut methods).await.is_err() {
                continue;
            }
            stream.write_all(&[0x05, 0x00]).await.unwrap();

            // CONNECT request: header, domain length, domain, port.
            let mut head = [0u8; 4];
            stream.read_exact(&mut head).await.unwrap();
            assert_eq!(head[3], 0x03, "client must send a domain address");
            let mut len = [0u8; 1];
            stream.read_exact(&mut len).await.unwrap();
            let mut rest = vec![0u8; len[0] as usize + 2];
            stream.read_exact(&mut rest).await.unwrap();
            stream
                .write_all(&[0x05, 0x00, 0x00, 0x01, 0, 0, 0, 0, 0, 0])
                .await
                .unwrap();

            // In-tunnel Electrum exchange.
            if read_request(&mut stream).await.is_some() {
                let response = next.take().unwrap();
                let _ = stream.write_all(response.as_bytes()).await;
                next = pending.next();
            }
        }
    });

    port
}

#[tokio::test]
async fn test_onion_host_via_socks_proxy() {
    let proxy_port = spawn_socks_fixture(vec![header_response()]).await;
    let probe = ElectrumProbe::new(format!("127.0.0.1:{proxy_port}"));

    let report = probe
        .probe_server(
            "hoshfixture.onion",
            PortSpec::tcp(50001),
            None,
            &json!([]),
        )
        .await;

    assert_eq!(report.status, Status::Online);
    assert!(
        report.resolved_ips.is_empty(),
        "onion hosts are never resolved locally"
    );
    assert_eq!(report.response_data["height"], 840123);
    assert_eq!(report.response_data["resolved_ips"], json!([]));
}

#[tokio::test]
async fn test_onion_with_dead_proxy_is_tor_error() {
    let dead = refused_port().await;
    let probe = ElectrumProbe::new(format!("127.0.0.1:{dead}"));

    let report = probe
        .probe_server("hoshfixture.onion", PortSpec::tcp(50001), None, &json!([]))
        .await;

    assert_eq!(report.status, Status::Offline);
    assert_eq!(
        report.error_kind,
        Some(ErrorKind::TorError),
        "socks failures must not masquerade as host_unreachable"
    );
}

#[tokio::test]
async fn test_caller_method_and_params_sent_first() {
    // The fixture asserts on the request line it received.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        loop {
            let Ok((mut stream, _)) = listener.accept().await else {
                break;
            };
            let Some(request) = read_request(&mut stream).await else {
                continue;
            };
            let parsed: serde_json::Value = serde_json::from_str(request.trim()).unwrap();
            assert_eq!(parsed["method"], "blockchain.block.header");
            assert_eq!(parsed["params"], json!([840000]));
            let _ = stream
                .write_all(format!("{}\n", json!({"id": 1, "result": 840123})).as_bytes())
                .await;
        }
    });

    let probe = ElectrumProbe::new(NO_TOR);
    let report = probe
        .probe_server(
            "127.0.0.1",
            PortSpec::tcp(port),
            Some("blockchain.block.header"),
            &json!([840000]),
        )
        .await;

    assert_eq!(report.status, Status::Online);
    assert_eq!(report.response_data["height"], 840123);
    assert_eq!(report.response_data["method_used"], "blockchain.block.header");
}
