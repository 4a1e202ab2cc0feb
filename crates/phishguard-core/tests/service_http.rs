//! `AnalysisClient` against a canned HTTP responder on a loopback socket.

use std::time::Duration;

use phishguard_core::config::RelayConfig;
use phishguard_core::error::{RelayError, RelayErrorKind};
use phishguard_core::service::AnalysisClient;
use phishguard_core::verdict::Classification;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::oneshot;

/// Serve one connection with `status` and `body`; yields the raw request.
async fn respond_once(status: &'static str, body: &'static str) -> (String, oneshot::Receiver<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let endpoint = format!("http://{}", listener.local_addr().unwrap());
    let (tx, rx) = oneshot::channel();
    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let request = read_request(&mut socket).await;
        let response = format!(
            "HTTP/1.1 {status}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
            body.len()
        );
        socket.write_all(response.as_bytes()).await.unwrap();
        socket.shutdown().await.ok();
        let _ = tx.send(request);
    });
    (endpoint, rx)
}

async fn read_request(socket: &mut tokio::net::TcpStream) -> String {
    let mut buf = Vec::new();
    let mut chunk = [0_u8; 1024];
    loop {
        let n = socket.read(&mut chunk).await.unwrap();
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
        let text = String::from_utf8_lossy(&buf);
        if let Some(head_end) = text.find("\r\n\r\n") {
            let content_length = text[..head_end]
                .lines()
                .find_map(|line| {
                    let (name, value) = line.split_once(':')?;
                    name.eq_ignore_ascii_case("content-length")
                        .then(|| value.trim().parse::<usize>().ok())
                        .flatten()
                })
                .unwrap_or(0);
            if buf.len() >= head_end + 4 + content_length {
                break;
            }
        }
    }
    String::from_utf8_lossy(&buf).into_owned()
}

fn client(endpoint: &str) -> AnalysisClient {
    AnalysisClient::new(&RelayConfig {
        endpoint: endpoint.to_string(),
        timeout_ms: 2_000,
        ..RelayConfig::default()
    })
    .unwrap()
}

#[tokio::test]
async fn analyze_posts_url_and_reads_record() {
    let (endpoint, request) = respond_once(
        "200 OK",
        r#"{"timestamp":"2026-02-01T08:00:00","url":"https://bank.test/login","used_ai":true,"model":"models/gemini-2.5-flash","result":{"verdict":"Phishing","risk_score":88,"reasons":["Brand impersonation"],"domain":"bank.test"}}"#,
    )
    .await;

    let entry = client(&endpoint).analyze("https://bank.test/login").await.unwrap();
    let verdict = entry.verdict().unwrap();
    assert_eq!(verdict.classification, Classification::Phishing);
    assert_eq!(verdict.risk_score, 88);
    assert!(entry.used_ai);

    let request = request.await.unwrap();
    assert!(request.starts_with("POST /analyze HTTP/1.1"));
    assert!(request.contains(r#"{"url":"https://bank.test/login"}"#));
}

#[tokio::test]
async fn non_success_status_is_transport_failure() {
    let (endpoint, _) = respond_once("500 Internal Server Error", r#"{"detail":"boom"}"#).await;
    let err = client(&endpoint).analyze("https://a.test/").await.unwrap_err();
    assert_eq!(err, RelayError::Status { status: 500 });
    assert_eq!(err.kind(), RelayErrorKind::Transport);
}

#[tokio::test]
async fn malformed_body_is_protocol_failure() {
    let (endpoint, _) = respond_once("200 OK", "not json").await;
    let err = client(&endpoint).analyze("https://a.test/").await.unwrap_err();
    assert!(matches!(err, RelayError::Malformed(_)), "{err:?}");
    assert_eq!(err.kind(), RelayErrorKind::Protocol);
}

#[tokio::test]
async fn history_lists_most_recent_first() {
    let (endpoint, request) = respond_once(
        "200 OK",
        r#"[{"url":"https://b.test/","used_ai":false,"result":{"verdict":"Safe"}},{"url":"https://a.test/","used_ai":true,"result":{"verdict":"Suspicious"}}]"#,
    )
    .await;
    let entries = client(&endpoint).history().await.unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].url.as_deref(), Some("https://b.test/"));
    assert_eq!(entries[1].classification(), Classification::Suspicious);
    assert!(request.await.unwrap().starts_with("GET /history HTTP/1.1"));
}

#[tokio::test]
async fn clear_history_sends_delete() {
    let (endpoint, request) = respond_once("200 OK", r#"{"status":"cleared"}"#).await;
    client(&endpoint).clear_history().await.unwrap();
    assert!(request.await.unwrap().starts_with("DELETE /history HTTP/1.1"));
}

#[tokio::test]
async fn unreachable_service_is_transport_failure() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let endpoint = format!("http://{}", listener.local_addr().unwrap());
    drop(listener);

    let err = client(&endpoint).analyze("https://a.test/").await.unwrap_err();
    assert_eq!(err.kind(), RelayErrorKind::Transport);
}

#[tokio::test]
async fn silent_service_hits_timeout_ceiling() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let endpoint = format!("http://{}", listener.local_addr().unwrap());
    tokio::spawn(async move {
        let (_socket, _) = listener.accept().await.unwrap();
        tokio::time::sleep(Duration::from_secs(30)).await;
    });

    let client = AnalysisClient::new(&RelayConfig {
        endpoint,
        timeout_ms: 200,
        ..RelayConfig::default()
    })
    .unwrap();
    let err = client.analyze("https://a.test/").await.unwrap_err();
    assert_eq!(err, RelayError::Timeout(Duration::from_millis(200)));
}
