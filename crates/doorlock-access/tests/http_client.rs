//! Integration tests for the HTTP admission client and settings store.
//!
//! A mock HTTP server on a local TcpListener answers each connection with a
//! canned response and hands the received request back to the test.

use doorlock_access::{
    AdmissionBundle, AdmissionClient, AdmissionError, DecisionSubmitter, FixedSettings,
    HttpAdmissionClient, HttpSettingsStore, SessionAggregator, SettingsStore, SubmitOutcome,
    SubmitterConfig, http_client,
};
use doorlock_core::{CredentialInput, FingerprintId, FingerprintResult, Pin};
use serde_json::{Value, json};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;

/// A request as seen by the mock server.
#[derive(Debug)]
struct Captured {
    request_line: String,
    body: String,
}

/// Read one HTTP/1.1 request: headers, then `Content-Length` bytes of body.
async fn read_request(stream: &mut TcpStream) -> Captured {
    let mut buffer = Vec::new();
    let mut chunk = [0u8; 1024];

    let header_end = loop {
        let n = stream.read(&mut chunk).await.unwrap();
        assert!(n > 0, "client closed before sending headers");
        buffer.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buffer.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let head = String::from_utf8_lossy(&buffer[..header_end]).to_string();
    let content_length = head
        .lines()
        .filter_map(|line| line.split_once(':'))
        .find(|(name, _)| name.eq_ignore_ascii_case("content-length"))
        .map(|(_, value)| value.trim().parse::<usize>().unwrap())
        .unwrap_or(0);

    while buffer.len() < header_end + content_length {
        let n = stream.read(&mut chunk).await.unwrap();
        assert!(n > 0, "client closed before sending body");
        buffer.extend_from_slice(&chunk[..n]);
    }

    Captured {
        request_line: head.lines().next().unwrap_or_default().to_string(),
        body: String::from_utf8_lossy(&buffer[header_end..header_end + content_length]).to_string(),
    }
}

/// Serve one canned response per entry, in order, then stop.
async fn spawn_server(responses: Vec<(u16, &'static str)>) -> (String, mpsc::UnboundedReceiver<Captured>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        for (status, body) in responses {
            let (mut stream, _) = listener.accept().await.unwrap();
            let captured = read_request(&mut stream).await;
            let _ = tx.send(captured);

            let response = format!(
                "HTTP/1.1 {status} X\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            stream.write_all(response.as_bytes()).await.unwrap();
            stream.shutdown().await.unwrap();
        }
    });

    (format!("http://{addr}"), rx)
}

fn client() -> reqwest::Client {
    http_client(Duration::from_secs(2)).unwrap()
}

fn bundle() -> AdmissionBundle {
    AdmissionBundle {
        mode: "user".to_string(),
        pin: "1234".to_string(),
        admin_pass: String::new(),
        face_result: None,
        fingerprint_result: None,
    }
}

#[tokio::test]
async fn test_verdict_round_trip() {
    // Start mock admission service
    let (base, mut requests) = spawn_server(vec![(
        200,
        r#"{"access_granted": true, "matched_user": "alice", "score": 2}"#,
    )])
    .await;

    let admission = HttpAdmissionClient::new(client(), format!("{base}/access/"));
    let verdict = admission.evaluate(&bundle()).await.unwrap();

    assert!(verdict.access_granted);
    assert_eq!(verdict.matched_user.as_deref(), Some("alice"));

    let request = requests.recv().await.unwrap();
    assert_eq!(request.request_line, "POST /access/ HTTP/1.1");
    let body: Value = serde_json::from_str(&request.body).unwrap();
    assert_eq!(
        body,
        json!({"mode": "user", "pin": "1234", "admin_pass": ""})
    );
}

#[tokio::test]
async fn test_error_status_is_reported() {
    let (base, _requests) = spawn_server(vec![(500, r#"{"detail": "boom"}"#)]).await;

    let admission = HttpAdmissionClient::new(client(), format!("{base}/access/"));
    assert_eq!(
        admission.evaluate(&bundle()).await.unwrap_err(),
        AdmissionError::Status(500)
    );
}

#[tokio::test]
async fn test_malformed_body_is_invalid_response() {
    let (base, _requests) = spawn_server(vec![(200, r#"{"granted": "maybe"}"#)]).await;

    let admission = HttpAdmissionClient::new(client(), format!("{base}/access/"));
    assert!(matches!(
        admission.evaluate(&bundle()).await,
        Err(AdmissionError::InvalidResponse(_))
    ));
}

#[tokio::test]
async fn test_refused_connection_is_transport_error() {
    // Bind then drop to get a port nobody listens on
    let addr = TcpListener::bind("127.0.0.1:0")
        .await
        .unwrap()
        .local_addr()
        .unwrap();

    let admission = HttpAdmissionClient::new(client(), format!("http://{addr}/access/"));
    let error = admission.evaluate(&bundle()).await.unwrap_err();

    assert!(matches!(error, AdmissionError::Transport(_)));
    assert!(error.is_retryable());
}

#[tokio::test]
async fn test_settings_store_reads_min_required() {
    let (base, mut requests) = spawn_server(vec![
        (200, r#"{"min_required": 3, "device_pin": "1234"}"#),
        (200, r#"{"device_pin": "1234"}"#),
        (503, "{}"),
    ])
    .await;

    let store = HttpSettingsStore::new(client(), format!("{base}/admin/settings"));

    assert_eq!(store.required_factor_count().await, 3);
    assert_eq!(
        requests.recv().await.unwrap().request_line,
        "GET /admin/settings HTTP/1.1"
    );
    assert_eq!(store.required_factor_count().await, 2);
    assert_eq!(store.required_factor_count().await, 2);
}

#[tokio::test]
async fn test_submit_retries_over_http() {
    let (base, mut requests) = spawn_server(vec![
        (502, "{}"),
        (500, "{}"),
        (200, r#"{"access_granted": true, "matched_user": null, "score": 2}"#),
    ])
    .await;

    let aggregator = SessionAggregator::new(FixedSettings::new(2));
    let config = SubmitterConfig {
        retry_delay: Duration::from_millis(10),
        ..SubmitterConfig::default()
    };
    let submitter = DecisionSubmitter::new(
        HttpAdmissionClient::new(client(), format!("{base}/access/")),
        aggregator.clone(),
        config,
    );

    aggregator
        .update(CredentialInput::Pin(Pin::new("4321").unwrap()))
        .await;
    let snapshot = aggregator
        .update(CredentialInput::Fingerprint(FingerprintResult::matched(
            FingerprintId::new(7),
        )))
        .await
        .unwrap();

    let outcome = submitter.submit(&snapshot).await;
    assert!(matches!(outcome, SubmitOutcome::Granted(_)));
    assert_eq!(aggregator.stats().await.resets, 1);

    for _ in 0..3 {
        let body: Value = serde_json::from_str(&requests.recv().await.unwrap().body).unwrap();
        assert_eq!(body["fingerprint_result"], json!({"match": true, "fp_id": 7}));
        assert_eq!(body["pin"], "4321");
    }
}
