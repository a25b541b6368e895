//! Integration tests for the HTTP clients against a scripted local server.
//!
//! The stub accepts one connection per scripted exchange, records the
//! request it saw, and answers with the scripted status and body. That is
//! enough to pin down the retry schedule, the auth header, and the wire
//! payload without a real data plane.

use std::io::{Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use pipecheck_api::{IngestClient, WebhookProbe};
use pipecheck_common::config::ApiSettings;
use pipecheck_common::{EventCounts, PollOutcome, Poller, TrackEvent};

struct Scripted {
    status: u16,
    body: String,
}

impl Scripted {
    fn status(status: u16) -> Self {
        Self {
            status,
            body: "{}".to_string(),
        }
    }

    fn json(body: serde_json::Value) -> Self {
        Self {
            status: 200,
            body: body.to_string(),
        }
    }
}

#[derive(Debug)]
struct RecordedRequest {
    request_line: String,
    authorization: Option<String>,
    body: String,
}

struct StubServer {
    addr: SocketAddr,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl StubServer {
    fn start(script: Vec<Scripted>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let requests = Arc::new(Mutex::new(Vec::new()));
        let log = Arc::clone(&requests);

        thread::spawn(move || {
            for exchange in script {
                let (mut stream, _) = match listener.accept() {
                    Ok(conn) => conn,
                    Err(_) => return,
                };
                log.lock().unwrap().push(read_request(&mut stream));
                let response = format!(
                    "HTTP/1.1 {} {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    exchange.status,
                    reason(exchange.status),
                    exchange.body.len(),
                    exchange.body
                );
                let _ = stream.write_all(response.as_bytes());
            }
        });

        Self { addr, requests }
    }

    fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    fn request(&self, index: usize) -> RecordedRequest {
        let requests = self.requests.lock().unwrap();
        RecordedRequest {
            request_line: requests[index].request_line.clone(),
            authorization: requests[index].authorization.clone(),
            body: requests[index].body.clone(),
        }
    }
}

fn read_request(stream: &mut TcpStream) -> RecordedRequest {
    stream
        .set_read_timeout(Some(Duration::from_secs(5)))
        .unwrap();

    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    while header_end(&buf).is_none() {
        let n = stream.read(&mut chunk).unwrap();
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
    }

    let body_start = header_end(&buf).unwrap_or(buf.len());
    let head = String::from_utf8_lossy(&buf[..body_start]).to_string();
    let expected = content_length(&head);

    let mut body = buf[body_start..].to_vec();
    while body.len() < expected {
        let n = stream.read(&mut chunk).unwrap();
        if n == 0 {
            break;
        }
        body.extend_from_slice(&chunk[..n]);
    }

    RecordedRequest {
        request_line: head.lines().next().unwrap_or_default().to_string(),
        authorization: header_value(&head, "authorization"),
        body: String::from_utf8_lossy(&body).to_string(),
    }
}

fn header_end(buf: &[u8]) -> Option<usize> {
    buf.windows(4).position(|w| w == b"\r\n\r\n").map(|i| i + 4)
}

fn header_value(head: &str, name: &str) -> Option<String> {
    head.lines().find_map(|line| {
        let (key, value) = line.split_once(':')?;
        key.eq_ignore_ascii_case(name)
            .then(|| value.trim().to_string())
    })
}

fn content_length(head: &str) -> usize {
    header_value(head, "content-length")
        .and_then(|v| v.parse().ok())
        .unwrap_or(0)
}

fn reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        400 => "Bad Request",
        429 => "Too Many Requests",
        500 => "Internal Server Error",
        502 => "Bad Gateway",
        503 => "Service Unavailable",
        _ => "Unknown",
    }
}

fn fast_settings() -> ApiSettings {
    ApiSettings {
        timeout_secs: 5,
        retry_attempts: 3,
        retry_backoff_secs: 0,
    }
}

fn sample_event() -> TrackEvent {
    TrackEvent::builder("purchase")
        .user_id("user_1")
        .property("price", 10.0)
        .build()
}

#[tokio::test]
async fn test_retries_transient_statuses_until_accepted() {
    let server = StubServer::start(vec![
        Scripted::status(429),
        Scripted::status(503),
        Scripted::status(200),
    ]);
    let client = IngestClient::new(server.url(), "wk_test", &fast_settings()).unwrap();

    let outcome = client.send_event(&sample_event()).await;

    assert!(outcome.success, "send should recover, got {:?}", outcome.error);
    assert_eq!(outcome.status_code, Some(200));
    assert_eq!(outcome.attempts, 3);
    assert_eq!(server.request_count(), 3);
}

#[tokio::test]
async fn test_gives_up_after_exhausting_attempts() {
    let server = StubServer::start(vec![
        Scripted::status(500),
        Scripted::status(500),
        Scripted::status(500),
    ]);
    let client = IngestClient::new(server.url(), "wk_test", &fast_settings()).unwrap();

    let outcome = client.send_event(&sample_event()).await;

    assert!(!outcome.success);
    assert_eq!(outcome.status_code, Some(500));
    assert_eq!(outcome.attempts, 3);
    assert_eq!(server.request_count(), 3);
}

#[tokio::test]
async fn test_client_error_is_not_retried() {
    let server = StubServer::start(vec![Scripted::status(400)]);
    let client = IngestClient::new(server.url(), "wk_bad", &fast_settings()).unwrap();

    let outcome = client.send_event(&sample_event()).await;

    assert!(!outcome.success);
    assert_eq!(outcome.status_code, Some(400));
    assert_eq!(outcome.attempts, 1);
    assert_eq!(server.request_count(), 1);
}

#[tokio::test]
async fn test_sends_basic_auth_and_wire_payload() {
    let server = StubServer::start(vec![Scripted::status(200)]);
    let client = IngestClient::new(server.url(), "wk_123", &fast_settings()).unwrap();

    let outcome = client.send_event(&sample_event()).await;
    assert!(outcome.success);

    let request = server.request(0);
    assert!(
        request.request_line.starts_with("POST /v1/track"),
        "got: {}",
        request.request_line
    );
    assert_eq!(request.authorization.as_deref(), Some("Basic d2tfMTIzOg=="));

    let payload: serde_json::Value = serde_json::from_str(&request.body).unwrap();
    assert_eq!(payload["event"], "purchase");
    assert_eq!(payload["userId"], "user_1");
    assert_eq!(payload["messageId"].as_str(), outcome.event_id.as_deref());
}

#[tokio::test]
async fn test_webhook_probe_classifies_request_log() {
    let server = StubServer::start(vec![Scripted::json(serde_json::json!({
        "data": [
            { "status_code": 200, "method": "POST" },
            { "status_code": 500, "method": "POST" },
            { "status_code": 200, "method": "POST" },
        ]
    }))]);
    let probe = WebhookProbe::new(server.url(), Duration::from_secs(5)).unwrap();

    let stats = probe.stats().await.unwrap();
    assert_eq!(stats, EventCounts::new(2, 1));
}

#[tokio::test]
async fn test_await_events_polls_until_minimum() {
    let server = StubServer::start(vec![
        Scripted::json(serde_json::json!({ "data": [ { "status_code": 200 } ] })),
        Scripted::json(serde_json::json!({
            "data": [ { "status_code": 200 }, { "status_code": 200 } ]
        })),
    ]);
    let probe = WebhookProbe::new(server.url(), Duration::from_secs(5)).unwrap();
    let poller = Poller::new(Duration::from_secs(5)).with_interval(Duration::from_millis(10));

    match probe.await_events(2, &poller).await {
        PollOutcome::Satisfied { state, ticks, .. } => {
            assert_eq!(state.total, 2);
            assert_eq!(ticks, 2);
        }
        other => panic!("expected satisfaction on the second tick, got {}", other.label()),
    }
}
