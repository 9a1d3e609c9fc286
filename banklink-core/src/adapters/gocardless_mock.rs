//! Mock GoCardless API server for testing
//!
//! A small blocking HTTP server that simulates the GoCardless endpoints the
//! client uses, so the reqwest client can be exercised end to end:
//! - POST /token/new/ returns { access, access_expires, refresh, refresh_expires }
//! - POST /token/refresh/ returns { access, access_expires }
//! - GET /institutions/?country=XX returns [ { id, name, ... } ]
//! - POST /requisitions/ returns { id, status, link, reference, institution_id }

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

use serde_json::{json, Value as JsonValue};

/// Mock GoCardless server for testing
pub struct MockGoCardlessServer {
    port: u16,
    running: Arc<AtomicBool>,
    counters: Arc<MockCounters>,
    thread_handle: Option<thread::JoinHandle<()>>,
}

/// Behaviour of the mock server
#[derive(Debug, Clone)]
pub struct MockConfig {
    /// Secret pair accepted by /token/new/
    pub secret_id: String,
    pub secret_key: String,
    /// access_expires returned for new and refreshed tokens
    pub access_expires: i64,
    /// Reject every refresh token with 401
    pub fail_refresh: bool,
    /// Return a new refresh token from /token/refresh/
    pub rotate_refresh: bool,
    /// (id, name) pairs returned by /institutions/, in this order
    pub institutions: Vec<(String, String)>,
    /// Force /institutions/ to answer with this status
    pub institutions_status: Option<u16>,
    /// Delay in milliseconds before responding
    pub delay_ms: u64,
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            secret_id: "valid_id".to_string(),
            secret_key: "valid_key".to_string(),
            access_expires: 86_400,
            fail_refresh: false,
            rotate_refresh: false,
            institutions: vec![
                ("REVOLUT_REVOGB21".to_string(), "Revolut".to_string()),
                ("BARCLAYS_BUKBGB22".to_string(), "Barclays".to_string()),
                ("MONZO_MONZGB2L".to_string(), "Monzo".to_string()),
            ],
            institutions_status: None,
            delay_ms: 0,
        }
    }
}

/// Number of requests seen per endpoint
#[derive(Debug, Default)]
pub struct MockCounters {
    pub new_token: AtomicUsize,
    pub refresh: AtomicUsize,
    pub institutions: AtomicUsize,
    pub requisitions: AtomicUsize,
    issued: AtomicUsize,
}

impl MockGoCardlessServer {
    /// Start a new mock server on a random available port
    pub fn start(config: MockConfig) -> std::io::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0")?;
        let port = listener.local_addr()?.port();
        let running = Arc::new(AtomicBool::new(true));
        let counters = Arc::new(MockCounters::default());

        // Non-blocking so the accept loop can notice shutdown
        listener.set_nonblocking(true)?;

        let running_clone = running.clone();
        let counters_clone = counters.clone();
        let thread_handle = thread::spawn(move || {
            while running_clone.load(Ordering::SeqCst) {
                match listener.accept() {
                    Ok((stream, _)) => {
                        let cfg = config.clone();
                        let counters = counters_clone.clone();
                        thread::spawn(move || {
                            handle_connection(stream, &cfg, &counters);
                        });
                    }
                    Err(ref e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                        thread::sleep(std::time::Duration::from_millis(10));
                    }
                    Err(_) => break,
                }
            }
        });

        Ok(Self {
            port,
            running,
            counters,
            thread_handle: Some(thread_handle),
        })
    }

    /// Get the base URL for this mock server
    pub fn base_url(&self) -> String {
        format!("http://127.0.0.1:{}", self.port)
    }

    pub fn counters(&self) -> &MockCounters {
        &self.counters
    }

    /// Total requests of any kind
    pub fn total_requests(&self) -> usize {
        self.counters.new_token.load(Ordering::SeqCst)
            + self.counters.refresh.load(Ordering::SeqCst)
            + self.counters.institutions.load(Ordering::SeqCst)
            + self.counters.requisitions.load(Ordering::SeqCst)
    }

    /// Stop the mock server
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.thread_handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for MockGoCardlessServer {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Read the request head and a Content-Length body
fn read_request(stream: &mut TcpStream) -> Option<(String, String)> {
    // Accepted sockets may inherit non-blocking mode on some platforms
    stream.set_nonblocking(false).ok()?;

    let mut data = Vec::new();
    let mut buffer = [0u8; 4096];
    let header_end = loop {
        let n = stream.read(&mut buffer).ok()?;
        if n == 0 {
            return None;
        }
        data.extend_from_slice(&buffer[..n]);
        if let Some(pos) = data.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let head = String::from_utf8_lossy(&data[..header_end]).to_string();
    let content_length = head
        .lines()
        .find_map(|line| {
            let (name, value) = line.split_once(':')?;
            if name.trim().eq_ignore_ascii_case("content-length") {
                value.trim().parse::<usize>().ok()
            } else {
                None
            }
        })
        .unwrap_or(0);

    while data.len() < header_end + content_length {
        let n = stream.read(&mut buffer).ok()?;
        if n == 0 {
            break;
        }
        data.extend_from_slice(&buffer[..n]);
    }

    let body = String::from_utf8_lossy(&data[header_end..]).to_string();
    Some((head, body))
}

fn handle_connection(mut stream: TcpStream, config: &MockConfig, counters: &MockCounters) {
    let Some((head, body)) = read_request(&mut stream) else {
        return;
    };

    if config.delay_ms > 0 {
        thread::sleep(std::time::Duration::from_millis(config.delay_ms));
    }

    let first_line = head.lines().next().unwrap_or("");
    let parts: Vec<&str> = first_line.split_whitespace().collect();
    if parts.len() < 2 {
        send_response(&mut stream, 400, "Bad Request", r#"{"detail": "Invalid request"}"#);
        return;
    }

    let method = parts[0];
    let path = parts[1];
    let path_without_query = path.split('?').next().unwrap_or(path);
    let has_bearer = head
        .to_lowercase()
        .contains("authorization: bearer access-");
    let payload: JsonValue = serde_json::from_str(&body).unwrap_or(JsonValue::Null);

    match (method, path_without_query) {
        ("POST", "/token/new/") => {
            counters.new_token.fetch_add(1, Ordering::SeqCst);
            let valid = payload["secret_id"] == config.secret_id.as_str()
                && payload["secret_key"] == config.secret_key.as_str();
            if !valid {
                send_response(
                    &mut stream,
                    401,
                    "Unauthorized",
                    r#"{"summary": "Authentication failed", "detail": "No active account found with the given credentials", "status_code": 401}"#,
                );
                return;
            }
            let n = counters.issued.fetch_add(1, Ordering::SeqCst) + 1;
            let response = json!({
                "access": format!("access-{}", n),
                "access_expires": config.access_expires,
                "refresh": format!("refresh-{}", n),
                "refresh_expires": 2_592_000,
            });
            send_response(&mut stream, 200, "OK", &response.to_string());
        }
        ("POST", "/token/refresh/") => {
            counters.refresh.fetch_add(1, Ordering::SeqCst);
            let presented = payload["refresh"].as_str().unwrap_or("");
            if config.fail_refresh || !presented.starts_with("refresh-") {
                send_response(
                    &mut stream,
                    401,
                    "Unauthorized",
                    r#"{"summary": "Invalid token", "detail": "Token is invalid or expired", "status_code": 401}"#,
                );
                return;
            }
            let n = counters.issued.fetch_add(1, Ordering::SeqCst) + 1;
            let mut response = json!({
                "access": format!("access-{}", n),
                "access_expires": config.access_expires,
            });
            if config.rotate_refresh {
                response["refresh"] = json!(format!("refresh-{}", n));
            }
            send_response(&mut stream, 200, "OK", &response.to_string());
        }
        ("GET", "/institutions/") => {
            counters.institutions.fetch_add(1, Ordering::SeqCst);
            if !has_bearer {
                send_response(
                    &mut stream,
                    401,
                    "Unauthorized",
                    r#"{"summary": "Authentication credentials were not provided.", "status_code": 401}"#,
                );
                return;
            }
            if let Some(status) = config.institutions_status {
                send_response(
                    &mut stream,
                    status,
                    "Error",
                    r#"{"summary": "Service unavailable", "status_code": 503}"#,
                );
                return;
            }
            let country = path
                .split_once("country=")
                .map(|(_, c)| c.to_string())
                .unwrap_or_default();
            let list: Vec<JsonValue> = config
                .institutions
                .iter()
                .map(|(id, name)| {
                    json!({
                        "id": id,
                        "name": name,
                        "bic": id.rsplit('_').next().unwrap_or(""),
                        "transaction_total_days": "730",
                        "countries": [country],
                        "logo": format!("https://cdn.example/{}.png", id.to_lowercase()),
                    })
                })
                .collect();
            send_response(&mut stream, 200, "OK", &JsonValue::Array(list).to_string());
        }
        ("POST", "/requisitions/") => {
            counters.requisitions.fetch_add(1, Ordering::SeqCst);
            if !has_bearer {
                send_response(&mut stream, 401, "Unauthorized", r#"{"status_code": 401}"#);
                return;
            }
            let n = counters.requisitions.load(Ordering::SeqCst);
            let response = json!({
                "id": format!("req-{}", n),
                "status": "CR",
                "link": format!("https://ob.example/psd2/start/req-{}", n),
                "reference": payload["reference"],
                "institution_id": payload["institution_id"],
            });
            send_response(&mut stream, 201, "Created", &response.to_string());
        }
        _ => {
            send_response(
                &mut stream,
                404,
                "Not Found",
                r#"{"detail": "Endpoint not found"}"#,
            );
        }
    }
}

fn send_response(stream: &mut TcpStream, status: u16, status_text: &str, body: &str) {
    let response = format!(
        "HTTP/1.1 {} {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        status_text,
        body.len(),
        body
    );
    let _ = stream.write_all(response.as_bytes());
    let _ = stream.flush();
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::adapters::gocardless::GoCardlessClient;
    use crate::domain::result::Error;
    use crate::domain::RequisitionRequest;
    use crate::ports::AggregatorApi;

    fn client_for(server: &MockGoCardlessServer) -> GoCardlessClient {
        GoCardlessClient::new_with_base_url(&server.base_url(), Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn test_new_token() {
        let server = MockGoCardlessServer::start(MockConfig::default()).unwrap();
        let pair = client_for(&server).new_token("valid_id", "valid_key").unwrap();

        assert!(pair.access.starts_with("access-"));
        assert!(pair.refresh.starts_with("refresh-"));
        assert_eq!(pair.access_expires, 86_400);
        assert_eq!(pair.refresh_expires, Some(2_592_000));
    }

    #[test]
    fn test_new_token_rejected() {
        let server = MockGoCardlessServer::start(MockConfig::default()).unwrap();
        let err = client_for(&server).new_token("valid_id", "wrong").unwrap_err();

        match err {
            Error::Upstream { status, body } => {
                assert_eq!(status, 401);
                assert!(body.contains("Authentication failed"));
            }
            other => panic!("expected upstream error, got {:?}", other),
        }
    }

    #[test]
    fn test_refresh_token() {
        let server = MockGoCardlessServer::start(MockConfig::default()).unwrap();
        let client = client_for(&server);
        let pair = client.new_token("valid_id", "valid_key").unwrap();

        let refreshed = client.refresh_token(&pair.refresh).unwrap();
        assert_ne!(refreshed.access, pair.access);
        assert!(refreshed.refresh.is_none());
    }

    #[test]
    fn test_refresh_rotation() {
        let server = MockGoCardlessServer::start(MockConfig {
            rotate_refresh: true,
            ..Default::default()
        })
        .unwrap();
        let refreshed = client_for(&server).refresh_token("refresh-1").unwrap();
        assert!(refreshed.refresh.is_some());
    }

    #[test]
    fn test_refresh_rejected() {
        let server = MockGoCardlessServer::start(MockConfig {
            fail_refresh: true,
            ..Default::default()
        })
        .unwrap();
        let err = client_for(&server).refresh_token("refresh-1").unwrap_err();
        assert!(matches!(err, Error::Upstream { status: 401, .. }));
    }

    #[test]
    fn test_list_institutions() {
        let server = MockGoCardlessServer::start(MockConfig::default()).unwrap();
        let client = client_for(&server);
        let pair = client.new_token("valid_id", "valid_key").unwrap();

        let list = client.list_institutions(&pair.access, "GB").unwrap();
        assert_eq!(list.len(), 3);
        // Client returns aggregator order; sorting is the catalog's job
        assert_eq!(list[0].name, "Revolut");
        assert_eq!(list[0].countries, vec!["GB".to_string()]);
        assert_eq!(list[0].transaction_total_days, Some(730));
    }

    #[test]
    fn test_list_institutions_requires_bearer() {
        let server = MockGoCardlessServer::start(MockConfig::default()).unwrap();
        let err = client_for(&server)
            .list_institutions("not-a-token", "GB")
            .unwrap_err();
        assert!(matches!(err, Error::Upstream { status: 401, .. }));
    }

    #[test]
    fn test_list_institutions_upstream_error() {
        let server = MockGoCardlessServer::start(MockConfig {
            institutions_status: Some(503),
            ..Default::default()
        })
        .unwrap();
        let err = client_for(&server)
            .list_institutions("access-1", "GB")
            .unwrap_err();
        assert!(matches!(err, Error::Upstream { status: 503, .. }));
    }

    #[test]
    fn test_create_requisition() {
        let server = MockGoCardlessServer::start(MockConfig::default()).unwrap();
        let requisition = client_for(&server)
            .create_requisition(
                "access-1",
                &RequisitionRequest {
                    institution_id: "MONZO_MONZGB2L".to_string(),
                    redirect: "http://localhost/callback".to_string(),
                    reference: "ref-1".to_string(),
                },
            )
            .unwrap();

        assert_eq!(requisition.status, "CR");
        assert!(requisition.link.contains(&requisition.id));
        assert_eq!(requisition.reference.as_deref(), Some("ref-1"));
        assert_eq!(requisition.institution_id.as_deref(), Some("MONZO_MONZGB2L"));
    }

    #[test]
    fn test_timeout_is_distinct_and_retryable() {
        let server = MockGoCardlessServer::start(MockConfig {
            delay_ms: 1_500,
            ..Default::default()
        })
        .unwrap();
        let client =
            GoCardlessClient::new_with_base_url(&server.base_url(), Duration::from_millis(300))
                .unwrap();

        let err = client.new_token("valid_id", "valid_key").unwrap_err();
        assert!(matches!(err, Error::Timeout(_)), "got {:?}", err);
        assert!(err.is_retryable());
    }

    #[test]
    fn test_counters() {
        let server = MockGoCardlessServer::start(MockConfig::default()).unwrap();
        let client = client_for(&server);
        client.new_token("valid_id", "valid_key").unwrap();
        client.refresh_token("refresh-1").unwrap();

        assert_eq!(server.counters().new_token.load(Ordering::SeqCst), 1);
        assert_eq!(server.counters().refresh.load(Ordering::SeqCst), 1);
        assert_eq!(server.total_requests(), 2);
    }
}
