/// Wire-level tests for the HTTP transport.
///
/// Each test starts a throwaway `tiny_http` server on an ephemeral loopback
/// port, answers a scripted sequence of responses, and reports back what the
/// client actually sent (request line and headers).
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tiny_http::{Header, Response, Server, StatusCode};

use pulse_query::api::{ErrorKind, HttpTransport, LogsQuery, SortOrder, StatsClient};
use pulse_query::auth::{AuthRequired, StaticCredential};
use pulse_query::logging::RequestLog;

/// What the server saw for one request.
#[derive(Debug)]
struct Captured {
    url: String,
    headers: Vec<(String, String)>,
}

impl Captured {
    fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

struct MockBackend {
    base_url: String,
    seen: Receiver<Captured>,
    handle: JoinHandle<()>,
}

impl MockBackend {
    /// Serve `responses` in order, one per request, then stop.
    fn start(responses: Vec<(u16, &'static str)>) -> Self {
        Self::start_with_delay(responses, Duration::ZERO)
    }

    fn start_with_delay(responses: Vec<(u16, &'static str)>, delay: Duration) -> Self {
        let server = Server::http("127.0.0.1:0").unwrap();
        let addr = server.server_addr().to_ip().unwrap();
        let (tx, seen) = mpsc::channel();

        let handle = thread::spawn(move || {
            for (status, body) in responses {
                let Ok(request) = server.recv() else { return };
                let headers = request
                    .headers()
                    .iter()
                    .map(|h| (h.field.to_string(), h.value.to_string()))
                    .collect();
                let _ = tx.send(Captured {
                    url: request.url().to_string(),
                    headers,
                });

                if !delay.is_zero() {
                    thread::sleep(delay);
                }
                let content_type =
                    Header::from_bytes(&b"Content-Type"[..], &b"application/json"[..]).unwrap();
                let response = Response::from_string(body)
                    .with_status_code(StatusCode(status))
                    .with_header(content_type);
                let _ = request.respond(response);
            }
        });

        Self {
            base_url: format!("http://{addr}"),
            seen,
            handle,
        }
    }

    fn next_request(&self) -> Captured {
        self.seen.recv_timeout(Duration::from_secs(5)).unwrap()
    }

    fn finish(self) {
        self.handle.join().unwrap();
    }
}

// ---------------------------------------------------------------------------
// Success path
// ---------------------------------------------------------------------------

#[test]
fn success_decodes_body_and_sends_marker_header() {
    let backend = MockBackend::start(vec![(200, r#"{"websites":[{"id":"a","name":"Shop"}]}"#)]);
    let client = StatsClient::new(HttpTransport::new(&backend.base_url));

    let sites = client.fetch_websites().unwrap();
    assert_eq!(sites.len(), 1);
    assert_eq!(sites[0].name, "Shop");

    let seen = backend.next_request();
    assert_eq!(seen.url, "/api/websites");
    assert_eq!(seen.header("X-Requested-With"), Some("XMLHttpRequest"));
    assert_eq!(seen.header("X-NginxPulse-Key"), None);
    backend.finish();
}

#[test]
fn query_string_is_sorted_by_key() {
    let backend = MockBackend::start(vec![(200, r#"{"key":[],"uv":[]}"#)]);
    let client = StatsClient::new(HttpTransport::new(&backend.base_url));

    client.fetch_url_stats("site-1", "today", None).unwrap();

    let seen = backend.next_request();
    assert_eq!(seen.url, "/api/stats/url?id=site-1&limit=10&timeRange=today");
    backend.finish();
}

#[test]
fn reserved_characters_in_filters_are_form_encoded() {
    let backend = MockBackend::start(vec![(200, r#"{"logs":[]}"#)]);
    let client = StatsClient::new(HttpTransport::new(&backend.base_url));

    let mut query = LogsQuery::new("s", 1, 20, "timestamp", SortOrder::Desc);
    query.url_filter = Some("/a b+c&d".to_string());
    client.fetch_logs(&query).unwrap();

    let seen = backend.next_request();
    assert_eq!(
        seen.url,
        "/api/stats/logs?id=s&page=1&pageSize=20&sortField=timestamp&sortOrder=desc\
         &urlFilter=%2Fa+b%2Bc%26d"
    );
    backend.finish();
}

#[test]
fn access_key_header_sent_when_configured() {
    let backend = MockBackend::start(vec![(200, r#"{"log_parsing":false}"#)]);
    let transport =
        HttpTransport::new(&backend.base_url).credentials(StaticCredential::new("  s3cret "));
    let client = StatsClient::new(transport);

    client.fetch_app_status().unwrap();

    let seen = backend.next_request();
    assert_eq!(seen.header("X-NginxPulse-Key"), Some("s3cret"));
    assert_eq!(seen.header("X-Requested-With"), Some("XMLHttpRequest"));
    backend.finish();
}

#[test]
fn blank_access_key_is_not_sent() {
    let backend = MockBackend::start(vec![(200, r#"{}"#)]);
    let transport = HttpTransport::new(&backend.base_url).credentials(StaticCredential::new("  "));
    StatsClient::new(transport).fetch_websites().unwrap();

    assert_eq!(backend.next_request().header("X-NginxPulse-Key"), None);
    backend.finish();
}

#[test]
fn invalid_json_on_success_is_decode_error() {
    let backend = MockBackend::start(vec![(200, "<html>gateway</html>")]);
    let client = StatsClient::new(HttpTransport::new(&backend.base_url));

    let err = client.fetch_app_status().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Decode);
    backend.finish();
}

// ---------------------------------------------------------------------------
// Failure mapping
// ---------------------------------------------------------------------------

#[test]
fn unauthorized_uses_body_message_and_notifies_once() {
    let backend = MockBackend::start(vec![(401, r#"{"error":"unauthorized"}"#)]);
    let transport = HttpTransport::new(&backend.base_url);

    let hits = Arc::new(AtomicUsize::new(0));
    let messages = Arc::new(std::sync::Mutex::new(Vec::new()));
    {
        let hits = Arc::clone(&hits);
        let messages = Arc::clone(&messages);
        transport
            .auth_notifier()
            .subscribe(move |event: &AuthRequired| {
                hits.fetch_add(1, Ordering::SeqCst);
                messages.lock().unwrap().push(event.message.clone());
            });
    }

    let client = StatsClient::new(transport);
    let err = client.fetch_overall_stats("s", "today", None).unwrap_err();

    assert_eq!(err.message(), "unauthorized");
    assert_eq!(err.kind(), ErrorKind::Unauthorized);
    assert!(err.is_unauthorized());
    assert_eq!(hits.load(Ordering::SeqCst), 1);
    assert_eq!(messages.lock().unwrap().as_slice(), ["unauthorized"]);
    backend.finish();
}

#[test]
fn server_error_with_plain_body_has_fallback_message() {
    let backend = MockBackend::start(vec![(500, "Internal Server Error")]);
    let transport = HttpTransport::new(&backend.base_url);
    let hits = Arc::new(AtomicUsize::new(0));
    {
        let hits = Arc::clone(&hits);
        transport.auth_notifier().subscribe(move |_: &AuthRequired| {
            hits.fetch_add(1, Ordering::SeqCst);
        });
    }

    let err = StatsClient::new(transport)
        .fetch_session_summary("s", "today")
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Status(500));
    assert_eq!(err.http_status(), Some(500));
    assert!(!err.message().is_empty());
    assert!(err.message().contains("500"), "{}", err.message());
    assert_eq!(hits.load(Ordering::SeqCst), 0);
    backend.finish();
}

#[test]
fn status_error_prefers_body_error_field() {
    let backend = MockBackend::start(vec![(404, r#"{"error":"站点不存在"}"#)]);
    let err = StatsClient::new(HttpTransport::new(&backend.base_url))
        .fetch_realtime_stats("missing", 30)
        .unwrap_err();

    assert_eq!(err.message(), "站点不存在");
    assert_eq!(err.to_string(), "站点不存在");
    backend.finish();
}

#[test]
fn body_error_with_surrounding_whitespace_is_not_trimmed() {
    let backend = MockBackend::start(vec![(403, r#"{"error":"  access denied "}"#)]);
    let err = StatsClient::new(HttpTransport::new(&backend.base_url))
        .fetch_websites()
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Status(403));
    assert_eq!(err.message(), "  access denied ");
    backend.finish();
}

#[test]
fn slow_backend_times_out_as_transport_error() {
    let backend =
        MockBackend::start_with_delay(vec![(200, r#"{}"#)], Duration::from_millis(1500));
    let transport = HttpTransport::with_timeout(&backend.base_url, Duration::from_millis(200));

    let err = StatsClient::new(transport).fetch_websites().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Transport);
    assert!(!err.message().is_empty());
    backend.finish();
}

// ---------------------------------------------------------------------------
// Sharing and logging
// ---------------------------------------------------------------------------

#[test]
fn concurrent_calls_share_one_client() {
    const CALLS: usize = 8;
    let backend = MockBackend::start(vec![(200, r#"{"key":["/"],"uv":[1]}"#); CALLS]);
    let client = StatsClient::new(HttpTransport::new(&backend.base_url));

    thread::scope(|scope| {
        for i in 0..CALLS {
            let client = &client;
            scope.spawn(move || {
                let stats = client
                    .fetch_browser_stats(&format!("site-{i}"), "today", None)
                    .unwrap();
                assert_eq!(stats.key, vec!["/"]);
            });
        }
    });

    let mut urls: Vec<String> = (0..CALLS).map(|_| backend.next_request().url).collect();
    urls.sort();
    assert_eq!(urls.len(), CALLS);
    assert!(urls.iter().all(|u| u.starts_with("/api/stats/browser?id=site-")));
    backend.finish();
}

#[test]
fn completed_requests_are_written_to_request_log() {
    let dir = std::env::temp_dir().join(format!("pulse-transport-log-{}", std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    let log = RequestLog::new(dir.join("requests.jsonl"));

    let backend = MockBackend::start(vec![(200, r#"{}"#), (401, r#"{"error":"unauthorized"}"#)]);
    let transport = HttpTransport::new(&backend.base_url).request_log(log.clone());
    let client = StatsClient::new(transport);

    client.fetch_websites().unwrap();
    client.fetch_websites().unwrap_err();

    let entries = log.read_all();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].endpoint, "/api/websites");
    assert_eq!(entries[0].status, Some(200));
    assert!(entries[0].success);
    assert_eq!(entries[1].status, Some(401));
    assert!(!entries[1].success);
    assert_eq!(entries[1].error.as_deref(), Some("unauthorized"));

    backend.finish();
    let _ = std::fs::remove_dir_all(&dir);
}
