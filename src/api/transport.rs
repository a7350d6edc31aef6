//! HTTP transport shared by every stats call.
//!
//! A single synchronous `ureq` agent with a fixed timeout. Each request:
//!
//! - carries the `X-Requested-With: XMLHttpRequest` marker header,
//! - carries `X-NginxPulse-Key` when the credential provider has a key,
//! - resolves to the decoded JSON body, or to an [`ApiError`] whose message
//!   is the body's `error` field, else the transport's own message, else
//!   a generic fallback.
//!
//! A 401 additionally notifies every [`AuthObserver`](crate::auth::AuthObserver)
//! registered on the transport's [`AuthNotifier`] before the error is returned.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::Value;

use super::error::{ApiError, body_error_field, resolve_message};
use super::params::QueryParams;
use crate::auth::{
    ACCESS_KEY_HEADER, AuthNotifier, AuthRequired, CredentialProvider, FileCredentialStore,
    NoCredential, StaticCredential,
};
use crate::config::PulseConfig;
use crate::logging::{RequestLog, RequestLogEntry};

/// Per-request timeout used unless configured otherwise.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(15_000);

/// Header marking the request as a programmatic (XHR-style) call.
pub const MARKER_HEADER: &str = "X-Requested-With";
pub const MARKER_VALUE: &str = "XMLHttpRequest";

/// Something that can GET a JSON document from the backend.
///
/// The façade only depends on this trait; [`HttpTransport`] is the real
/// implementation.
pub trait Transport: Send + Sync {
    /// GET `path` (e.g. `/api/stats/url`) with the given query parameters.
    fn get_json(&self, path: &str, params: &QueryParams) -> Result<Value, ApiError>;
}

impl<T: Transport + ?Sized> Transport for Arc<T> {
    fn get_json(&self, path: &str, params: &QueryParams) -> Result<Value, ApiError> {
        (**self).get_json(path, params)
    }
}

impl<T: Transport + ?Sized> Transport for &T {
    fn get_json(&self, path: &str, params: &QueryParams) -> Result<Value, ApiError> {
        (**self).get_json(path, params)
    }
}

// ---------------------------------------------------------------------------
// ureq transport
// ---------------------------------------------------------------------------

/// Blocking HTTP transport over a shared `ureq` agent.
///
/// Cheap to share between threads: the agent pools connections internally,
/// and each call reads the credential afresh.
pub struct HttpTransport {
    agent: ureq::Agent,
    base_url: String,
    timeout: Duration,
    credentials: Arc<dyn CredentialProvider>,
    notifier: Arc<AuthNotifier>,
    request_log: Option<RequestLog>,
}

impl HttpTransport {
    /// Transport to `base_url` with the default timeout, no credential and
    /// no request log.
    pub fn new(base_url: &str) -> Self {
        Self::with_timeout(base_url, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(base_url: &str, timeout: Duration) -> Self {
        let agent = ureq::AgentBuilder::new().timeout(timeout).build();
        Self {
            agent,
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout,
            credentials: Arc::new(NoCredential),
            notifier: Arc::new(AuthNotifier::new()),
            request_log: None,
        }
    }

    /// Build a transport from the resolved configuration.
    ///
    /// Credential precedence: `auth.access_key` (e.g. from `PULSE_ACCESS_KEY`)
    /// over the key file at `auth.key_file`.
    pub fn from_config(config: &PulseConfig) -> Self {
        let mut transport = Self::with_timeout(&config.server.base_url, config.server.timeout());

        if let Some(key) = config.auth.access_key.as_deref().filter(|k| !k.trim().is_empty()) {
            transport = transport.credentials(StaticCredential::new(key));
        } else if let Some(path) = config.auth.key_file_path() {
            transport = transport.credentials(FileCredentialStore::new(path));
        }

        if config.logging.enabled
            && let Some(path) = config.logging.log_path()
        {
            transport = transport.request_log(RequestLog::new(path));
        }

        transport
    }

    pub fn credentials(mut self, provider: impl CredentialProvider + 'static) -> Self {
        self.credentials = Arc::new(provider);
        self
    }

    /// Share an existing notifier, e.g. one the front end already subscribed to.
    pub fn notifier(mut self, notifier: Arc<AuthNotifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn request_log(mut self, log: RequestLog) -> Self {
        self.request_log = Some(log);
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Notifier fired on every 401; subscribe here to be told to re-authenticate.
    pub fn auth_notifier(&self) -> &Arc<AuthNotifier> {
        &self.notifier
    }

    fn send(&self, path: &str, params: &QueryParams) -> (Option<u16>, Result<Value, ApiError>) {
        let url = format!("{}{}", self.base_url, path);

        let mut request = self.agent.get(&url).set(MARKER_HEADER, MARKER_VALUE);
        if let Some(key) = self.credentials.access_key() {
            request = request.set(ACCESS_KEY_HEADER, &key);
        }
        for (name, value) in params.iter() {
            request = request.query(name, value);
        }

        match request.call() {
            Ok(response) => {
                let status = response.status();
                let decoded = response
                    .into_json::<Value>()
                    .map_err(|e| ApiError::decode(format!("invalid JSON from {path}: {e}")));
                (Some(status), decoded)
            }
            Err(ureq::Error::Status(code, response)) => {
                let body = response.into_string().unwrap_or_default();
                let error = self.status_error(code, &body);
                (Some(code), Err(error))
            }
            Err(ureq::Error::Transport(transport)) => {
                let message = resolve_message(None, Some(&transport.to_string()));
                (None, Err(ApiError::transport(message)))
            }
        }
    }

    fn status_error(&self, code: u16, body: &str) -> ApiError {
        let fallback = format!("request failed with status code {code}");
        let message = resolve_message(body_error_field(body).as_deref(), Some(&fallback));

        if code == 401 {
            self.notifier.notify(&AuthRequired {
                message: message.clone(),
            });
        }

        ApiError::status(code, message)
    }
}

impl Transport for HttpTransport {
    fn get_json(&self, path: &str, params: &QueryParams) -> Result<Value, ApiError> {
        let start = Instant::now();
        let (status, result) = self.send(path, params);

        if let Some(log) = &self.request_log {
            let latency_ms = start.elapsed().as_millis() as u64;
            let error = result.as_ref().err().map(ApiError::message);
            log.record(&RequestLogEntry::new(path, status, latency_ms, error));
        }

        result
    }
}

impl fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpTransport")
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .field("credentials", &self.credentials)
            .field("request_log", &self.request_log)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_uses_default_timeout_and_strips_slash() {
        let transport = HttpTransport::new("http://127.0.0.1:8089/");
        assert_eq!(transport.base_url(), "http://127.0.0.1:8089");
        assert_eq!(transport.timeout(), Duration::from_millis(15_000));
    }

    #[test]
    fn from_config_prefers_static_key() {
        let mut config = PulseConfig::default();
        config.auth.access_key = Some("env-key".to_string());
        config.logging.enabled = false;
        let transport = HttpTransport::from_config(&config);
        assert_eq!(transport.credentials.access_key().as_deref(), Some("env-key"));
        assert!(transport.request_log.is_none());
    }

    #[test]
    fn from_config_applies_timeout() {
        let mut config = PulseConfig::default();
        config.server.timeout_ms = 250;
        config.server.base_url = "http://stats.internal".to_string();
        let transport = HttpTransport::from_config(&config);
        assert_eq!(transport.timeout(), Duration::from_millis(250));
        assert_eq!(transport.base_url(), "http://stats.internal");
    }

    #[test]
    fn from_config_treats_zero_timeout_as_default() {
        let mut config = PulseConfig::default();
        config.server.timeout_ms = 0;
        config.logging.enabled = false;
        let transport = HttpTransport::from_config(&config);
        assert_eq!(transport.timeout(), DEFAULT_TIMEOUT);
    }

    #[test]
    fn unreachable_backend_is_a_transport_error() {
        // Port 9 (discard) is essentially never listening on loopback.
        let transport = HttpTransport::with_timeout("http://127.0.0.1:9", Duration::from_secs(2));
        let err = transport
            .get_json("/api/websites", &QueryParams::new())
            .unwrap_err();
        assert_eq!(err.kind(), crate::api::ErrorKind::Transport);
        assert!(!err.message().is_empty());
    }
}
