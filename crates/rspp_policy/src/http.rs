//! HTTP audit backend.
//!
//! Each event is POSTed as JSON to an ordered list of endpoints. Per
//! endpoint, HTTP 429 and 5xx answers are retried with doubling backoff up
//! to a bounded attempt count. Any other failure moves on to the next
//! endpoint. The first endpoint that accepts the event ends the write.

use crate::audit::{AuditError, ReplayAuditSink};
use rspp_core::ReplayAuditEvent;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Prefix of the environment overrides
pub const HTTP_AUDIT_ENV_PREFIX: &str = "RSPP_REPLAY_AUDIT_HTTP_";

/// HTTP backend configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpAuditConfig {
    /// Endpoints tried in order
    pub endpoints: Vec<String>,
    /// Bearer token
    pub bearer_token: Option<String>,
    /// Client id header value
    pub client_id: Option<String>,
    /// Per-call timeout
    pub timeout_ms: u64,
    /// Attempts per endpoint
    pub retry_max_attempts: u32,
    /// First retry delay
    pub initial_backoff_ms: u64,
    /// Retry delay ceiling
    pub max_backoff_ms: u64,
}

impl Default for HttpAuditConfig {
    fn default() -> Self {
        Self {
            endpoints: Vec::new(),
            bearer_token: None,
            client_id: None,
            timeout_ms: 2_000,
            retry_max_attempts: 3,
            initial_backoff_ms: 100,
            max_backoff_ms: 2_000,
        }
    }
}

impl HttpAuditConfig {
    /// Config with default retry settings
    #[must_use]
    pub fn new(endpoints: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            endpoints: endpoints.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Load from `RSPP_REPLAY_AUDIT_HTTP_*` environment variables
    ///
    /// # Errors
    ///
    /// Returns error on unparsable numbers or an invalid result
    pub fn from_env() -> Result<Self, AuditError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from any key lookup, with defaults for absent keys.
    ///
    /// Recognized keys (after the prefix): `ENDPOINTS` (comma separated),
    /// `BEARER_TOKEN`, `CLIENT_ID`, `TIMEOUT_MS`, `RETRY_MAX_ATTEMPTS`,
    /// `INITIAL_BACKOFF_MS`, `MAX_BACKOFF_MS`.
    ///
    /// # Errors
    ///
    /// Returns error on unparsable numbers or an invalid result
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, AuditError> {
        let get = |name: &str| {
            lookup(&format!("{HTTP_AUDIT_ENV_PREFIX}{name}"))
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let mut config = Self::default();

        if let Some(endpoints) = get("ENDPOINTS") {
            config.endpoints = endpoints
                .split(',')
                .map(str::trim)
                .filter(|e| !e.is_empty())
                .map(str::to_string)
                .collect();
        }
        config.bearer_token = get("BEARER_TOKEN");
        config.client_id = get("CLIENT_ID");
        if let Some(v) = get("TIMEOUT_MS") {
            config.timeout_ms = parse_number("TIMEOUT_MS", &v)?;
        }
        if let Some(v) = get("RETRY_MAX_ATTEMPTS") {
            config.retry_max_attempts = parse_number("RETRY_MAX_ATTEMPTS", &v)?;
        }
        if let Some(v) = get("INITIAL_BACKOFF_MS") {
            config.initial_backoff_ms = parse_number("INITIAL_BACKOFF_MS", &v)?;
        }
        if let Some(v) = get("MAX_BACKOFF_MS") {
            config.max_backoff_ms = parse_number("MAX_BACKOFF_MS", &v)?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    ///
    /// # Errors
    ///
    /// Returns error without endpoints, with zero attempts or timeout, or
    /// with a max backoff below the initial one
    pub fn validate(&self) -> Result<(), AuditError> {
        if self.endpoints.is_empty() {
            return Err(AuditError::Config("at least one endpoint is required".to_string()));
        }
        if let Some(blank) = self.endpoints.iter().position(|e| e.trim().is_empty()) {
            return Err(AuditError::Config(format!("endpoint {blank} is empty")));
        }
        if self.timeout_ms == 0 {
            return Err(AuditError::Config("timeout_ms must be positive".to_string()));
        }
        if self.retry_max_attempts == 0 {
            return Err(AuditError::Config(
                "retry_max_attempts must be positive".to_string(),
            ));
        }
        if self.max_backoff_ms < self.initial_backoff_ms {
            return Err(AuditError::Config(
                "max_backoff_ms must not be below initial_backoff_ms".to_string(),
            ));
        }
        Ok(())
    }

    fn headers(&self, tenant_id: &str) -> Vec<(&'static str, String)> {
        let mut headers = vec![("Content-Type", "application/json".to_string())];
        if let Some(token) = &self.bearer_token {
            headers.push(("Authorization", format!("Bearer {token}")));
        }
        if let Some(client_id) = &self.client_id {
            headers.push(("X-RSPP-Client-ID", client_id.clone()));
        }
        if !tenant_id.trim().is_empty() {
            headers.push(("X-RSPP-Tenant-ID", tenant_id.to_string()));
        }
        headers
    }
}

fn parse_number<T: std::str::FromStr>(name: &str, value: &str) -> Result<T, AuditError> {
    value.parse().map_err(|_| {
        AuditError::Config(format!(
            "{HTTP_AUDIT_ENV_PREFIX}{name} is not a valid number: {value:?}"
        ))
    })
}

/// One outgoing audit POST
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditHttpRequest {
    /// Target URL
    pub endpoint: String,
    /// Header name/value pairs
    pub headers: Vec<(&'static str, String)>,
    /// JSON body
    pub body: Vec<u8>,
    /// Per-call timeout
    pub timeout: Duration,
}

/// Blocking HTTP client seam
pub trait AuditTransport: Send + Sync {
    /// Send one POST and return the response status
    ///
    /// # Errors
    ///
    /// Returns a description when no response was received
    fn post(&self, request: &AuditHttpRequest) -> Result<u16, String>;
}

/// [`AuditTransport`] backed by `ureq`
#[derive(Debug, Clone)]
pub struct UreqTransport {
    agent: ureq::Agent,
}

impl UreqTransport {
    /// Transport with a fresh agent
    #[must_use]
    pub fn new() -> Self {
        Self {
            agent: ureq::AgentBuilder::new().build(),
        }
    }
}

impl Default for UreqTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl AuditTransport for UreqTransport {
    fn post(&self, request: &AuditHttpRequest) -> Result<u16, String> {
        let mut req = self.agent.post(&request.endpoint).timeout(request.timeout);
        for (name, value) in &request.headers {
            req = req.set(name, value);
        }
        match req.send_bytes(&request.body) {
            Ok(resp) => Ok(resp.status()),
            Err(ureq::Error::Status(code, _)) => Ok(code),
            Err(ureq::Error::Transport(err)) => Err(err.to_string()),
        }
    }
}

/// Sleep used between retries
pub type Sleeper = Arc<dyn Fn(Duration) + Send + Sync>;

/// HTTP audit sink
pub struct HttpAuditSink {
    config: HttpAuditConfig,
    transport: Arc<dyn AuditTransport>,
    sleeper: Sleeper,
}

impl std::fmt::Debug for HttpAuditSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpAuditSink")
            .field("endpoints", &self.config.endpoints)
            .finish_non_exhaustive()
    }
}

impl HttpAuditSink {
    /// Sink using `ureq` and a real sleep
    ///
    /// # Errors
    ///
    /// Returns error if the configuration is invalid
    pub fn new(config: HttpAuditConfig) -> Result<Self, AuditError> {
        config.validate()?;
        Ok(Self {
            config,
            transport: Arc::new(UreqTransport::new()),
            sleeper: Arc::new(std::thread::sleep),
        })
    }

    /// Replace the transport
    #[must_use]
    pub fn with_transport(mut self, transport: Arc<dyn AuditTransport>) -> Self {
        self.transport = transport;
        self
    }

    /// Replace the retry sleep
    #[must_use]
    pub fn with_sleeper(mut self, sleeper: Sleeper) -> Self {
        self.sleeper = sleeper;
        self
    }

    /// Configuration
    #[must_use]
    pub const fn config(&self) -> &HttpAuditConfig {
        &self.config
    }

    fn send_to(&self, endpoint: &str, request: &AuditHttpRequest) -> Result<(), AuditError> {
        let max_attempts = self.config.retry_max_attempts.max(1);
        let mut backoff_ms = self.config.initial_backoff_ms;

        let mut attempt = 1;
        loop {
            let status = self
                .transport
                .post(request)
                .map_err(|reason| AuditError::Transport {
                    endpoint: endpoint.to_string(),
                    reason,
                })?;
            if (200..300).contains(&status) {
                return Ok(());
            }
            let failure = AuditError::HttpStatus {
                endpoint: endpoint.to_string(),
                status,
            };
            if !is_retryable(status) || attempt >= max_attempts {
                return Err(failure);
            }
            debug!(endpoint, status, attempt, backoff_ms, "retrying replay audit post");
            (self.sleeper)(Duration::from_millis(backoff_ms));
            backoff_ms = backoff_ms.saturating_mul(2).min(self.config.max_backoff_ms);
            attempt += 1;
        }
    }
}

impl ReplayAuditSink for HttpAuditSink {
    fn append(&self, event: &ReplayAuditEvent) -> Result<(), AuditError> {
        event.validate()?;
        let body = serde_json::to_vec(event)?;
        let headers = self.config.headers(event.tenant_id());
        let timeout = Duration::from_millis(self.config.timeout_ms);

        let mut errors = Vec::new();
        for endpoint in &self.config.endpoints {
            let request = AuditHttpRequest {
                endpoint: endpoint.clone(),
                headers: headers.clone(),
                body: body.clone(),
                timeout,
            };
            match self.send_to(endpoint, &request) {
                Ok(()) => {
                    debug!(endpoint = %endpoint, tenant_id = event.tenant_id(), "replay audit event accepted");
                    return Ok(());
                }
                Err(err) => {
                    warn!(endpoint = %endpoint, error = %err, "replay audit endpoint failed");
                    errors.push(err);
                }
            }
        }
        Err(AuditError::EndpointsExhausted(errors))
    }
}

const fn is_retryable(status: u16) -> bool {
    status == 429 || status >= 500
}
