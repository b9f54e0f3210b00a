//! Immutable audit sinks and backend composition.

use rspp_core::{ReplayAuditEvent, ValidationError};
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tracing::warn;

/// Audit write error
#[derive(Debug, Error)]
pub enum AuditError {
    /// No sink was configured
    #[error("replay audit sink is not configured")]
    SinkUnset,
    /// Event failed validation
    #[error("invalid replay audit event: {0}")]
    InvalidEvent(#[from] ValidationError),
    /// Event could not be encoded
    #[error("failed to encode replay audit event: {0}")]
    Encode(#[from] serde_json::Error),
    /// Backend configuration is unusable
    #[error("invalid replay audit backend config: {0}")]
    Config(String),
    /// Tenant id yields no usable file name
    #[error("tenant id {tenant_id:?} cannot name an audit file")]
    InvalidTenant {
        /// Offending tenant id
        tenant_id: String,
    },
    /// Audit file write failed
    #[error("replay audit file {path}: {source}")]
    Io {
        /// File or directory
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },
    /// Endpoint answered with a non-success status
    #[error("replay audit endpoint {endpoint} returned HTTP {status}")]
    HttpStatus {
        /// Endpoint URL
        endpoint: String,
        /// Response status
        status: u16,
    },
    /// Endpoint could not be reached
    #[error("replay audit endpoint {endpoint} transport error: {reason}")]
    Transport {
        /// Endpoint URL
        endpoint: String,
        /// Transport failure
        reason: String,
    },
    /// Every HTTP endpoint failed
    #[error("all replay audit endpoints failed: {}", join_errors(.0))]
    EndpointsExhausted(Vec<AuditError>),
    /// Every backend in a fallback chain failed
    #[error("all replay audit backends failed: {}", join_errors(.0))]
    AllBackendsFailed(Vec<AuditError>),
}

fn join_errors(errors: &[AuditError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Append-only destination for audit events
pub trait ReplayAuditSink: Send + Sync {
    /// Durably append one event
    ///
    /// # Errors
    ///
    /// Returns error when the event was not persisted
    fn append(&self, event: &ReplayAuditEvent) -> Result<(), AuditError>;
}

/// Resolves the audit sink for a tenant
pub trait ImmutableReplayAuditBackendResolver: Send + Sync {
    /// Sink that should receive `tenant_id`'s events
    ///
    /// # Errors
    ///
    /// Returns error when no backend is available for the tenant
    fn resolve_backend(&self, tenant_id: &str) -> Result<Arc<dyn ReplayAuditSink>, AuditError>;
}

/// Resolver that hands out the same sink for every tenant
#[derive(Clone)]
pub struct StaticAuditBackendResolver {
    sink: Arc<dyn ReplayAuditSink>,
}

impl StaticAuditBackendResolver {
    /// Wrap `sink`
    #[must_use]
    pub fn new(sink: Arc<dyn ReplayAuditSink>) -> Self {
        Self { sink }
    }
}

impl ImmutableReplayAuditBackendResolver for StaticAuditBackendResolver {
    fn resolve_backend(&self, _tenant_id: &str) -> Result<Arc<dyn ReplayAuditSink>, AuditError> {
        Ok(Arc::clone(&self.sink))
    }
}

/// Ordered chain of backend resolvers.
///
/// A write succeeds as soon as one backend accepts it and fails only when
/// every backend failed, carrying all errors in order.
#[derive(Clone, Default)]
pub struct FallbackAuditSink {
    resolvers: Vec<Arc<dyn ImmutableReplayAuditBackendResolver>>,
}

impl FallbackAuditSink {
    /// Empty chain; writes fail until a tier is added
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Primary then fallback
    #[must_use]
    pub fn primary_with_fallback(
        primary: Arc<dyn ImmutableReplayAuditBackendResolver>,
        fallback: Arc<dyn ImmutableReplayAuditBackendResolver>,
    ) -> Self {
        Self::new().with_tier(primary).with_tier(fallback)
    }

    /// Append a tier to the chain
    #[must_use]
    pub fn with_tier(mut self, resolver: Arc<dyn ImmutableReplayAuditBackendResolver>) -> Self {
        self.resolvers.push(resolver);
        self
    }

    /// Number of tiers
    #[must_use]
    pub fn len(&self) -> usize {
        self.resolvers.len()
    }

    /// Whether the chain has no tiers
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.resolvers.is_empty()
    }
}

impl ReplayAuditSink for FallbackAuditSink {
    fn append(&self, event: &ReplayAuditEvent) -> Result<(), AuditError> {
        if self.resolvers.is_empty() {
            return Err(AuditError::SinkUnset);
        }

        let mut errors = Vec::new();
        for (tier, resolver) in self.resolvers.iter().enumerate() {
            let result = resolver
                .resolve_backend(event.tenant_id())
                .and_then(|sink| sink.append(event));
            match result {
                Ok(()) => return Ok(()),
                Err(err) => {
                    warn!(tier, tenant_id = event.tenant_id(), error = %err, "replay audit backend failed");
                    errors.push(err);
                }
            }
        }
        Err(AuditError::AllBackendsFailed(errors))
    }
}
