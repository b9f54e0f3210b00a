//! Access service with mandatory audit.
//!
//! Every decision is audited before it is returned. A decision that cannot be
//! audited is turned into a denial.

use crate::access::{DenyReason, ReplayAccessPolicy, authorize_replay_access};
use crate::audit::{AuditError, ReplayAuditSink};
use rspp_core::{Clock, ReplayAccessDecision, ReplayAccessRequest, ReplayAuditEvent, SystemClock};
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info};

/// Audit failure carrying the fail-closed decision
#[derive(Debug, Error)]
#[error("replay access decision could not be audited: {source}")]
pub struct AuditFailure {
    /// Denied decision with `audit_write_failed`
    pub decision: ReplayAccessDecision,
    /// Underlying audit error
    #[source]
    pub source: AuditError,
}

/// Replay access entry point
pub struct AccessService {
    policy: ReplayAccessPolicy,
    sink: Option<Arc<dyn ReplayAuditSink>>,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for AccessService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessService")
            .field("tenant_id", &self.policy.tenant_id)
            .field("audited", &self.sink.is_some())
            .finish_non_exhaustive()
    }
}

impl AccessService {
    /// Service without a sink; every call fails closed until one is set
    #[must_use]
    pub fn new(policy: ReplayAccessPolicy) -> Self {
        Self {
            policy,
            sink: None,
            clock: Arc::new(SystemClock),
        }
    }

    /// Set the audit sink
    #[must_use]
    pub fn with_sink(mut self, sink: Arc<dyn ReplayAuditSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Set the clock used for audit timestamps
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Active policy
    #[must_use]
    pub const fn policy(&self) -> &ReplayAccessPolicy {
        &self.policy
    }

    /// Decide and audit one request.
    ///
    /// # Errors
    ///
    /// Returns [`AuditFailure`] when the event could not be built or written,
    /// including when no sink is configured. Its decision is always denied.
    pub fn authorize_replay_access(
        &self,
        request: &ReplayAccessRequest,
    ) -> Result<ReplayAccessDecision, AuditFailure> {
        let decision = authorize_replay_access(request, &self.policy);

        match self.audit(request, &decision) {
            Ok(()) => {
                info!(
                    tenant_id = %request.tenant_id,
                    principal_id = %request.principal_id,
                    allowed = decision.allowed,
                    deny_reason = %decision.deny_reason,
                    "replay access decided"
                );
                Ok(decision)
            }
            Err(source) => {
                error!(
                    tenant_id = %request.tenant_id,
                    principal_id = %request.principal_id,
                    error = %source,
                    "replay access audit failed; denying"
                );
                Err(AuditFailure {
                    decision: DenyReason::AuditWriteFailed.into(),
                    source,
                })
            }
        }
    }

    fn audit(
        &self,
        request: &ReplayAccessRequest,
        decision: &ReplayAccessDecision,
    ) -> Result<(), AuditError> {
        let event = ReplayAuditEvent::new(self.clock.now_ms(), request.clone(), decision.clone())?;
        let sink = self.sink.as_ref().ok_or(AuditError::SinkUnset)?;
        sink.append(&event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::tests::{access_request, policy};
    use crate::audit::tests::MemorySink;
    use crate::file::{JsonlAuditConfig, JsonlFileAuditSink};
    use rspp_core::FixedClock;

    fn service(sink: Option<Arc<MemorySink>>) -> AccessService {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
        let service = AccessService::new(policy()).with_clock(Arc::new(FixedClock::new(5_000)));
        match sink {
            Some(sink) => service.with_sink(sink),
            None => service,
        }
    }

    #[test]
    fn test_allowed_and_audited() {
        let sink = Arc::new(MemorySink::default());
        let decision = service(Some(Arc::clone(&sink)))
            .authorize_replay_access(&access_request())
            .unwrap();

        assert!(decision.allowed);
        let events = sink.events.lock().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].timestamp_ms(), 5_000);
        assert_eq!(events[0].decision(), &decision);
    }

    #[test]
    fn test_denials_are_audited_too() {
        let sink = Arc::new(MemorySink::default());
        let mut req = access_request();
        req.role = "intern".to_string();
        let decision = service(Some(Arc::clone(&sink)))
            .authorize_replay_access(&req)
            .unwrap();

        assert!(!decision.allowed);
        assert_eq!(decision.deny_reason, "role_not_allowed");
        assert_eq!(sink.count(), 1);
    }

    #[test]
    fn test_invalid_policy_is_an_audited_denial() {
        let sink = Arc::new(MemorySink::default());
        let mut broken = policy();
        broken.policy_version.clear();
        let service = AccessService::new(broken)
            .with_sink(Arc::clone(&sink) as Arc<dyn ReplayAuditSink>)
            .with_clock(Arc::new(FixedClock::new(5_000)));

        let decision = service.authorize_replay_access(&access_request()).unwrap();
        assert!(!decision.allowed);
        assert_eq!(decision.deny_reason, "policy_invalid");
        assert_eq!(sink.count(), 1);
    }

    #[test]
    fn test_fail_closed_without_sink() {
        let failure = service(None)
            .authorize_replay_access(&access_request())
            .unwrap_err();

        assert!(!failure.decision.allowed);
        assert_eq!(failure.decision.deny_reason, "audit_write_failed");
        assert!(matches!(failure.source, AuditError::SinkUnset));
    }

    #[test]
    fn test_fail_closed_on_sink_error() {
        let failure = service(Some(Arc::new(MemorySink::failing())))
            .authorize_replay_access(&access_request())
            .unwrap_err();
        assert_eq!(failure.decision.deny_reason, "audit_write_failed");
        assert!(failure.decision.validate().is_ok());
    }

    #[test]
    fn test_jsonl_backend_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let sink = Arc::new(JsonlFileAuditSink::new(JsonlAuditConfig::new(dir.path())));
        let service = AccessService::new(policy()).with_sink(sink.clone());

        service.authorize_replay_access(&access_request()).unwrap();
        let content = std::fs::read_to_string(sink.path_for("tenant-a").unwrap()).unwrap();
        assert_eq!(content.lines().count(), 1);
    }
}
