//! Replay access request, decision, and audit schemas.

use crate::error::{ValidationError, ValidationResult, require, require_non_negative};
use crate::payload::{PayloadClass, RedactionAction, ReplayFidelity};
use serde::{Deserialize, Serialize};

/// Who wants to read replay evidence, and why
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplayAccessRequest {
    /// Tenant the evidence belongs to
    #[serde(default)]
    pub tenant_id: String,
    /// Requesting principal
    #[serde(default)]
    pub principal_id: String,
    /// Principal role
    #[serde(default)]
    pub role: String,
    /// Declared purpose
    #[serde(default)]
    pub purpose: String,
    /// Requested evidence scope, e.g. `turn:<id>`
    #[serde(default)]
    pub requested_scope: String,
    /// Requested fidelity
    pub requested_fidelity: ReplayFidelity,
    /// Requested payload classes; empty means metadata only
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub requested_classes: Vec<PayloadClass>,
}

impl ReplayAccessRequest {
    /// Validate request shape.
    ///
    /// Tenant presence is checked by the access policy, not here, so that a
    /// missing tenant yields its own deny reason.
    ///
    /// # Errors
    ///
    /// Returns error on missing principal, role, purpose, or scope
    pub fn validate(&self) -> ValidationResult {
        const SCHEMA: &str = "replay_access_request";
        require(SCHEMA, "principal_id", &self.principal_id)?;
        require(SCHEMA, "role", &self.role)?;
        require(SCHEMA, "purpose", &self.purpose)?;
        require(SCHEMA, "requested_scope", &self.requested_scope)
    }
}

/// Redaction applied to one payload class of an allowed request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplayRedactionMarker {
    /// Payload class
    pub payload_class: PayloadClass,
    /// Redaction action
    pub action: RedactionAction,
    /// Policy reason tag
    pub reason: String,
}

impl ReplayRedactionMarker {
    /// Validate the reason tag
    ///
    /// # Errors
    ///
    /// Returns error if reason is empty
    pub fn validate(&self) -> ValidationResult {
        require("replay_redaction_marker", "reason", &self.reason)
    }
}

/// Result of a replay access check
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplayAccessDecision {
    /// Whether access is granted
    pub allowed: bool,
    /// Fixed deny code, empty when allowed
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub deny_reason: String,
    /// Redaction markers, only when allowed
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub redaction_markers: Vec<ReplayRedactionMarker>,
}

impl ReplayAccessDecision {
    /// Denied decision with a fixed reason code
    #[must_use]
    pub fn deny(reason: impl Into<String>) -> Self {
        Self {
            allowed: false,
            deny_reason: reason.into(),
            redaction_markers: Vec::new(),
        }
    }

    /// Allowed decision with redaction markers
    #[must_use]
    pub fn allow(redaction_markers: Vec<ReplayRedactionMarker>) -> Self {
        Self {
            allowed: true,
            deny_reason: String::new(),
            redaction_markers,
        }
    }

    /// Validate the allow/deny invariant
    ///
    /// # Errors
    ///
    /// Returns error when a denial has no reason or carries markers, or an
    /// allowance carries a reason
    pub fn validate(&self) -> ValidationResult {
        const SCHEMA: &str = "replay_access_decision";
        if self.allowed {
            if !self.deny_reason.is_empty() {
                return Err(ValidationError::invalid(
                    SCHEMA,
                    "deny_reason",
                    "must be empty when allowed",
                ));
            }
            for marker in &self.redaction_markers {
                marker.validate()?;
            }
            return Ok(());
        }
        require(SCHEMA, "deny_reason", &self.deny_reason)?;
        if !self.redaction_markers.is_empty() {
            return Err(ValidationError::invalid(
                SCHEMA,
                "redaction_markers",
                "must be empty when denied",
            ));
        }
        Ok(())
    }
}

/// Immutable audit record of one access decision
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplayAuditEvent {
    timestamp_ms: i64,
    request: ReplayAccessRequest,
    decision: ReplayAccessDecision,
}

impl ReplayAuditEvent {
    /// Build and validate an audit event
    ///
    /// # Errors
    ///
    /// Returns error if the timestamp is negative or the decision is invalid
    pub fn new(
        timestamp_ms: i64,
        request: ReplayAccessRequest,
        decision: ReplayAccessDecision,
    ) -> ValidationResult<Self> {
        let event = Self {
            timestamp_ms,
            request,
            decision,
        };
        event.validate()?;
        Ok(event)
    }

    /// Validate the event
    ///
    /// # Errors
    ///
    /// Returns the first invalid component
    pub fn validate(&self) -> ValidationResult {
        require_non_negative("replay_audit_event", "timestamp_ms", self.timestamp_ms)?;
        self.decision.validate()
    }

    /// Event time
    #[must_use]
    pub const fn timestamp_ms(&self) -> i64 {
        self.timestamp_ms
    }

    /// Audited request
    #[must_use]
    pub const fn request(&self) -> &ReplayAccessRequest {
        &self.request
    }

    /// Audited decision
    #[must_use]
    pub const fn decision(&self) -> &ReplayAccessDecision {
        &self.decision
    }

    /// Tenant the event is filed under
    #[must_use]
    pub fn tenant_id(&self) -> &str {
        &self.request.tenant_id
    }
}
