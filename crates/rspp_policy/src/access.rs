//! Deny-by-default replay access decisions.
//!
//! [`authorize_replay_access`] is pure. Checks run in a fixed order and the
//! first failure wins.

use crate::redact::default_redaction_action;
use rspp_core::{
    PayloadClass, ReplayAccessDecision, ReplayAccessRequest, ReplayFidelity, ReplayRedactionMarker,
    ValidationError, ValidationResult,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Version tag stamped on every redaction marker
pub const REPLAY_ACCESS_POLICY_VERSION: &str = "replay_access_policy/v1";

/// Fixed deny codes, in check order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DenyReason {
    /// Request failed schema validation
    InvalidRequest,
    /// No tenant on the request or the policy
    TenantScopeMissing,
    /// Request tenant differs from policy tenant
    CrossTenantDenied,
    /// Policy failed its own validation
    PolicyInvalid,
    /// Role not in the allow-list
    RoleNotAllowed,
    /// Purpose not in the allow-list
    PurposeNotAllowed,
    /// Fidelity not in the allow-list
    FidelityNotAllowed,
    /// Fidelity is not a level this deployment records at
    RecordingLevelUnsupported,
    /// A requested class has no default redaction at this level
    RedactionUnresolved,
    /// The decision could not be durably audited
    AuditWriteFailed,
}

impl DenyReason {
    /// Wire code
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidRequest => "invalid_request",
            Self::TenantScopeMissing => "tenant_scope_missing",
            Self::CrossTenantDenied => "cross_tenant_denied",
            Self::PolicyInvalid => "policy_invalid",
            Self::RoleNotAllowed => "role_not_allowed",
            Self::PurposeNotAllowed => "purpose_not_allowed",
            Self::FidelityNotAllowed => "fidelity_not_allowed",
            Self::RecordingLevelUnsupported => "recording_level_unsupported",
            Self::RedactionUnresolved => "redaction_unresolved",
            Self::AuditWriteFailed => "audit_write_failed",
        }
    }
}

impl fmt::Display for DenyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<DenyReason> for ReplayAccessDecision {
    fn from(reason: DenyReason) -> Self {
        Self::deny(reason.as_str())
    }
}

/// Per-tenant replay access policy.
///
/// Every allow-list starts empty, so a default policy denies everything.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplayAccessPolicy {
    /// Tenant the policy governs
    pub tenant_id: String,
    /// Roles allowed to read replay evidence
    pub allowed_roles: BTreeSet<String>,
    /// Purposes accepted
    pub allowed_purposes: BTreeSet<String>,
    /// Fidelities that may be requested
    pub allowed_fidelities: BTreeSet<ReplayFidelity>,
    /// Levels evidence is actually recorded at
    pub supported_recording_levels: BTreeSet<ReplayFidelity>,
    /// Reason tag written into redaction markers
    pub policy_version: String,
}

impl Default for ReplayAccessPolicy {
    fn default() -> Self {
        Self {
            tenant_id: String::new(),
            allowed_roles: BTreeSet::new(),
            allowed_purposes: BTreeSet::new(),
            allowed_fidelities: BTreeSet::new(),
            supported_recording_levels: [ReplayFidelity::L0, ReplayFidelity::L1, ReplayFidelity::L2]
                .into_iter()
                .collect(),
            policy_version: REPLAY_ACCESS_POLICY_VERSION.to_string(),
        }
    }
}

impl ReplayAccessPolicy {
    /// Empty policy for `tenant_id`
    #[must_use]
    pub fn new(tenant_id: impl Into<String>) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            ..Self::default()
        }
    }

    /// Allow a role
    #[must_use]
    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.allowed_roles.insert(role.into());
        self
    }

    /// Allow a purpose
    #[must_use]
    pub fn with_purpose(mut self, purpose: impl Into<String>) -> Self {
        self.allowed_purposes.insert(purpose.into());
        self
    }

    /// Allow a fidelity
    #[must_use]
    pub fn with_fidelity(mut self, fidelity: ReplayFidelity) -> Self {
        self.allowed_fidelities.insert(fidelity);
        self
    }

    /// Restrict the recorded levels
    #[must_use]
    pub fn with_recording_levels(
        mut self,
        levels: impl IntoIterator<Item = ReplayFidelity>,
    ) -> Self {
        self.supported_recording_levels = levels.into_iter().collect();
        self
    }

    /// Validate the policy
    ///
    /// # Errors
    ///
    /// Returns error on a blank tenant or policy version
    pub fn validate(&self) -> ValidationResult {
        const SCHEMA: &str = "replay_access_policy";
        if self.tenant_id.trim().is_empty() {
            return Err(ValidationError::missing(SCHEMA, "tenant_id"));
        }
        if self.policy_version.trim().is_empty() {
            return Err(ValidationError::missing(SCHEMA, "policy_version"));
        }
        Ok(())
    }
}

/// Decide a replay access request against `policy`.
///
/// Requests without classes are treated as metadata-only. On success each
/// distinct requested class gets one marker, in request order.
#[must_use]
pub fn authorize_replay_access(
    request: &ReplayAccessRequest,
    policy: &ReplayAccessPolicy,
) -> ReplayAccessDecision {
    match evaluate(request, policy) {
        Ok(markers) => ReplayAccessDecision::allow(markers),
        Err(reason) => reason.into(),
    }
}

fn evaluate(
    request: &ReplayAccessRequest,
    policy: &ReplayAccessPolicy,
) -> Result<Vec<ReplayRedactionMarker>, DenyReason> {
    request.validate().map_err(|_| DenyReason::InvalidRequest)?;

    let tenant = request.tenant_id.trim();
    if tenant.is_empty() || policy.tenant_id.trim().is_empty() {
        return Err(DenyReason::TenantScopeMissing);
    }
    if tenant != policy.tenant_id.trim() {
        return Err(DenyReason::CrossTenantDenied);
    }
    policy.validate().map_err(|_| DenyReason::PolicyInvalid)?;
    if !policy.allowed_roles.contains(&request.role) {
        return Err(DenyReason::RoleNotAllowed);
    }
    if !policy.allowed_purposes.contains(&request.purpose) {
        return Err(DenyReason::PurposeNotAllowed);
    }
    if !policy.allowed_fidelities.contains(&request.requested_fidelity) {
        return Err(DenyReason::FidelityNotAllowed);
    }
    let level = request.requested_fidelity;
    if !policy.supported_recording_levels.contains(&level) {
        return Err(DenyReason::RecordingLevelUnsupported);
    }

    let requested: &[PayloadClass] = if request.requested_classes.is_empty() {
        &[PayloadClass::Metadata]
    } else {
        &request.requested_classes
    };

    let mut seen = BTreeSet::new();
    let mut markers = Vec::with_capacity(requested.len());
    for &class in requested {
        if !seen.insert(class) {
            continue;
        }
        let action = default_redaction_action(level, class).ok_or(DenyReason::RedactionUnresolved)?;
        markers.push(ReplayRedactionMarker {
            payload_class: class,
            action,
            reason: policy.policy_version.clone(),
        });
    }
    Ok(markers)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use proptest::prelude::*;
    use rspp_core::RedactionAction;

    pub(crate) fn access_request() -> ReplayAccessRequest {
        ReplayAccessRequest {
            tenant_id: "tenant-a".to_string(),
            principal_id: "alice".to_string(),
            role: "oncall".to_string(),
            purpose: "incident_review".to_string(),
            requested_scope: "turn:turn-1".to_string(),
            requested_fidelity: ReplayFidelity::L1,
            requested_classes: Vec::new(),
        }
    }

    pub(crate) fn policy() -> ReplayAccessPolicy {
        ReplayAccessPolicy::new("tenant-a")
            .with_role("oncall")
            .with_purpose("incident_review")
            .with_fidelity(ReplayFidelity::L0)
            .with_fidelity(ReplayFidelity::L1)
    }

    fn deny_reason(request: &ReplayAccessRequest, policy: &ReplayAccessPolicy) -> String {
        let decision = authorize_replay_access(request, policy);
        assert!(!decision.allowed);
        assert!(decision.validate().is_ok());
        decision.deny_reason
    }

    #[test]
    fn test_default_metadata_only() {
        let decision = authorize_replay_access(&access_request(), &policy());
        assert!(decision.allowed);
        assert!(decision.deny_reason.is_empty());
        assert_eq!(
            decision.redaction_markers,
            vec![ReplayRedactionMarker {
                payload_class: PayloadClass::Metadata,
                action: RedactionAction::Allow,
                reason: REPLAY_ACCESS_POLICY_VERSION.to_string(),
            }]
        );
    }

    #[test]
    fn test_missing_principal_denied() {
        let mut req = access_request();
        req.principal_id.clear();
        assert_eq!(deny_reason(&req, &policy()), "invalid_request");
    }

    #[test]
    fn test_tenant_checks() {
        let mut req = access_request();
        req.tenant_id = "  ".to_string();
        assert_eq!(deny_reason(&req, &policy()), "tenant_scope_missing");

        let mut req = access_request();
        req.tenant_id = "tenant-b".to_string();
        assert_eq!(deny_reason(&req, &policy()), "cross_tenant_denied");

        assert_eq!(
            deny_reason(&access_request(), &ReplayAccessPolicy::default()),
            "tenant_scope_missing"
        );
    }

    #[test]
    fn test_allow_lists() {
        let mut req = access_request();
        req.role = "intern".to_string();
        assert_eq!(deny_reason(&req, &policy()), "role_not_allowed");

        let mut req = access_request();
        req.purpose = "marketing".to_string();
        assert_eq!(deny_reason(&req, &policy()), "purpose_not_allowed");

        let mut req = access_request();
        req.requested_fidelity = ReplayFidelity::L2;
        assert_eq!(deny_reason(&req, &policy()), "fidelity_not_allowed");
    }

    #[test]
    fn test_first_failure_wins() {
        let mut req = access_request();
        req.tenant_id = "tenant-b".to_string();
        req.role = "intern".to_string();
        req.purpose = "marketing".to_string();
        assert_eq!(deny_reason(&req, &policy()), "cross_tenant_denied");
    }

    #[test]
    fn test_recording_level_unsupported() {
        let policy = policy().with_recording_levels([ReplayFidelity::L0]);
        assert_eq!(
            deny_reason(&access_request(), &policy),
            "recording_level_unsupported"
        );
    }

    #[test]
    fn test_redaction_unresolved() {
        let mut req = access_request();
        req.requested_fidelity = ReplayFidelity::L0;
        req.requested_classes = vec![PayloadClass::Metadata, PayloadClass::AudioRaw];
        assert_eq!(deny_reason(&req, &policy()), "redaction_unresolved");
    }

    #[test]
    fn test_one_marker_per_class() {
        let mut req = access_request();
        req.requested_classes = vec![
            PayloadClass::TextRaw,
            PayloadClass::Pii,
            PayloadClass::TextRaw,
        ];
        let decision = authorize_replay_access(&req, &policy());
        assert!(decision.allowed);
        let classes: Vec<_> = decision
            .redaction_markers
            .iter()
            .map(|m| m.payload_class)
            .collect();
        assert_eq!(classes, vec![PayloadClass::TextRaw, PayloadClass::Pii]);
        assert!(decision.validate().is_ok());
    }

    #[test]
    fn test_policy_from_json_defaults() {
        let policy: ReplayAccessPolicy =
            serde_json::from_str(r#"{"tenant_id":"tenant-a","allowed_roles":["oncall"]}"#)
                .unwrap();
        assert_eq!(policy.policy_version, REPLAY_ACCESS_POLICY_VERSION);
        assert_eq!(policy.supported_recording_levels.len(), 3);
        assert_eq!(
            deny_reason(&access_request(), &policy),
            "purpose_not_allowed"
        );
    }

    #[test]
    fn test_blank_policy_version_denied() {
        let policy: ReplayAccessPolicy = serde_json::from_str(
            r#"{"tenant_id":"tenant-a","allowed_roles":["oncall"],
                "allowed_purposes":["incident_review"],"allowed_fidelities":["L1"],
                "policy_version":""}"#,
        )
        .unwrap();
        assert!(policy.validate().is_err());
        assert_eq!(deny_reason(&access_request(), &policy), "policy_invalid");
    }

    #[test]
    fn test_policy_validate() {
        assert!(policy().validate().is_ok());
        assert!(ReplayAccessPolicy::default().validate().is_err());
    }

    proptest! {
        #[test]
        fn prop_decision_always_valid(
            tenant in prop::sample::select(vec!["tenant-a", "tenant-b", ""]),
            role in prop::sample::select(vec!["oncall", "intern"]),
            principal in prop::sample::select(vec!["alice", ""]),
            fidelity in 0usize..3,
            classes in proptest::collection::vec(0usize..6, 0..4),
        ) {
            let req = ReplayAccessRequest {
                tenant_id: tenant.to_string(),
                principal_id: principal.to_string(),
                role: role.to_string(),
                purpose: "incident_review".to_string(),
                requested_scope: "turn:turn-1".to_string(),
                requested_fidelity: [ReplayFidelity::L0, ReplayFidelity::L1, ReplayFidelity::L2][fidelity],
                requested_classes: classes.into_iter().map(|i| PayloadClass::ALL[i]).collect(),
            };
            let decision = authorize_replay_access(&req, &policy());
            prop_assert!(decision.validate().is_ok());
            prop_assert_eq!(decision.allowed, decision.deny_reason.is_empty());
        }
    }
}
