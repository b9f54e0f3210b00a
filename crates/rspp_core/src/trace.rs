//! Comparable trace evidence.
//!
//! A [`TraceArtifact`] is built per comparison and never persisted here.

use crate::cursor::Lane;
use crate::decision::DecisionOutcome;
use crate::error::{ValidationResult, require, require_non_negative};
use serde::{Deserialize, Serialize};

/// References to the control-plane snapshots a decision was taken against
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SnapshotProvenance {
    /// Routing view snapshot
    pub routing_view_snapshot: String,
    /// Admission policy snapshot
    pub admission_policy_snapshot: String,
    /// ABI compatibility snapshot
    pub abi_compatibility_snapshot: String,
    /// Version resolution snapshot
    pub version_resolution_snapshot: String,
    /// Policy resolution snapshot
    pub policy_resolution_snapshot: String,
    /// Provider health snapshot
    pub provider_health_snapshot: String,
}

impl SnapshotProvenance {
    /// Validate all snapshot references are present
    ///
    /// # Errors
    ///
    /// Returns error if any reference is empty
    pub fn validate(&self) -> ValidationResult {
        const SCHEMA: &str = "snapshot_provenance";
        require(SCHEMA, "routing_view_snapshot", &self.routing_view_snapshot)?;
        require(SCHEMA, "admission_policy_snapshot", &self.admission_policy_snapshot)?;
        require(SCHEMA, "abi_compatibility_snapshot", &self.abi_compatibility_snapshot)?;
        require(SCHEMA, "version_resolution_snapshot", &self.version_resolution_snapshot)?;
        require(SCHEMA, "policy_resolution_snapshot", &self.policy_resolution_snapshot)?;
        require(SCHEMA, "provider_health_snapshot", &self.provider_health_snapshot)
    }
}

/// Provider identity and model pair
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProviderInvocation {
    /// Provider identity
    pub provider_id: String,
    /// Model identity
    pub model_id: String,
}

/// One comparable evidence point
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceArtifact {
    /// Resolved plan hash
    pub plan_hash: String,
    /// Snapshot provenance
    pub snapshot_provenance: SnapshotProvenance,
    /// Decision produced
    pub decision: DecisionOutcome,
    /// Ordering marker; empty until normalized
    #[serde(default)]
    pub ordering_marker: String,
    /// Authority epoch
    pub authority_epoch: i64,
    /// Provider selected
    #[serde(default)]
    pub provider: ProviderInvocation,
    /// Runtime timestamp
    pub runtime_timestamp_ms: i64,
    /// Lane; defaulted during normalization
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lane: Option<Lane>,
}

impl TraceArtifact {
    /// Validate the artifact and its embedded decision
    ///
    /// # Errors
    ///
    /// Returns the first failing field
    pub fn validate(&self) -> ValidationResult {
        const SCHEMA: &str = "trace_artifact";
        require(SCHEMA, "plan_hash", &self.plan_hash)?;
        self.snapshot_provenance.validate()?;
        self.decision.validate()?;
        require_non_negative(SCHEMA, "authority_epoch", self.authority_epoch)?;
        require_non_negative(SCHEMA, "runtime_timestamp_ms", self.runtime_timestamp_ms)
    }

    /// Divergence scope derived from the decision identity
    #[must_use]
    pub fn divergence_scope(&self) -> String {
        self.decision.divergence_scope()
    }
}

/// Drop/merge lineage for one upstream event
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LineageRecord {
    /// Upstream event identity
    pub event_id: String,
    /// Session identity
    pub session_id: String,
    /// Turn identity
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub turn_id: Option<String>,
    /// Whether the event was dropped
    #[serde(default)]
    pub dropped: bool,
    /// Coalescing group the event was merged into
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub merge_group_id: Option<String>,
}

impl LineageRecord {
    /// Validate identities
    ///
    /// # Errors
    ///
    /// Returns error on empty identities
    pub fn validate(&self) -> ValidationResult {
        const SCHEMA: &str = "lineage_record";
        require(SCHEMA, "event_id", &self.event_id)?;
        require(SCHEMA, "session_id", &self.session_id)?;
        if let Some(group) = &self.merge_group_id {
            require(SCHEMA, "merge_group_id", group)?;
        }
        Ok(())
    }

    /// Divergence scope
    #[must_use]
    pub fn divergence_scope(&self) -> String {
        crate::divergence::divergence_scope(&self.session_id, self.turn_id.as_deref())
    }
}
