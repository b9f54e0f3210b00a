//! Retention policy, artifact ledger records, and deletion schemas.

use crate::error::{ValidationError, ValidationResult, require, require_non_negative};
use crate::payload::PayloadClass;
use crate::time::{DAY_MS, HOUR_MS};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Per-tenant retention windows
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetentionPolicy {
    /// Tenant the policy applies to
    pub tenant_id: String,
    /// Window for classes without an explicit entry
    pub default_retention_ms: i64,
    /// Ceiling for PII windows
    pub pii_max_retention_ms: i64,
    /// Ceiling for PHI windows
    pub phi_max_retention_ms: i64,
    /// Class-specific windows
    #[serde(default)]
    pub class_retention_ms: IndexMap<PayloadClass, i64>,
}

impl RetentionPolicy {
    /// Conservative built-in policy used when no resolver tier answers
    #[must_use]
    pub fn conservative(tenant_id: impl Into<String>) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            default_retention_ms: 7 * DAY_MS,
            pii_max_retention_ms: 24 * HOUR_MS,
            phi_max_retention_ms: 24 * HOUR_MS,
            class_retention_ms: IndexMap::from([
                (PayloadClass::AudioRaw, 24 * HOUR_MS),
                (PayloadClass::Pii, 24 * HOUR_MS),
                (PayloadClass::Phi, 24 * HOUR_MS),
            ]),
        }
    }

    /// Validate windows and ceilings
    ///
    /// # Errors
    ///
    /// Returns error on a missing tenant, non-positive windows, or a PII/PHI
    /// class window above its ceiling
    pub fn validate(&self) -> ValidationResult {
        const SCHEMA: &str = "retention_policy";
        require(SCHEMA, "tenant_id", &self.tenant_id)?;
        require_positive(SCHEMA, "default_retention_ms", self.default_retention_ms)?;
        require_positive(SCHEMA, "pii_max_retention_ms", self.pii_max_retention_ms)?;
        require_positive(SCHEMA, "phi_max_retention_ms", self.phi_max_retention_ms)?;
        for (class, window) in &self.class_retention_ms {
            require_positive(SCHEMA, "class_retention_ms", *window)?;
            let ceiling = match class {
                PayloadClass::Pii => Some(self.pii_max_retention_ms),
                PayloadClass::Phi => Some(self.phi_max_retention_ms),
                _ => None,
            };
            if let Some(ceiling) = ceiling.filter(|ceiling| *window > *ceiling) {
                return Err(ValidationError::invalid(
                    SCHEMA,
                    "class_retention_ms",
                    format!("{class} window {window} exceeds ceiling {ceiling}"),
                ));
            }
        }
        Ok(())
    }

    /// Effective window for a payload class.
    ///
    /// Falls back to the default window; PII and PHI never exceed their
    /// ceilings even when they fall back.
    #[must_use]
    pub fn window_for(&self, class: PayloadClass) -> i64 {
        let window = self
            .class_retention_ms
            .get(&class)
            .copied()
            .unwrap_or(self.default_retention_ms);
        match class {
            PayloadClass::Pii => window.min(self.pii_max_retention_ms),
            PayloadClass::Phi => window.min(self.phi_max_retention_ms),
            _ => window,
        }
    }
}

fn require_positive(schema: &'static str, field: &'static str, value: i64) -> ValidationResult {
    if value <= 0 {
        return Err(ValidationError::invalid(
            schema,
            field,
            format!("must be > 0, got {value}"),
        ));
    }
    Ok(())
}

/// Readability of a stored artifact
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactState {
    /// Readable
    #[default]
    Active,
    /// Tombstoned; retained for structure, never readable again
    CryptographicallyInaccessible,
}

impl fmt::Display for ArtifactState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Active => "active",
            Self::CryptographicallyInaccessible => "cryptographically_inaccessible",
        })
    }
}

/// One stored replay artifact
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReplayArtifactRecord {
    /// Artifact identity
    pub artifact_id: String,
    /// Owning tenant
    pub tenant_id: String,
    /// Session identity
    pub session_id: String,
    /// Turn identity
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub turn_id: Option<String>,
    /// Payload class
    pub payload_class: PayloadClass,
    /// Recording time
    pub recorded_at_ms: i64,
    /// Accessibility state
    #[serde(default)]
    pub state: ArtifactState,
}

impl ReplayArtifactRecord {
    /// Validate identities and recording time
    ///
    /// # Errors
    ///
    /// Returns the first invalid field
    pub fn validate(&self) -> ValidationResult {
        const SCHEMA: &str = "replay_artifact_record";
        require(SCHEMA, "artifact_id", &self.artifact_id)?;
        require(SCHEMA, "tenant_id", &self.tenant_id)?;
        require(SCHEMA, "session_id", &self.session_id)?;
        if let Some(turn_id) = &self.turn_id {
            require(SCHEMA, "turn_id", turn_id)?;
        }
        require_non_negative(SCHEMA, "recorded_at_ms", self.recorded_at_ms)
    }
}

/// Deletion target: exactly one of session or turn within one tenant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeletionScope {
    /// Tenant
    pub tenant_id: String,
    /// Session selector
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    /// Turn selector
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub turn_id: Option<String>,
}

impl DeletionScope {
    /// Select every artifact of a session
    #[must_use]
    pub fn session(tenant_id: impl Into<String>, session_id: impl Into<String>) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            session_id: Some(session_id.into()),
            turn_id: None,
        }
    }

    /// Select every artifact of a turn
    #[must_use]
    pub fn turn(tenant_id: impl Into<String>, turn_id: impl Into<String>) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            session_id: None,
            turn_id: Some(turn_id.into()),
        }
    }

    /// Validate the exactly-one selector rule
    ///
    /// # Errors
    ///
    /// Returns error when both or neither selector is set
    pub fn validate(&self) -> ValidationResult {
        const SCHEMA: &str = "deletion_scope";
        require(SCHEMA, "tenant_id", &self.tenant_id)?;
        match self.selectors() {
            (Some(_), None) | (None, Some(_)) => Ok(()),
            (Some(_), Some(_)) => Err(ValidationError::invalid(
                SCHEMA,
                "selector",
                "specify exactly one of session_id or turn_id, not both",
            )),
            (None, None) => Err(ValidationError::invalid(
                SCHEMA,
                "selector",
                "specify exactly one of session_id or turn_id",
            )),
        }
    }

    /// Whether a record falls inside this scope
    #[must_use]
    pub fn matches(&self, record: &ReplayArtifactRecord) -> bool {
        if record.tenant_id != self.tenant_id {
            return false;
        }
        match self.selectors() {
            (Some(session_id), None) => record.session_id == session_id,
            (None, Some(turn_id)) => record.turn_id.as_deref() == Some(turn_id),
            _ => false,
        }
    }

    fn selectors(&self) -> (Option<&str>, Option<&str>) {
        let session = self.session_id.as_deref().filter(|s| !s.trim().is_empty());
        let turn = self.turn_id.as_deref().filter(|t| !t.trim().is_empty());
        (session, turn)
    }
}

/// How matching artifacts are removed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeletionMode {
    /// Remove permanently
    HardDelete,
    /// Tombstone as cryptographically inaccessible
    CryptoInaccessible,
}

impl fmt::Display for DeletionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::HardDelete => "hard_delete",
            Self::CryptoInaccessible => "crypto_inaccessible",
        })
    }
}

/// Tenant-scoped deletion request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeletionRequest {
    /// Target scope
    pub scope: DeletionScope,
    /// Deletion mode
    pub mode: DeletionMode,
    /// Requester identity
    pub requested_by: String,
    /// Request time
    pub requested_at_ms: i64,
}

impl DeletionRequest {
    /// Validate scope, requester, and time
    ///
    /// # Errors
    ///
    /// Returns the first invalid field
    pub fn validate(&self) -> ValidationResult {
        const SCHEMA: &str = "deletion_request";
        self.scope.validate()?;
        require(SCHEMA, "requested_by", &self.requested_by)?;
        require_non_negative(SCHEMA, "requested_at_ms", self.requested_at_ms)
    }
}

/// Outcome of a deletion request
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeletionResult {
    /// Mode applied
    pub mode: Option<DeletionMode>,
    /// Records inside the scope
    pub matched_count: usize,
    /// Records permanently removed
    pub deleted_count: usize,
    /// Records newly tombstoned
    pub inaccessible_count: usize,
}

/// Counts from one retention sweep
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetentionSweepResult {
    /// Tenant swept
    pub tenant_id: String,
    /// Active artifacts evaluated
    pub evaluated_count: usize,
    /// Artifacts past their window
    pub expired_count: usize,
    /// Artifacts removed
    pub deleted_count: usize,
}

/// Sweep counts plus deletions bucketed by payload class
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetentionSweepReport {
    /// Sweep counts
    pub result: RetentionSweepResult,
    /// Deleted counts per payload class
    pub deleted_by_class: BTreeMap<PayloadClass, usize>,
}
