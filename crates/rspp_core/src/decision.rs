//! Control-plane decision outcomes consumed as replay evidence.
//!
//! `DecisionOutcome` records are produced by the turn arbiter outside this
//! workspace. They are compared field by field during replay.

use crate::error::{ValidationError, ValidationResult, require, require_non_negative};
use serde::{Deserialize, Serialize};

/// What the arbiter decided
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeKind {
    /// Work admitted
    Admit,
    /// Work rejected
    Reject,
    /// Work deferred to a later scheduling point
    Defer,
    /// Work shed under load
    Shed,
    /// Rejected because the authority epoch was stale
    StaleEpochReject,
    /// Drained after the placement lost authority
    DeauthorizedDrain,
}

/// Lifecycle phase the decision was taken in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomePhase {
    /// Before the turn opened
    PreTurn,
    /// At a scheduler dispatch point
    SchedulingPoint,
    /// While the turn was active
    ActiveTurn,
    /// After the turn closed
    PostTurn,
}

/// Unit of work the decision applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeScope {
    /// Whole session
    Session,
    /// Single turn
    Turn,
    /// Edge enqueue
    EdgeEnqueue,
    /// Edge dequeue
    EdgeDequeue,
    /// Node dispatch
    NodeDispatch,
}

/// One arbiter decision
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecisionOutcome {
    /// Decision kind
    pub outcome_kind: OutcomeKind,
    /// Phase
    pub phase: OutcomePhase,
    /// Scope
    pub scope: OutcomeScope,
    /// Session identity
    pub session_id: String,
    /// Turn identity, required for turn scope
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub turn_id: Option<String>,
    /// Event identity
    pub event_id: String,
    /// Runtime (monotonic) timestamp
    pub runtime_timestamp_ms: i64,
    /// Wall clock timestamp
    pub wall_clock_timestamp_ms: i64,
    /// Component that emitted the decision
    pub emitted_by: String,
    /// Machine-readable reason
    pub reason: String,
    /// Authority epoch observed when deciding
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authority_epoch: Option<i64>,
}

impl DecisionOutcome {
    /// Validate required identity and timing fields
    ///
    /// # Errors
    ///
    /// Returns error on empty identities, negative timestamps, or a
    /// turn-scoped decision without a turn id
    pub fn validate(&self) -> ValidationResult {
        const SCHEMA: &str = "decision_outcome";
        require(SCHEMA, "session_id", &self.session_id)?;
        require(SCHEMA, "event_id", &self.event_id)?;
        require(SCHEMA, "emitted_by", &self.emitted_by)?;
        require(SCHEMA, "reason", &self.reason)?;
        require_non_negative(SCHEMA, "runtime_timestamp_ms", self.runtime_timestamp_ms)?;
        require_non_negative(SCHEMA, "wall_clock_timestamp_ms", self.wall_clock_timestamp_ms)?;
        if self.scope == OutcomeScope::Turn
            && self.turn_id.as_deref().is_none_or(|t| t.trim().is_empty())
        {
            return Err(ValidationError::missing(SCHEMA, "turn_id"));
        }
        if let Some(epoch) = self.authority_epoch {
            require_non_negative(SCHEMA, "authority_epoch", epoch)?;
        }
        Ok(())
    }

    /// Divergence scope: `turn:<id>` when a turn is known, else `session:<id>`
    #[must_use]
    pub fn divergence_scope(&self) -> String {
        crate::divergence::divergence_scope(&self.session_id, self.turn_id.as_deref())
    }

    /// Names of the fields that differ from `other`, in a fixed order.
    ///
    /// Absent-vs-absent authority epochs are equal; absent-vs-present are not.
    #[must_use]
    pub fn mismatched_fields(&self, other: &Self) -> Vec<&'static str> {
        let mut fields = Vec::new();
        if self.outcome_kind != other.outcome_kind {
            fields.push("outcome_kind");
        }
        if self.phase != other.phase {
            fields.push("phase");
        }
        if self.scope != other.scope {
            fields.push("scope");
        }
        if self.session_id != other.session_id {
            fields.push("session_id");
        }
        if self.turn_id != other.turn_id {
            fields.push("turn_id");
        }
        if self.event_id != other.event_id {
            fields.push("event_id");
        }
        if self.runtime_timestamp_ms != other.runtime_timestamp_ms {
            fields.push("runtime_timestamp_ms");
        }
        if self.wall_clock_timestamp_ms != other.wall_clock_timestamp_ms {
            fields.push("wall_clock_timestamp_ms");
        }
        if self.emitted_by != other.emitted_by {
            fields.push("emitted_by");
        }
        if self.reason != other.reason {
            fields.push("reason");
        }
        if self.authority_epoch != other.authority_epoch {
            fields.push("authority_epoch");
        }
        fields
    }
}
