//! Deterministic resume boundaries inside ordered replay traces.

use crate::error::{ValidationError, ValidationResult, require, require_non_negative};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Prefix of ordering markers that carry a runtime sequence
pub const RUNTIME_SEQUENCE_MARKER_PREFIX: &str = "runtime_sequence:";

/// Dispatch lane evidence was recorded on
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Lane {
    /// Media data lane
    Data,
    /// Control lane
    #[default]
    Control,
    /// Telemetry lane
    Telemetry,
}

impl Lane {
    /// Wire name
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Data => "data",
            Self::Control => "control",
            Self::Telemetry => "telemetry",
        }
    }
}

impl fmt::Display for Lane {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Lane {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "data" => Ok(Self::Data),
            "control" => Ok(Self::Control),
            "telemetry" => Ok(Self::Telemetry),
            other => Err(ValidationError::unknown_variant("lane", other)),
        }
    }
}

/// Exact position inside an ordered trace; the unit of idempotent resumption
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReplayCursor {
    /// Session identity
    pub session_id: String,
    /// Turn identity, absent for session-scoped evidence
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub turn_id: Option<String>,
    /// Lane
    pub lane: Lane,
    /// Monotonically assigned runtime sequence
    pub runtime_sequence: i64,
    /// Event identity
    pub event_id: String,
}

impl ReplayCursor {
    /// Validate cursor fields
    ///
    /// # Errors
    ///
    /// Returns error on empty session/event ids, a blank turn id, or a
    /// negative runtime sequence
    pub fn validate(&self) -> ValidationResult {
        const SCHEMA: &str = "replay_cursor";
        require(SCHEMA, "session_id", &self.session_id)?;
        require(SCHEMA, "event_id", &self.event_id)?;
        if let Some(turn_id) = &self.turn_id {
            require(SCHEMA, "turn_id", turn_id)?;
        }
        require_non_negative(SCHEMA, "runtime_sequence", self.runtime_sequence)
    }
}

impl fmt::Display for ReplayCursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}@{}#{}",
            self.session_id,
            self.turn_id.as_deref().unwrap_or("-"),
            self.lane,
            self.runtime_sequence,
            self.event_id
        )
    }
}

/// Ordering marker for a runtime sequence
#[must_use]
pub fn runtime_sequence_marker(sequence: i64) -> String {
    format!("{RUNTIME_SEQUENCE_MARKER_PREFIX}{sequence}")
}

/// Parse `runtime_sequence:<n>` markers; anything else yields `None`
#[must_use]
pub fn parse_runtime_sequence_marker(marker: &str) -> Option<i64> {
    marker
        .strip_prefix(RUNTIME_SEQUENCE_MARKER_PREFIX)
        .and_then(|n| n.trim().parse::<i64>().ok())
        .filter(|n| *n >= 0)
}
