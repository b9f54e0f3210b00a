//! Replay run request, result, and report.

use crate::cursor::ReplayCursor;
use crate::divergence::ReplayDivergence;
use crate::error::{ValidationError, ValidationResult, require, require_non_negative};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How the candidate side of a replay was produced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplayMode {
    /// Nodes re-simulated against recorded inputs
    ReSimulateNodes,
    /// Recorded provider outputs played back
    PlaybackRecordedProviderOutputs,
    /// Recorded decisions replayed as-is
    ReplayDecisions,
    /// Decisions recomputed by the current arbiter
    RecomputeDecisions,
}

impl ReplayMode {
    /// All supported modes
    pub const ALL: [Self; 4] = [
        Self::ReSimulateNodes,
        Self::PlaybackRecordedProviderOutputs,
        Self::ReplayDecisions,
        Self::RecomputeDecisions,
    ];

    /// Wire name
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::ReSimulateNodes => "re_simulate_nodes",
            Self::PlaybackRecordedProviderOutputs => "playback_recorded_provider_outputs",
            Self::ReplayDecisions => "replay_decisions",
            Self::RecomputeDecisions => "recompute_decisions",
        }
    }
}

impl fmt::Display for ReplayMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReplayMode {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|mode| mode.as_str() == s)
            .ok_or_else(|| ValidationError::unknown_variant("replay mode", s))
    }
}

/// Request to compare a baseline trace against a candidate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplayRunRequest {
    /// Stable reference of the baseline bundle
    pub baseline_ref: String,
    /// Stable reference of the candidate bundle
    pub candidate_plan_ref: String,
    /// Replay mode
    pub mode: ReplayMode,
    /// Resume boundary
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cursor: Option<ReplayCursor>,
}

impl ReplayRunRequest {
    /// Validate references and the embedded cursor
    ///
    /// # Errors
    ///
    /// Returns error on missing refs or an invalid cursor
    pub fn validate(&self) -> ValidationResult {
        const SCHEMA: &str = "replay_run_request";
        require(SCHEMA, "baseline_ref", &self.baseline_ref)?;
        require(SCHEMA, "candidate_plan_ref", &self.candidate_plan_ref)?;
        if let Some(cursor) = &self.cursor {
            cursor.validate()?;
        }
        Ok(())
    }
}

/// Outcome of one replay run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplayRunResult {
    /// Run identity
    pub run_id: String,
    /// Mode actually executed
    pub mode: ReplayMode,
    /// Classified divergences, in emission order
    #[serde(default)]
    pub divergences: Vec<ReplayDivergence>,
    /// Ending cursor
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cursor: Option<ReplayCursor>,
}

impl ReplayRunResult {
    /// Validate run id, divergences, and cursor
    ///
    /// # Errors
    ///
    /// Returns the first invalid element
    pub fn validate(&self) -> ValidationResult {
        require("replay_run_result", "run_id", &self.run_id)?;
        for divergence in &self.divergences {
            divergence.validate()?;
        }
        if let Some(cursor) = &self.cursor {
            cursor.validate()?;
        }
        Ok(())
    }

    /// Whether the run found no divergence
    #[must_use]
    pub fn is_equivalent(&self) -> bool {
        self.divergences.is_empty()
    }
}

/// Request, result, and generation time bundled for tooling
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplayRunReport {
    /// Original request
    pub request: ReplayRunRequest,
    /// Run result
    pub result: ReplayRunResult,
    /// Generation time
    pub generated_at_ms: i64,
}

impl ReplayRunReport {
    /// Validate both halves and the mode invariant
    ///
    /// # Errors
    ///
    /// Returns error when request and result modes disagree
    pub fn validate(&self) -> ValidationResult {
        const SCHEMA: &str = "replay_run_report";
        self.request.validate()?;
        self.result.validate()?;
        require_non_negative(SCHEMA, "generated_at_ms", self.generated_at_ms)?;
        if self.request.mode != self.result.mode {
            return Err(ValidationError::invalid(
                SCHEMA,
                "mode",
                format!(
                    "request mode {} does not match result mode {}",
                    self.request.mode, self.result.mode
                ),
            ));
        }
        Ok(())
    }
}
