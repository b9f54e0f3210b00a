//! Replay engine.
//!
//! Resolves both sides of a run, normalizes them, applies the resume cursor,
//! and dispatches to the comparator selected by the replay mode.

use crate::compare::{
    CompareConfig, compare_decision_outcomes, compare_lineage_records, compare_trace_artifacts,
};
use crate::normalize::{NormalizedArtifact, normalize_trace, position_of};
use crate::resolver::{ReplayArtifactBundle, ReplayArtifactResolver, ResolveError};
use rspp_core::{
    Clock, DecisionOutcome, DivergenceClass, Lane, ReplayCursor, ReplayDivergence, ReplayMode,
    ReplayRunReport, ReplayRunRequest, ReplayRunResult, SystemClock, TraceArtifact,
    ValidationError, divergence_scope,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Replay engine configuration
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Comparator settings
    pub compare: CompareConfig,
    /// Lane assumed for artifacts that record none
    pub default_lane: Lane,
}

/// Produces run identities
pub type RunIdGenerator = Arc<dyn Fn() -> String + Send + Sync>;

/// Run id generator backed by random UUIDs
#[must_use]
pub fn uuid_run_id_generator() -> RunIdGenerator {
    Arc::new(|| format!("replay-{}", uuid::Uuid::new_v4()))
}

/// Which side of the comparison
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraceSide {
    /// Recorded reference run
    Baseline,
    /// Run under evaluation
    Candidate,
}

impl fmt::Display for TraceSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Baseline => "baseline",
            Self::Candidate => "candidate",
        })
    }
}

/// Replay engine error
#[derive(Debug, Error)]
pub enum ReplayError {
    /// Request failed validation
    #[error("invalid replay request: {0}")]
    InvalidRequest(#[source] ValidationError),
    /// Artifacts could not be resolved
    #[error("failed to resolve {side} artifacts: {source}")]
    Resolution {
        /// Side that failed
        side: TraceSide,
        /// Underlying error
        #[source]
        source: ResolveError,
    },
    /// Resolved artifacts failed validation
    #[error("{side} artifacts {reference:?} are invalid: {source}")]
    InvalidArtifacts {
        /// Side that failed
        side: TraceSide,
        /// Requested reference
        reference: String,
        /// Underlying error
        #[source]
        source: ValidationError,
    },
    /// Resume cursor does not match any baseline artifact
    #[error("resume cursor {cursor} not found in baseline trace")]
    CursorNotFound {
        /// Requested cursor
        cursor: ReplayCursor,
    },
    /// Produced result failed validation
    #[error("replay result failed validation: {0}")]
    InvalidResult(#[source] ValidationError),
}

/// Deterministic replay engine
pub struct ReplayEngine {
    resolver: Arc<dyn ReplayArtifactResolver>,
    config: EngineConfig,
    run_id_generator: Option<RunIdGenerator>,
    clock: Arc<dyn Clock>,
}

impl fmt::Debug for ReplayEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReplayEngine")
            .field("config", &self.config)
            .field("custom_run_ids", &self.run_id_generator.is_some())
            .finish_non_exhaustive()
    }
}

impl ReplayEngine {
    /// Create an engine with default configuration
    #[must_use]
    pub fn new(resolver: Arc<dyn ReplayArtifactResolver>) -> Self {
        Self {
            resolver,
            config: EngineConfig::default(),
            run_id_generator: None,
            clock: Arc::new(SystemClock),
        }
    }

    /// Replace the configuration
    #[must_use]
    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Use a custom run id generator
    #[must_use]
    pub fn with_run_id_generator(mut self, generator: RunIdGenerator) -> Self {
        self.run_id_generator = Some(generator);
        self
    }

    /// Use a custom clock
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Current configuration
    #[must_use]
    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Execute one replay run.
    ///
    /// With a cursor, comparison restarts at the matching baseline artifact,
    /// inclusive. A candidate without a matching artifact resumes at the same
    /// position and the run records one `ORDERING` divergence for it.
    ///
    /// # Errors
    ///
    /// Returns error on an invalid request, a resolution failure, invalid
    /// artifacts, a cursor absent from the baseline, or an invalid result
    pub fn run(&self, request: &ReplayRunRequest) -> Result<ReplayRunResult, ReplayError> {
        request.validate().map_err(ReplayError::InvalidRequest)?;
        debug!(
            mode = %request.mode,
            baseline = %request.baseline_ref,
            candidate = %request.candidate_plan_ref,
            resume = request.cursor.is_some(),
            "starting replay run"
        );

        let baseline = self.resolve(TraceSide::Baseline, &request.baseline_ref)?;
        let candidate = self.resolve(TraceSide::Candidate, &request.candidate_plan_ref)?;

        let baseline_trace = normalize_trace(&baseline.artifacts, self.config.default_lane);
        let candidate_trace = normalize_trace(&candidate.artifacts, self.config.default_lane);

        let mut divergences = Vec::new();
        let (baseline_start, candidate_start) = match &request.cursor {
            None => (0, 0),
            Some(cursor) => {
                let Some(baseline_index) = position_of(&baseline_trace, cursor) else {
                    warn!(%cursor, "resume cursor not found in baseline trace");
                    return Err(ReplayError::CursorNotFound {
                        cursor: cursor.clone(),
                    });
                };
                let candidate_index = match position_of(&candidate_trace, cursor) {
                    Some(index) => index,
                    None => {
                        divergences.push(resume_boundary_divergence(
                            cursor,
                            baseline_index,
                            candidate_trace.len(),
                        ));
                        baseline_index.min(candidate_trace.len())
                    }
                };
                (baseline_index, candidate_index)
            }
        };

        let baseline_window = &baseline_trace[baseline_start..];
        let candidate_window = &candidate_trace[candidate_start..];

        divergences.extend(self.compare(request.mode, baseline_window, candidate_window));
        if !baseline.lineage.is_empty() || !candidate.lineage.is_empty() {
            divergences.extend(compare_lineage_records(&baseline.lineage, &candidate.lineage));
        }

        let cursor = baseline_window
            .last()
            .map(NormalizedArtifact::cursor)
            .or_else(|| request.cursor.clone());

        let result = ReplayRunResult {
            run_id: self.next_run_id(),
            mode: request.mode,
            divergences,
            cursor,
        };
        result.validate().map_err(ReplayError::InvalidResult)?;

        info!(
            run_id = %result.run_id,
            mode = %result.mode,
            divergences = result.divergences.len(),
            compared = baseline_window.len(),
            "replay run complete"
        );
        Ok(result)
    }

    /// Execute a run and bundle it with its request and generation time
    ///
    /// # Errors
    ///
    /// Returns any [`Self::run`] error, or an invalid report
    pub fn run_report(&self, request: &ReplayRunRequest) -> Result<ReplayRunReport, ReplayError> {
        let result = self.run(request)?;
        let report = ReplayRunReport {
            request: request.clone(),
            result,
            generated_at_ms: self.clock.now_ms(),
        };
        report.validate().map_err(ReplayError::InvalidResult)?;
        Ok(report)
    }

    fn resolve(&self, side: TraceSide, reference: &str) -> Result<ReplayArtifactBundle, ReplayError> {
        let bundle = self
            .resolver
            .resolve(reference)
            .map_err(|source| ReplayError::Resolution { side, source })?;
        bundle
            .validate()
            .map_err(|source| ReplayError::InvalidArtifacts {
                side,
                reference: reference.to_string(),
                source,
            })?;
        debug!(%side, reference, artifacts = bundle.artifacts.len(), "resolved replay artifacts");
        Ok(bundle)
    }

    fn compare(
        &self,
        mode: ReplayMode,
        baseline: &[NormalizedArtifact],
        candidate: &[NormalizedArtifact],
    ) -> Vec<ReplayDivergence> {
        match mode {
            ReplayMode::ReplayDecisions => {
                let baseline: Vec<DecisionOutcome> =
                    baseline.iter().map(|n| n.artifact.decision.clone()).collect();
                let candidate: Vec<DecisionOutcome> =
                    candidate.iter().map(|n| n.artifact.decision.clone()).collect();
                compare_decision_outcomes(&baseline, &candidate)
            }
            ReplayMode::ReSimulateNodes
            | ReplayMode::PlaybackRecordedProviderOutputs
            | ReplayMode::RecomputeDecisions => {
                let baseline: Vec<TraceArtifact> =
                    baseline.iter().map(|n| n.artifact.clone()).collect();
                let candidate: Vec<TraceArtifact> =
                    candidate.iter().map(|n| n.artifact.clone()).collect();
                compare_trace_artifacts(&baseline, &candidate, &self.config.compare)
            }
        }
    }

    fn next_run_id(&self) -> String {
        match &self.run_id_generator {
            Some(generator) => generator(),
            None => format!("replay-{}", self.clock.now_ms()),
        }
    }
}

fn resume_boundary_divergence(
    cursor: &ReplayCursor,
    baseline_index: usize,
    candidate_len: usize,
) -> ReplayDivergence {
    let message = if baseline_index < candidate_len {
        format!(
            "candidate trace has no artifact at resume cursor {cursor}; resuming candidate at position {baseline_index}"
        )
    } else {
        format!(
            "candidate trace has no artifact at resume cursor {cursor}; candidate exhausted after {candidate_len} artifacts"
        )
    };
    ReplayDivergence::new(
        DivergenceClass::Ordering,
        divergence_scope(&cursor.session_id, cursor.turn_id.as_deref()),
        message,
    )
}
