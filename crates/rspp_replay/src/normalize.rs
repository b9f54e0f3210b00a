//! Trace normalization ahead of comparison.
//!
//! Each artifact gets a lane and a runtime sequence so that cursors can be
//! matched. Sequences come from `runtime_sequence:<n>` ordering markers and
//! fall back to the positional index.

use rspp_core::{
    Lane, ReplayCursor, TraceArtifact, parse_runtime_sequence_marker, runtime_sequence_marker,
};

/// Trace artifact with its resolved lane and runtime sequence
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedArtifact {
    /// Artifact with lane and ordering marker filled in
    pub artifact: TraceArtifact,
    /// Resolved lane
    pub lane: Lane,
    /// Resolved runtime sequence
    pub runtime_sequence: i64,
}

impl NormalizedArtifact {
    /// Cursor pointing at this artifact
    #[must_use]
    pub fn cursor(&self) -> ReplayCursor {
        let decision = &self.artifact.decision;
        ReplayCursor {
            session_id: decision.session_id.clone(),
            turn_id: decision.turn_id.clone(),
            lane: self.lane,
            runtime_sequence: self.runtime_sequence,
            event_id: decision.event_id.clone(),
        }
    }

    /// Whether all five cursor components match this artifact
    #[must_use]
    pub fn matches(&self, cursor: &ReplayCursor) -> bool {
        let decision = &self.artifact.decision;
        decision.session_id == cursor.session_id
            && decision.turn_id == cursor.turn_id
            && self.lane == cursor.lane
            && self.runtime_sequence == cursor.runtime_sequence
            && decision.event_id == cursor.event_id
    }
}

/// Normalize a trace in order.
///
/// Missing lanes take `default_lane`. Empty ordering markers are filled with
/// the positional sequence marker.
#[must_use]
pub fn normalize_trace(artifacts: &[TraceArtifact], default_lane: Lane) -> Vec<NormalizedArtifact> {
    artifacts
        .iter()
        .enumerate()
        .map(|(index, artifact)| {
            let position = i64::try_from(index).unwrap_or(i64::MAX);
            let mut artifact = artifact.clone();
            let lane = *artifact.lane.get_or_insert(default_lane);

            let runtime_sequence = if artifact.ordering_marker.trim().is_empty() {
                artifact.ordering_marker = runtime_sequence_marker(position);
                position
            } else {
                parse_runtime_sequence_marker(&artifact.ordering_marker).unwrap_or(position)
            };

            NormalizedArtifact {
                artifact,
                lane,
                runtime_sequence,
            }
        })
        .collect()
}

/// Index of the first artifact matching `cursor`
#[must_use]
pub fn position_of(trace: &[NormalizedArtifact], cursor: &ReplayCursor) -> Option<usize> {
    trace.iter().position(|artifact| artifact.matches(cursor))
}
