//! Comparator for baseline and candidate evidence.
//!
//! Every function here is pure: identical inputs always produce identical
//! divergence lists, in a fixed order. An empty list means no divergence.

use rspp_core::{
    DecisionOutcome, DivergenceClass, LineageRecord, ReplayDivergence, SnapshotProvenance,
    TraceArtifact,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Default timing tolerance in milliseconds
pub const DEFAULT_TIMING_TOLERANCE_MS: i64 = 15;

/// Comparator configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompareConfig {
    /// Allowed runtime timestamp drift; negative values are treated as zero
    pub timing_tolerance_ms: i64,
}

impl CompareConfig {
    /// Tolerance after clamping negatives to zero
    #[must_use]
    pub const fn effective_tolerance_ms(&self) -> i64 {
        if self.timing_tolerance_ms < 0 {
            0
        } else {
            self.timing_tolerance_ms
        }
    }
}

impl Default for CompareConfig {
    fn default() -> Self {
        Self {
            timing_tolerance_ms: DEFAULT_TIMING_TOLERANCE_MS,
        }
    }
}

/// Compare two ordered decision outcome sequences.
///
/// A length mismatch yields one `OUTCOME` divergence; every mismatching
/// index in the overlapping prefix yields one more.
#[must_use]
pub fn compare_decision_outcomes(
    baseline: &[DecisionOutcome],
    candidate: &[DecisionOutcome],
) -> Vec<ReplayDivergence> {
    let mut divergences = Vec::new();

    if baseline.len() != candidate.len() {
        let scope = baseline
            .first()
            .or(candidate.first())
            .map(DecisionOutcome::divergence_scope)
            .unwrap_or_default();
        divergences.push(ReplayDivergence::new(
            DivergenceClass::Outcome,
            scope,
            format!(
                "decision outcome count mismatch: baseline={} candidate={}",
                baseline.len(),
                candidate.len()
            ),
        ));
    }

    for (index, (b, c)) in baseline.iter().zip(candidate).enumerate() {
        let fields = b.mismatched_fields(c);
        if !fields.is_empty() {
            divergences.push(ReplayDivergence::new(
                DivergenceClass::Outcome,
                b.divergence_scope(),
                format!(
                    "decision outcome mismatch at index {index} (event {}): {}",
                    b.event_id,
                    fields.join(", ")
                ),
            ));
        }
    }

    divergences
}

/// Compare two ordered trace artifact sequences.
///
/// Per index, each dimension is checked independently, so one index can
/// yield several divergence classes. Timing differences beyond the
/// tolerance carry the absolute difference.
#[must_use]
pub fn compare_trace_artifacts(
    baseline: &[TraceArtifact],
    candidate: &[TraceArtifact],
    config: &CompareConfig,
) -> Vec<ReplayDivergence> {
    let mut divergences = Vec::new();
    let tolerance = config.effective_tolerance_ms();

    if baseline.len() != candidate.len() {
        let scope = baseline
            .first()
            .or(candidate.first())
            .map(TraceArtifact::divergence_scope)
            .unwrap_or_default();
        divergences.push(ReplayDivergence::new(
            DivergenceClass::Outcome,
            scope,
            format!(
                "trace artifact count mismatch: baseline={} candidate={}",
                baseline.len(),
                candidate.len()
            ),
        ));
    }

    for (index, (b, c)) in baseline.iter().zip(candidate).enumerate() {
        let scope = b.divergence_scope();

        if b.plan_hash != c.plan_hash {
            divergences.push(ReplayDivergence::new(
                DivergenceClass::Plan,
                scope.clone(),
                format!(
                    "plan hash mismatch at index {index}: baseline={} candidate={}",
                    b.plan_hash, c.plan_hash
                ),
            ));
        }

        let provenance = provenance_mismatches(&b.snapshot_provenance, &c.snapshot_provenance);
        if !provenance.is_empty() {
            divergences.push(ReplayDivergence::new(
                DivergenceClass::Plan,
                scope.clone(),
                format!(
                    "snapshot provenance mismatch at index {index}: {}",
                    provenance.join(", ")
                ),
            ));
        }

        let decision = decision_equivalence_mismatches(&b.decision, &c.decision);
        if !decision.is_empty() {
            divergences.push(ReplayDivergence::new(
                DivergenceClass::Outcome,
                scope.clone(),
                format!(
                    "decision mismatch at index {index} (event {}): {}",
                    b.decision.event_id,
                    decision.join(", ")
                ),
            ));
        }

        if b.ordering_marker != c.ordering_marker {
            divergences.push(ReplayDivergence::new(
                DivergenceClass::Ordering,
                scope.clone(),
                format!(
                    "ordering marker mismatch at index {index}: baseline={} candidate={}",
                    b.ordering_marker, c.ordering_marker
                ),
            ));
        }

        if b.authority_epoch != c.authority_epoch {
            divergences.push(ReplayDivergence::new(
                DivergenceClass::Authority,
                scope.clone(),
                format!(
                    "authority epoch mismatch at index {index}: baseline={} candidate={}",
                    b.authority_epoch, c.authority_epoch
                ),
            ));
        }

        if b.provider != c.provider {
            divergences.push(ReplayDivergence::new(
                DivergenceClass::ProviderChoice,
                scope.clone(),
                format!(
                    "provider choice mismatch at index {index}: baseline={}/{} candidate={}/{}",
                    b.provider.provider_id,
                    b.provider.model_id,
                    c.provider.provider_id,
                    c.provider.model_id
                ),
            ));
        }

        let diff = b.runtime_timestamp_ms.abs_diff(c.runtime_timestamp_ms);
        let diff = i64::try_from(diff).unwrap_or(i64::MAX);
        if diff > tolerance {
            divergences.push(ReplayDivergence::timing(
                scope,
                format!(
                    "runtime timestamp drift at index {index}: {diff}ms exceeds tolerance {tolerance}ms"
                ),
                diff,
            ));
        }
    }

    divergences
}

/// Compare drop/merge lineage keyed by event id.
///
/// Baseline events missing from the candidate are unexplained absences.
/// Events present on both sides must agree on the dropped flag and merge
/// group.
#[must_use]
pub fn compare_lineage_records(
    baseline: &[LineageRecord],
    candidate: &[LineageRecord],
) -> Vec<ReplayDivergence> {
    let mut by_event: HashMap<&str, &LineageRecord> = HashMap::with_capacity(candidate.len());
    for record in candidate {
        by_event.entry(record.event_id.as_str()).or_insert(record);
    }

    let mut divergences = Vec::new();
    for b in baseline {
        let scope = b.divergence_scope();
        let Some(c) = by_event.get(b.event_id.as_str()) else {
            divergences.push(ReplayDivergence::new(
                DivergenceClass::Outcome,
                scope,
                format!(
                    "upstream absence without drop/merge lineage marker for event {}",
                    b.event_id
                ),
            ));
            continue;
        };

        if b.dropped != c.dropped {
            divergences.push(ReplayDivergence::new(
                DivergenceClass::Outcome,
                scope.clone(),
                format!(
                    "lineage dropped flag mismatch for event {}: baseline={} candidate={}",
                    b.event_id, b.dropped, c.dropped
                ),
            ));
        }

        if b.merge_group_id != c.merge_group_id {
            divergences.push(ReplayDivergence::new(
                DivergenceClass::Outcome,
                scope,
                format!(
                    "lineage merge group mismatch for event {}: baseline={} candidate={}",
                    b.event_id,
                    b.merge_group_id.as_deref().unwrap_or("-"),
                    c.merge_group_id.as_deref().unwrap_or("-")
                ),
            ));
        }
    }

    divergences
}

/// Decision fields that differ, ignoring timestamps.
///
/// Timestamp drift on trace artifacts is classified as `TIMING` under a
/// tolerance, so it must not also surface as an outcome change.
fn decision_equivalence_mismatches(b: &DecisionOutcome, c: &DecisionOutcome) -> Vec<&'static str> {
    b.mismatched_fields(c)
        .into_iter()
        .filter(|field| !matches!(*field, "runtime_timestamp_ms" | "wall_clock_timestamp_ms"))
        .collect()
}

fn provenance_mismatches(b: &SnapshotProvenance, c: &SnapshotProvenance) -> Vec<&'static str> {
    let pairs = [
        ("routing_view_snapshot", &b.routing_view_snapshot, &c.routing_view_snapshot),
        (
            "admission_policy_snapshot",
            &b.admission_policy_snapshot,
            &c.admission_policy_snapshot,
        ),
        (
            "abi_compatibility_snapshot",
            &b.abi_compatibility_snapshot,
            &c.abi_compatibility_snapshot,
        ),
        (
            "version_resolution_snapshot",
            &b.version_resolution_snapshot,
            &c.version_resolution_snapshot,
        ),
        (
            "policy_resolution_snapshot",
            &b.policy_resolution_snapshot,
            &c.policy_resolution_snapshot,
        ),
        (
            "provider_health_snapshot",
            &b.provider_health_snapshot,
            &c.provider_health_snapshot,
        ),
    ];
    pairs
        .into_iter()
        .filter(|(_, b, c)| b != c)
        .map(|(name, _, _)| name)
        .collect()
}
