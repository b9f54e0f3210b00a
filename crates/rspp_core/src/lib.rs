//! RSPP Replay Core Types
//!
//! Shared schemas for replay comparison, access control, and retention.
//! This crate has no I/O. Every schema validates itself and serializes with
//! stable JSON field names.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod access;
pub mod cursor;
pub mod decision;
pub mod divergence;
pub mod error;
pub mod payload;
pub mod retention;
pub mod run;
pub mod time;
pub mod trace;

// Re-exports
pub use access::{ReplayAccessDecision, ReplayAccessRequest, ReplayAuditEvent, ReplayRedactionMarker};
pub use cursor::{Lane, ReplayCursor, parse_runtime_sequence_marker, runtime_sequence_marker};
pub use decision::{DecisionOutcome, OutcomeKind, OutcomePhase, OutcomeScope};
pub use divergence::{DivergenceClass, ReplayDivergence, divergence_scope};
pub use error::{ValidationError, ValidationResult};
pub use payload::{PayloadClass, RedactionAction, ReplayFidelity};
pub use retention::{
    ArtifactState, DeletionMode, DeletionRequest, DeletionResult, DeletionScope,
    ReplayArtifactRecord, RetentionPolicy, RetentionSweepReport, RetentionSweepResult,
};
pub use run::{ReplayMode, ReplayRunReport, ReplayRunRequest, ReplayRunResult};
pub use time::{Clock, FixedClock, SystemClock};
pub use trace::{LineageRecord, ProviderInvocation, SnapshotProvenance, TraceArtifact};
