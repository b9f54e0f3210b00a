//! RSPP Replay Engine
//!
//! Deterministic comparison of a recorded baseline trace against a candidate.
//! Divergences are classified and emitted in a stable order, and runs can
//! resume from a cursor.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod compare;
pub mod engine;
pub mod normalize;
pub mod resolver;

pub use compare::{
    CompareConfig, DEFAULT_TIMING_TOLERANCE_MS, compare_decision_outcomes,
    compare_lineage_records, compare_trace_artifacts,
};
pub use engine::{
    EngineConfig, ReplayEngine, ReplayError, RunIdGenerator, TraceSide, uuid_run_id_generator,
};
pub use normalize::{NormalizedArtifact, normalize_trace, position_of};
pub use resolver::{
    DirectoryArtifactResolver, InMemoryArtifactResolver, ReplayArtifactBundle,
    ReplayArtifactResolver, ResolveError,
};
