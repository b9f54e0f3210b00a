//! Replay artifact resolution.
//!
//! A resolver turns a stable reference (baseline ref or candidate plan ref)
//! into the recorded trace and lineage for that run.

use rspp_core::{LineageRecord, TraceArtifact, ValidationResult};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Recorded evidence for one side of a replay
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplayArtifactBundle {
    /// Ordered trace artifacts
    #[serde(default)]
    pub artifacts: Vec<TraceArtifact>,
    /// Drop/merge lineage
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub lineage: Vec<LineageRecord>,
}

impl ReplayArtifactBundle {
    /// Bundle with artifacts and no lineage
    #[must_use]
    pub fn new(artifacts: Vec<TraceArtifact>) -> Self {
        Self {
            artifacts,
            lineage: Vec::new(),
        }
    }

    /// Attach lineage records
    #[must_use]
    pub fn with_lineage(mut self, lineage: Vec<LineageRecord>) -> Self {
        self.lineage = lineage;
        self
    }

    /// Validate every artifact and lineage record
    ///
    /// # Errors
    ///
    /// Returns the first invalid element
    pub fn validate(&self) -> ValidationResult {
        for artifact in &self.artifacts {
            artifact.validate()?;
        }
        for record in &self.lineage {
            record.validate()?;
        }
        Ok(())
    }
}

/// Resolution error
#[derive(Debug, Error)]
pub enum ResolveError {
    /// No bundle under this reference
    #[error("replay artifacts not found for reference {reference:?}")]
    NotFound {
        /// Requested reference
        reference: String,
    },
    /// Reference cannot name a bundle
    #[error("invalid replay artifact reference {reference:?}")]
    InvalidReference {
        /// Requested reference
        reference: String,
    },
    /// Storage read failed
    #[error("failed to read replay artifacts for {reference:?}: {source}")]
    Io {
        /// Requested reference
        reference: String,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },
    /// Stored bundle is not valid JSON
    #[error("failed to decode replay artifacts for {reference:?}: {source}")]
    Decode {
        /// Requested reference
        reference: String,
        /// Underlying error
        #[source]
        source: serde_json::Error,
    },
}

/// Resolves stable references to recorded evidence
pub trait ReplayArtifactResolver: Send + Sync {
    /// Resolve one reference
    ///
    /// # Errors
    ///
    /// Returns error when the reference is unknown or unreadable
    fn resolve(&self, reference: &str) -> Result<ReplayArtifactBundle, ResolveError>;
}

/// Resolver backed by an in-memory map
#[derive(Debug, Clone, Default)]
pub struct InMemoryArtifactResolver {
    bundles: HashMap<String, ReplayArtifactBundle>,
}

impl InMemoryArtifactResolver {
    /// Create an empty resolver
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a bundle, replacing any previous one
    pub fn insert(&mut self, reference: impl Into<String>, bundle: ReplayArtifactBundle) {
        self.bundles.insert(reference.into(), bundle);
    }

    /// Builder form of [`Self::insert`]
    #[must_use]
    pub fn with_bundle(mut self, reference: impl Into<String>, bundle: ReplayArtifactBundle) -> Self {
        self.insert(reference, bundle);
        self
    }
}

impl ReplayArtifactResolver for InMemoryArtifactResolver {
    fn resolve(&self, reference: &str) -> Result<ReplayArtifactBundle, ResolveError> {
        self.bundles
            .get(reference)
            .cloned()
            .ok_or_else(|| ResolveError::NotFound {
                reference: reference.to_string(),
            })
    }
}

/// Resolver reading `<dir>/<reference>.json`
#[derive(Debug, Clone)]
pub struct DirectoryArtifactResolver {
    dir: PathBuf,
}

impl DirectoryArtifactResolver {
    /// Resolve from `dir`
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Root directory
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, reference: &str) -> Result<PathBuf, ResolveError> {
        let invalid = reference.trim().is_empty()
            || reference.contains(['/', '\\'])
            || reference == "."
            || reference == "..";
        if invalid {
            return Err(ResolveError::InvalidReference {
                reference: reference.to_string(),
            });
        }
        Ok(self.dir.join(format!("{reference}.json")))
    }
}

impl ReplayArtifactResolver for DirectoryArtifactResolver {
    fn resolve(&self, reference: &str) -> Result<ReplayArtifactBundle, ResolveError> {
        let path = self.path_for(reference)?;
        let bytes = std::fs::read(&path).map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                ResolveError::NotFound {
                    reference: reference.to_string(),
                }
            } else {
                ResolveError::Io {
                    reference: reference.to_string(),
                    source,
                }
            }
        })?;
        serde_json::from_slice(&bytes).map_err(|source| ResolveError::Decode {
            reference: reference.to_string(),
            source,
        })
    }
}
