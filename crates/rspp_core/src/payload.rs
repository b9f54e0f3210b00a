//! Payload classes, replay fidelity, and redaction actions.

use crate::error::ValidationError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Sensitivity class of stored replay evidence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayloadClass {
    /// Identities, timings, and decision metadata
    Metadata,
    /// Raw transcript text
    TextRaw,
    /// Raw audio frames
    AudioRaw,
    /// Derived summaries
    DerivedSummary,
    /// Personally identifiable information
    Pii,
    /// Protected health information
    Phi,
}

impl PayloadClass {
    /// All payload classes
    pub const ALL: [Self; 6] = [
        Self::Metadata,
        Self::TextRaw,
        Self::AudioRaw,
        Self::DerivedSummary,
        Self::Pii,
        Self::Phi,
    ];

    /// Wire name
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Metadata => "metadata",
            Self::TextRaw => "text_raw",
            Self::AudioRaw => "audio_raw",
            Self::DerivedSummary => "derived_summary",
            Self::Pii => "pii",
            Self::Phi => "phi",
        }
    }
}

impl fmt::Display for PayloadClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PayloadClass {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|class| class.as_str() == s)
            .ok_or_else(|| ValidationError::unknown_variant("payload class", s))
    }
}

/// Graduated replay evidence detail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ReplayFidelity {
    /// Decisions and metadata only
    L0,
    /// Adds redacted text evidence
    L1,
    /// Full-fidelity evidence
    L2,
}

impl ReplayFidelity {
    /// Wire name
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::L0 => "L0",
            Self::L1 => "L1",
            Self::L2 => "L2",
        }
    }
}

impl fmt::Display for ReplayFidelity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReplayFidelity {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "L0" => Ok(Self::L0),
            "L1" => Ok(Self::L1),
            "L2" => Ok(Self::L2),
            other => Err(ValidationError::unknown_variant("replay fidelity", other)),
        }
    }
}

/// What to do with a payload class before evidence leaves the core
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RedactionAction {
    /// Pass through
    Allow,
    /// Replace with a fixed mask
    Mask,
    /// Replace with a content hash
    Hash,
    /// Remove entirely
    Drop,
}

impl fmt::Display for RedactionAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Allow => "allow",
            Self::Mask => "mask",
            Self::Hash => "hash",
            Self::Drop => "drop",
        })
    }
}
