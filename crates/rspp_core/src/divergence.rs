//! Divergence taxonomy.

use crate::error::{ValidationError, ValidationResult, require};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Dimension along which baseline and candidate diverged
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DivergenceClass {
    /// Plan hash or snapshot provenance differs
    Plan,
    /// Decision outcome differs, or evidence is missing
    Outcome,
    /// Ordering marker differs
    Ordering,
    /// Runtime timestamps differ beyond tolerance
    Timing,
    /// Authority epoch differs
    Authority,
    /// Provider or model choice differs
    ProviderChoice,
}

impl DivergenceClass {
    /// Wire name
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Plan => "PLAN",
            Self::Outcome => "OUTCOME",
            Self::Ordering => "ORDERING",
            Self::Timing => "TIMING",
            Self::Authority => "AUTHORITY",
            Self::ProviderChoice => "PROVIDER_CHOICE",
        }
    }
}

impl fmt::Display for DivergenceClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DivergenceClass {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PLAN" => Ok(Self::Plan),
            "OUTCOME" => Ok(Self::Outcome),
            "ORDERING" => Ok(Self::Ordering),
            "TIMING" => Ok(Self::Timing),
            "AUTHORITY" => Ok(Self::Authority),
            "PROVIDER_CHOICE" => Ok(Self::ProviderChoice),
            other => Err(ValidationError::unknown_variant("divergence class", other)),
        }
    }
}

/// One classified mismatch between baseline and candidate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplayDivergence {
    /// Divergence class
    pub class: DivergenceClass,
    /// `turn:<id>` or `session:<id>`
    pub scope: String,
    /// Human-readable description
    pub message: String,
    /// Absolute timing difference, only for `TIMING`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diff_ms: Option<i64>,
}

impl ReplayDivergence {
    /// Create a non-timing divergence
    #[must_use]
    pub fn new(class: DivergenceClass, scope: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            class,
            scope: scope.into(),
            message: message.into(),
            diff_ms: None,
        }
    }

    /// Create a timing divergence carrying the absolute difference
    #[must_use]
    pub fn timing(scope: impl Into<String>, message: impl Into<String>, diff_ms: i64) -> Self {
        Self {
            class: DivergenceClass::Timing,
            scope: scope.into(),
            message: message.into(),
            diff_ms: Some(diff_ms.saturating_abs()),
        }
    }

    /// Validate the timing invariant and required fields
    ///
    /// # Errors
    ///
    /// Returns error when `TIMING` lacks a non-negative `diff_ms`, when any
    /// other class carries one, or when scope/message are empty
    pub fn validate(&self) -> ValidationResult {
        const SCHEMA: &str = "replay_divergence";
        require(SCHEMA, "scope", &self.scope)?;
        require(SCHEMA, "message", &self.message)?;
        match (self.class, self.diff_ms) {
            (DivergenceClass::Timing, Some(diff)) if diff >= 0 => Ok(()),
            (DivergenceClass::Timing, Some(diff)) => Err(ValidationError::invalid(
                SCHEMA,
                "diff_ms",
                format!("timing diff must be >= 0, got {diff}"),
            )),
            (DivergenceClass::Timing, None) => Err(ValidationError::missing(SCHEMA, "diff_ms")),
            (class, Some(_)) => Err(ValidationError::invalid(
                SCHEMA,
                "diff_ms",
                format!("only TIMING divergences carry diff_ms, got {class}"),
            )),
            (_, None) => Ok(()),
        }
    }
}

/// Build the divergence scope string for a session/turn pair
#[must_use]
pub fn divergence_scope(session_id: &str, turn_id: Option<&str>) -> String {
    match turn_id.filter(|t| !t.trim().is_empty()) {
        Some(turn_id) => format!("turn:{turn_id}"),
        None => format!("session:{session_id}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_class_wire_names() {
        let json = serde_json::to_string(&DivergenceClass::ProviderChoice).unwrap();
        assert_eq!(json, "\"PROVIDER_CHOICE\"");
        assert_eq!("TIMING".parse::<DivergenceClass>().unwrap(), DivergenceClass::Timing);
        assert!("timing".parse::<DivergenceClass>().is_err());
    }

    #[test]
    fn test_timing_requires_diff() {
        let d = ReplayDivergence::timing("turn:t1", "late", 12);
        assert!(d.validate().is_ok());
        assert_eq!(d.diff_ms, Some(12));

        let mut missing = d.clone();
        missing.diff_ms = None;
        assert!(missing.validate().is_err());

        let mut negative = d;
        negative.diff_ms = Some(-1);
        assert!(negative.validate().is_err());
    }

    #[test]
    fn test_timing_constructor_takes_absolute() {
        let d = ReplayDivergence::timing("turn:t1", "early", -9);
        assert_eq!(d.diff_ms, Some(9));
    }

    #[test]
    fn test_non_timing_rejects_diff() {
        let mut d = ReplayDivergence::new(DivergenceClass::Plan, "turn:t1", "plan changed");
        assert!(d.validate().is_ok());
        d.diff_ms = Some(0);
        assert!(d.validate().is_err());
    }

    #[test]
    fn test_diff_ms_omitted_from_json() {
        let d = ReplayDivergence::new(DivergenceClass::Outcome, "session:s1", "missing");
        let json = serde_json::to_value(&d).unwrap();
        assert!(json.get("diff_ms").is_none());
        assert_eq!(json["class"], "OUTCOME");
    }

    #[test]
    fn test_divergence_scope() {
        assert_eq!(divergence_scope("s1", Some("t1")), "turn:t1");
        assert_eq!(divergence_scope("s1", Some("")), "session:s1");
        assert_eq!(divergence_scope("s1", None), "session:s1");
    }
}
