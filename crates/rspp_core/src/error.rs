//! Schema validation errors shared by every RSPP replay component.

use thiserror::Error;

/// Result type for schema validation
pub type ValidationResult<T = ()> = Result<T, ValidationError>;

/// Schema validation error.
///
/// Always local and never retried; callers surface it verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// A required field is missing or empty
    #[error("{schema}: {field} is required")]
    Missing {
        /// Schema being validated
        schema: &'static str,
        /// Offending field
        field: &'static str,
    },

    /// A field holds a value outside its allowed range or shape
    #[error("{schema}: invalid {field}: {reason}")]
    Invalid {
        /// Schema being validated
        schema: &'static str,
        /// Offending field
        field: &'static str,
        /// Why the value was rejected
        reason: String,
    },

    /// An enum value could not be parsed
    #[error("unsupported {kind}: {value:?}")]
    UnknownVariant {
        /// Enum being parsed
        kind: &'static str,
        /// Raw value
        value: String,
    },
}

impl ValidationError {
    /// Missing-field error
    #[must_use]
    pub const fn missing(schema: &'static str, field: &'static str) -> Self {
        Self::Missing { schema, field }
    }

    /// Invalid-field error
    #[must_use]
    pub fn invalid(schema: &'static str, field: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            schema,
            field,
            reason: reason.into(),
        }
    }

    /// Unknown enum variant error
    #[must_use]
    pub fn unknown_variant(kind: &'static str, value: impl Into<String>) -> Self {
        Self::UnknownVariant {
            kind,
            value: value.into(),
        }
    }
}

/// Reject empty or whitespace-only strings.
pub(crate) fn require(schema: &'static str, field: &'static str, value: &str) -> ValidationResult {
    if value.trim().is_empty() {
        return Err(ValidationError::missing(schema, field));
    }
    Ok(())
}

/// Reject negative millisecond values.
pub(crate) fn require_non_negative(
    schema: &'static str,
    field: &'static str,
    value: i64,
) -> ValidationResult {
    if value < 0 {
        return Err(ValidationError::invalid(
            schema,
            field,
            format!("must be >= 0, got {value}"),
        ));
    }
    Ok(())
}
