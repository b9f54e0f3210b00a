//! Redaction table and payload redaction.

use rspp_core::{PayloadClass, RedactionAction, ReplayFidelity, ReplayRedactionMarker};

/// Replacement for masked payloads
pub const REDACTION_MASK: &str = "***REDACTED***";

/// Prefix of hashed payloads
pub const REDACTION_HASH_PREFIX: &str = "blake3:";

/// Default redaction action for `class` at recording level `level`.
///
/// Returns `None` when the class is not recorded at that level, so no
/// redaction decision exists for it.
#[must_use]
pub const fn default_redaction_action(
    level: ReplayFidelity,
    class: PayloadClass,
) -> Option<RedactionAction> {
    use PayloadClass as C;
    use RedactionAction as A;
    use ReplayFidelity as L;

    match (level, class) {
        (_, C::Metadata) => Some(A::Allow),

        (L::L0, C::TextRaw) => Some(A::Drop),
        (L::L0, C::AudioRaw) => None,
        (L::L0, C::DerivedSummary) => Some(A::Hash),
        (L::L0, C::Pii | C::Phi) => Some(A::Drop),

        (L::L1, C::TextRaw) => Some(A::Mask),
        (L::L1, C::AudioRaw) => Some(A::Drop),
        (L::L1, C::DerivedSummary) => Some(A::Allow),
        (L::L1, C::Pii) => Some(A::Hash),
        (L::L1, C::Phi) => Some(A::Drop),

        (L::L2, C::TextRaw | C::AudioRaw | C::DerivedSummary) => Some(A::Allow),
        (L::L2, C::Pii) => Some(A::Mask),
        (L::L2, C::Phi) => Some(A::Hash),
    }
}

/// Apply a decision's markers to one payload value.
///
/// Returns `None` when the payload must not leave the core, either because
/// its marker says drop or because no marker covers the class.
#[must_use]
pub fn redact_payload(
    markers: &[ReplayRedactionMarker],
    class: PayloadClass,
    value: &str,
) -> Option<String> {
    let marker = markers.iter().find(|m| m.payload_class == class)?;
    match marker.action {
        RedactionAction::Allow => Some(value.to_string()),
        RedactionAction::Mask => Some(REDACTION_MASK.to_string()),
        RedactionAction::Hash => Some(hash_payload(value)),
        RedactionAction::Drop => None,
    }
}

fn hash_payload(value: &str) -> String {
    let digest = blake3::hash(value.as_bytes());
    format!("{REDACTION_HASH_PREFIX}{}", hex::encode(digest.as_bytes()))
}
