//! Required label policy.
//!
//! Tier 2 (Labels): enforced unless the object opted out
//!
//! Validates:
//! - Every key in the configured required set is present in the object's labels
//!
//! Only presence is checked, values may be anything including empty strings.

use super::{ValidationContext, ValidationResult};

/// Denial reason reported when labels are missing
pub const MISSING_LABELS_REASON: &str = "MissingLabels";

/// Validate required label presence
pub fn validate(ctx: &ValidationContext<'_>) -> ValidationResult {
    let labels = ctx.labels();

    // BTreeSet iteration keeps the message stable across calls
    let missing: Vec<&str> = ctx
        .config
        .required_labels
        .iter()
        .filter(|key| !labels.contains_key(key.as_str()))
        .map(String::as_str)
        .collect();

    if !missing.is_empty() {
        return ValidationResult::denied(
            MISSING_LABELS_REASON,
            &format!("missing required label(s): {}", missing.join(", ")),
        );
    }

    ValidationResult::allowed()
}
