//! Opt-out annotation policy.
//!
//! Tier 1 (Opt-out): checked before any label requirement
//!
//! An object is exempt when the configured annotation is set to `false` in any
//! letter case. Absent annotations, empty strings and any other value leave the
//! policy in force.

use super::ValidationContext;

/// Annotation value that switches the label policy off
const OPT_OUT_VALUE: &str = "false";

/// Whether the object opted out of the label policy
pub fn is_exempt(ctx: &ValidationContext<'_>) -> bool {
    ctx.annotations()
        .get(&ctx.config.exempt_annotation)
        .is_some_and(|value| value.eq_ignore_ascii_case(OPT_OUT_VALUE))
}
