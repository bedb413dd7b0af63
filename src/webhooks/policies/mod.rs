//! Label policy evaluated on the validate path.
//!
//! Policies are organized into tiers:
//! - Tier 1 (Opt-out): the exemption annotation short-circuits to allow
//! - Tier 2 (Labels): every required label key must be present
//!
//! Evaluation is a pure function of the object metadata and the static
//! [`PolicyConfig`], so the same input always yields the same decision.

pub mod exemption;
pub mod labels;

use std::collections::BTreeMap;

use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

use crate::config::PolicyConfig;

/// Result of a validation check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationResult {
    /// Whether the validation passed
    pub allowed: bool,
    /// Reason for denial (if not allowed)
    pub reason: Option<String>,
    /// Detailed message (if not allowed)
    pub message: Option<String>,
}

impl ValidationResult {
    /// Create an allowed result
    pub fn allowed() -> Self {
        Self {
            allowed: true,
            reason: None,
            message: None,
        }
    }

    /// Create a denied result
    pub fn denied(reason: &str, message: &str) -> Self {
        Self {
            allowed: false,
            reason: Some(reason.to_string()),
            message: Some(message.to_string()),
        }
    }
}

/// Context for validation
pub struct ValidationContext<'a> {
    /// Metadata of the object under review
    pub metadata: &'a ObjectMeta,
    /// Static policy settings
    pub config: &'a PolicyConfig,
}

impl<'a> ValidationContext<'a> {
    pub fn new(metadata: &'a ObjectMeta, config: &'a PolicyConfig) -> Self {
        Self { metadata, config }
    }

    /// Annotations of the object, empty when absent
    pub fn annotations(&self) -> &BTreeMap<String, String> {
        self.metadata.annotations.as_ref().unwrap_or(empty_map())
    }

    /// Labels of the object, empty when absent
    pub fn labels(&self) -> &BTreeMap<String, String> {
        self.metadata.labels.as_ref().unwrap_or(empty_map())
    }
}

fn empty_map() -> &'static BTreeMap<String, String> {
    static EMPTY: BTreeMap<String, String> = BTreeMap::new();
    &EMPTY
}

/// Run all validation policies
pub fn validate_all(ctx: &ValidationContext<'_>) -> ValidationResult {
    // Tier 1: opt-out annotation bypasses the label check entirely
    if exemption::is_exempt(ctx) {
        return ValidationResult::allowed();
    }

    // Tier 2: required labels
    let result = labels::validate(ctx);
    if !result.allowed {
        return result;
    }

    ValidationResult::allowed()
}
