//! Admission request routing.
//!
//! Maps the HTTP path onto the mutate or validate entry point and produces the
//! [`AdmissionResponse`]. Every response built from a request carries the
//! request's UID; only a review without a request yields an uncorrelated
//! (invalid) response.

use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::core::DynamicObject;
use kube::core::admission::{AdmissionRequest, AdmissionResponse};
use kube::core::metadata::TypeMeta;
use tracing::{debug, info, warn};

use crate::config::{KindPolicy, PolicyConfig};
use crate::webhooks::codec::Review;
use crate::webhooks::kinds::{GroupKind, KindRegistry};
use crate::webhooks::policies::{ValidationContext, validate_all};

/// Path of the mutating endpoint
pub const MUTATE_PATH: &str = "/mutate";
/// Path of the validating endpoint
pub const VALIDATE_PATH: &str = "/validate";

/// Denial reason for unregistered kinds under a fail-closed policy
pub const UNSUPPORTED_KIND_REASON: &str = "UnsupportedKind";
/// Denial reason when the embedded object cannot be decoded
pub const DECODE_ERROR_REASON: &str = "DeserializationError";
/// Denial reason for paths other than mutate/validate
pub const UNKNOWN_ENDPOINT_REASON: &str = "UnknownEndpoint";

/// Webhook entry point selected by request path
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Endpoint {
    Mutate,
    Validate,
    Unknown(String),
}

impl Endpoint {
    pub fn from_path(path: &str) -> Self {
        match path {
            MUTATE_PATH => Endpoint::Mutate,
            VALIDATE_PATH => Endpoint::Validate,
            other => Endpoint::Unknown(other.to_string()),
        }
    }

    /// Bounded label for logs and metrics
    pub fn as_str(&self) -> &'static str {
        match self {
            Endpoint::Mutate => "mutate",
            Endpoint::Validate => "validate",
            Endpoint::Unknown(_) => "unknown",
        }
    }
}

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Deny `request` with a structured reason and a human-readable message
fn deny_with_reason(
    request: &AdmissionRequest<DynamicObject>,
    reason: &str,
    message: &str,
) -> AdmissionResponse {
    let mut response = AdmissionResponse::from(request).deny(message);
    response.result.reason = reason.to_string();
    response
}

/// Deny a request whose embedded object could not be decoded.
///
/// The request never decoded into an [`AdmissionRequest`], so the response is
/// built from the envelope fields recovered by the codec.
pub fn object_decode_failure(uid: &str, api_version: &str, message: &str) -> AdmissionResponse {
    let mut response = AdmissionResponse::invalid(message);
    response.types = TypeMeta {
        api_version: api_version.to_string(),
        kind: "AdmissionReview".to_string(),
    };
    response.uid = uid.to_string();
    response.result.reason = DECODE_ERROR_REASON.to_string();
    response
}

/// Dispatches decoded reviews to the mutate or validate entry point
#[derive(Clone, Debug, Default)]
pub struct ReviewRouter {
    policy: PolicyConfig,
    kinds: KindRegistry,
}

impl ReviewRouter {
    pub fn new(policy: PolicyConfig, kinds: KindRegistry) -> Self {
        Self { policy, kinds }
    }

    pub fn policy(&self) -> &PolicyConfig {
        &self.policy
    }

    pub fn kinds(&self) -> &KindRegistry {
        &self.kinds
    }

    /// Route a decoded review to exactly one entry point
    pub fn route(&self, endpoint: &Endpoint, review: Review) -> AdmissionResponse {
        let request: AdmissionRequest<DynamicObject> = match review.try_into() {
            Ok(request) => request,
            Err(e) => {
                warn!(endpoint = %endpoint, error = %e, "AdmissionReview carried no request");
                return AdmissionResponse::invalid(e.to_string());
            }
        };

        debug!(
            uid = %request.uid,
            endpoint = %endpoint,
            kind = %request.kind.kind,
            name = %request.name,
            namespace = ?request.namespace,
            operation = ?request.operation,
            "Admission request received"
        );

        match endpoint {
            Endpoint::Mutate => self.mutate(&request),
            Endpoint::Validate => self.validate(&request),
            Endpoint::Unknown(path) => {
                warn!(uid = %request.uid, path = %path, "Admission request for unknown endpoint");
                deny_with_reason(
                    &request,
                    UNKNOWN_ENDPOINT_REASON,
                    &format!("unknown endpoint: {path}"),
                )
            }
        }
    }

    /// Mutating entry point.
    ///
    /// No patches are generated: the object is admitted unchanged.
    pub fn mutate(&self, request: &AdmissionRequest<DynamicObject>) -> AdmissionResponse {
        debug!(uid = %request.uid, "Mutation not configured, admitting unchanged");
        AdmissionResponse::from(request)
    }

    /// Validating entry point: applies the label policy to the submitted object
    pub fn validate(&self, request: &AdmissionRequest<DynamicObject>) -> AdmissionResponse {
        let uid = &request.uid;
        let kind = request.kind.kind.as_str();

        if self.policy.is_ignored_namespace(request.namespace.as_deref()) {
            debug!(uid = %uid, namespace = ?request.namespace, "Namespace ignored, allowing");
            return AdmissionResponse::from(request);
        }

        // DELETE and CONNECT carry no object to label-check
        let Some(object) = &request.object else {
            debug!(uid = %uid, operation = ?request.operation, "No object in request, allowing");
            return AdmissionResponse::from(request);
        };

        let metadata: ObjectMeta = match self.kinds.get(&request.kind.group, kind) {
            Some(extractor) => match extractor.extract(object) {
                Ok(metadata) => metadata,
                Err(e) => {
                    warn!(uid = %uid, kind = %kind, error = %e, "Could not decode admission object");
                    return deny_with_reason(request, DECODE_ERROR_REASON, &e.to_string());
                }
            },
            None => return self.unsupported_kind(request),
        };

        let result = validate_all(&ValidationContext::new(&metadata, &self.policy));
        if !result.allowed {
            let reason = result
                .reason
                .unwrap_or_else(|| "ValidationFailed".to_string());
            let message = result
                .message
                .unwrap_or_else(|| "Validation failed".to_string());
            warn!(
                uid = %uid,
                kind = %kind,
                name = %request.name,
                reason = %reason,
                message = %message,
                "Admission request denied"
            );
            return deny_with_reason(request, &reason, &message);
        }

        info!(uid = %uid, kind = %kind, name = %request.name, "Admission request allowed");
        AdmissionResponse::from(request)
    }

    fn unsupported_kind(&self, request: &AdmissionRequest<DynamicObject>) -> AdmissionResponse {
        let kind = GroupKind::new(&request.kind.group, &request.kind.kind);
        match self.policy.unsupported_kinds {
            KindPolicy::Allow => {
                debug!(uid = %request.uid, kind = %kind, "Unsupported kind, failing open");
                AdmissionResponse::from(request)
            }
            KindPolicy::Deny => {
                warn!(uid = %request.uid, kind = %kind, "Unsupported kind, failing closed");
                deny_with_reason(
                    request,
                    UNSUPPORTED_KIND_REASON,
                    &format!("kind {kind} is not supported by this webhook"),
                )
            }
        }
    }
}
