//! Webhook module for Kubernetes admission reviews.
//!
//! This module provides the admission endpoints with tiered validation policies:
//! - Tier 1 (Opt-out): annotation exemption, checked first
//! - Tier 2 (Labels): required label presence
//!
//! Layers, leaf first: [`policies`] decide, [`kinds`] extract typed metadata,
//! [`codec`] converts wire bytes, [`router`] dispatches, [`server`] serves HTTPS.

pub mod codec;
pub mod kinds;
pub mod policies;
pub mod router;
mod server;

pub use codec::{JsonCodec, Review, ReviewCodec, decode_review};
pub use kinds::{ExtractError, GroupKind, KindRegistry, MetadataExtractor, TypedExtractor};
pub use policies::{ValidationContext, ValidationResult};
pub use router::{Endpoint, ReviewRouter};
pub use server::{
    RequestLimits, ServerSettings, WebhookState, create_webhook_router, run_webhook_server,
    serve_review,
};

// Re-export kube-rs admission types for contract testing
pub use kube::core::admission::{AdmissionRequest, AdmissionResponse, AdmissionReview, Operation};
