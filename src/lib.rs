//! admission-gate library crate
//!
//! A Kubernetes admission webhook that requires a configured set of labels on
//! incoming objects, unless the object opts out through an annotation.
//! This module exports the configuration, the webhook pipeline and the health server.

pub mod config;
pub mod error;
pub mod health;
pub mod webhooks;

pub use config::{Config, KindPolicy, PolicyConfig};
pub use error::{Error, ReviewError};
pub use health::{HealthState, run_health_server};
pub use webhooks::{
    Endpoint, JsonCodec, KindRegistry, RequestLimits, ReviewCodec, ReviewRouter, ServerSettings,
    WebhookState, create_webhook_router, run_webhook_server,
};
