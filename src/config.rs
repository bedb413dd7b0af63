//! Startup configuration.
//!
//! [`Config`] is parsed once in `main` from flags (with environment fallbacks) and
//! turned into an immutable [`PolicyConfig`] that every request handler shares.

use std::collections::BTreeSet;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, ValueEnum};

use crate::error::{Error, Result};

/// Default annotation that opts an object out of the label policy
pub const DEFAULT_EXEMPT_ANNOTATION: &str = "admission-policy/validate";
/// Label carrying the owning project
pub const PROJECT_LABEL: &str = "project-label";
/// Label carrying the application name
pub const NAME_LABEL: &str = "name-label";

/// Default webhook port
pub const DEFAULT_WEBHOOK_PORT: u16 = 4480;
/// Default health/metrics port
pub const DEFAULT_HEALTH_PORT: u16 = 8080;
/// API server bodies are capped at 3 MiB by etcd, reviews stay below that
pub const DEFAULT_MAX_BODY_BYTES: usize = 3 * 1024 * 1024;

/// Outcome for resource kinds that have no registered metadata extractor
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum KindPolicy {
    /// Fail open: admit the object
    #[default]
    Allow,
    /// Fail closed: deny the object
    Deny,
}

impl std::fmt::Display for KindPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            KindPolicy::Allow => write!(f, "allow"),
            KindPolicy::Deny => write!(f, "deny"),
        }
    }
}

/// Command-line configuration for the webhook process
#[derive(Parser, Clone, Debug)]
#[command(name = "admission-gate", version, about)]
pub struct Config {
    /// Port the HTTPS webhook listens on
    #[arg(long, env = "WEBHOOK_PORT", default_value_t = DEFAULT_WEBHOOK_PORT)]
    pub port: u16,

    /// PEM-encoded TLS certificate
    #[arg(long, env = "WEBHOOK_CERT", default_value = "./tls/cert.pem")]
    pub cert: PathBuf,

    /// PEM-encoded TLS private key
    #[arg(long, env = "WEBHOOK_KEY", default_value = "./tls/key.pem")]
    pub key: PathBuf,

    /// Port for the plain-HTTP health and metrics server
    #[arg(long, env = "HEALTH_PORT", default_value_t = DEFAULT_HEALTH_PORT)]
    pub health_port: u16,

    /// Upper bound on handling a single admission request
    #[arg(long, env = "REQUEST_TIMEOUT_SECS", default_value_t = 10)]
    pub request_timeout_secs: u64,

    /// Largest accepted request body
    #[arg(long, env = "MAX_BODY_BYTES", default_value_t = DEFAULT_MAX_BODY_BYTES)]
    pub max_body_bytes: usize,

    /// Time in-flight requests get to finish after a shutdown signal
    #[arg(long, env = "SHUTDOWN_GRACE_SECS", default_value_t = 5)]
    pub shutdown_grace_secs: u64,

    /// Annotation which, set to "false", exempts an object from the label policy
    #[arg(long, env = "EXEMPT_ANNOTATION", default_value = DEFAULT_EXEMPT_ANNOTATION)]
    pub exempt_annotation: String,

    /// Label keys every admitted object must carry
    #[arg(
        long = "required-label",
        env = "REQUIRED_LABELS",
        value_delimiter = ',',
        default_values_t = [PROJECT_LABEL.to_string(), NAME_LABEL.to_string()]
    )]
    pub required_labels: Vec<String>,

    /// Namespaces whose objects are admitted without evaluation
    #[arg(long = "ignored-namespace", env = "IGNORED_NAMESPACES", value_delimiter = ',')]
    pub ignored_namespaces: Vec<String>,

    /// What to do with kinds the gateway cannot extract metadata from
    #[arg(long, env = "UNSUPPORTED_KINDS", value_enum, default_value_t = KindPolicy::Allow)]
    pub unsupported_kinds: KindPolicy,
}

impl Config {
    /// Address the webhook listener binds to
    pub fn webhook_addr(&self) -> SocketAddr {
        SocketAddr::from(([0, 0, 0, 0], self.port))
    }

    /// Address the health server binds to
    pub fn health_addr(&self) -> SocketAddr {
        SocketAddr::from(([0, 0, 0, 0], self.health_port))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }

    /// Build the immutable policy configuration
    pub fn policy(&self) -> Result<PolicyConfig> {
        if self.exempt_annotation.trim().is_empty() {
            return Err(Error::Config("exempt annotation must not be empty".to_string()));
        }
        if self.required_labels.iter().any(|l| l.trim().is_empty()) {
            return Err(Error::Config("required label keys must not be empty".to_string()));
        }
        if self.webhook_addr().port() == self.health_addr().port() {
            return Err(Error::Config(format!(
                "webhook and health servers cannot share port {}",
                self.port
            )));
        }

        Ok(PolicyConfig {
            exempt_annotation: self.exempt_annotation.clone(),
            required_labels: self.required_labels.iter().cloned().collect(),
            ignored_namespaces: self.ignored_namespaces.iter().cloned().collect(),
            unsupported_kinds: self.unsupported_kinds,
        })
    }
}

/// Label policy, fixed for the lifetime of the process
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PolicyConfig {
    /// Annotation key checked for the opt-out value
    pub exempt_annotation: String,
    /// Label keys that must be present (presence only, values are not checked)
    pub required_labels: BTreeSet<String>,
    /// Namespaces skipped entirely
    pub ignored_namespaces: BTreeSet<String>,
    /// Outcome for kinds without an extractor
    pub unsupported_kinds: KindPolicy,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            exempt_annotation: DEFAULT_EXEMPT_ANNOTATION.to_string(),
            required_labels: [PROJECT_LABEL, NAME_LABEL]
                .into_iter()
                .map(String::from)
                .collect(),
            ignored_namespaces: BTreeSet::new(),
            unsupported_kinds: KindPolicy::Allow,
        }
    }
}

impl PolicyConfig {
    /// Replace the required label set
    pub fn with_required_labels<I, S>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.required_labels = labels.into_iter().map(Into::into).collect();
        self
    }

    /// Add a namespace whose objects bypass evaluation
    pub fn with_ignored_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.ignored_namespaces.insert(namespace.into());
        self
    }

    /// Set the outcome for kinds without an extractor
    pub fn with_unsupported_kinds(mut self, policy: KindPolicy) -> Self {
        self.unsupported_kinds = policy;
        self
    }

    pub fn is_ignored_namespace(&self, namespace: Option<&str>) -> bool {
        namespace.is_some_and(|ns| self.ignored_namespaces.contains(ns))
    }
}
