//! Kind-specific metadata extraction.
//!
//! The validate path needs the typed metadata of the submitted object. Each
//! supported kind registers a [`MetadataExtractor`] keyed by its API group and kind; kinds
//! without an entry are handled by the configured [`KindPolicy`](crate::config::KindPolicy).

use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::Arc;

use k8s_openapi::api::core::v1::Pod;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::core::{DynamicObject, Resource};
use serde::de::DeserializeOwned;
use thiserror::Error;

/// The submitted object could not be decoded as its declared kind
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("could not decode {kind} object: {message}")]
pub struct ExtractError {
    pub kind: String,
    pub message: String,
}

/// Turns a raw admission object into the metadata the policy evaluates
pub trait MetadataExtractor: Send + Sync {
    fn extract(&self, object: &DynamicObject) -> Result<ObjectMeta, ExtractError>;
}

/// Extractor that fully decodes the object as `K` before reading its metadata,
/// so a malformed body is rejected rather than partially evaluated.
pub struct TypedExtractor<K> {
    _kind: PhantomData<fn() -> K>,
}

impl<K> TypedExtractor<K> {
    pub fn new() -> Self {
        Self { _kind: PhantomData }
    }
}

impl<K> Default for TypedExtractor<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K> MetadataExtractor for TypedExtractor<K>
where
    K: Resource<DynamicType = ()> + DeserializeOwned,
{
    fn extract(&self, object: &DynamicObject) -> Result<ObjectMeta, ExtractError> {
        object
            .clone()
            .try_parse::<K>()
            .map(|parsed| parsed.meta().clone())
            .map_err(|e| ExtractError {
                kind: K::kind(&()).into_owned(),
                message: e.to_string(),
            })
    }
}

/// API group and kind a registry entry answers for
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GroupKind {
    /// Empty for the core group
    pub group: String,
    pub kind: String,
}

impl GroupKind {
    pub fn new(group: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            kind: kind.into(),
        }
    }
}

impl std::fmt::Display for GroupKind {
    /// `Kind` for the core group, `Kind.group` otherwise
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.group.is_empty() {
            f.write_str(&self.kind)
        } else {
            write!(f, "{}.{}", self.kind, self.group)
        }
    }
}

/// Mapping from API group and kind to extractor.
///
/// A kind name registered under one group never matches a request for another
/// group, so a custom resource named `Pod` is treated as unsupported.
#[derive(Clone)]
pub struct KindRegistry {
    extractors: HashMap<GroupKind, Arc<dyn MetadataExtractor>>,
}

impl Default for KindRegistry {
    /// Pods are the only kind the gateway validates out of the box
    fn default() -> Self {
        Self::empty().with_kind::<Pod>()
    }
}

impl std::fmt::Debug for KindRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KindRegistry")
            .field("kinds", &self.kinds())
            .finish()
    }
}

impl KindRegistry {
    /// Registry with no kinds, every object is treated as unsupported
    pub fn empty() -> Self {
        Self {
            extractors: HashMap::new(),
        }
    }

    /// Register a typed Kubernetes resource under its group and kind
    pub fn with_kind<K>(self) -> Self
    where
        K: Resource<DynamicType = ()> + DeserializeOwned + 'static,
    {
        let key = GroupKind::new(K::group(&()), K::kind(&()));
        self.register(key, TypedExtractor::<K>::new())
    }

    /// Register a custom extractor for `key`, replacing any previous entry
    pub fn register(mut self, key: GroupKind, extractor: impl MetadataExtractor + 'static) -> Self {
        self.extractors.insert(key, Arc::new(extractor));
        self
    }

    pub fn get(&self, group: &str, kind: &str) -> Option<&dyn MetadataExtractor> {
        self.extractors
            .get(&GroupKind::new(group, kind))
            .map(|e| e.as_ref())
    }

    /// Registered kinds as `Kind` or `Kind.group`, sorted
    pub fn kinds(&self) -> Vec<String> {
        let mut kinds: Vec<String> = self.extractors.keys().map(ToString::to_string).collect();
        kinds.sort_unstable();
        kinds
    }
}
