//! The `metadata` block shared by every resource and data source.

use std::collections::BTreeMap;

use kube::api::ObjectMeta;
use serde::{Deserialize, Serialize};

use crate::{
    error::{Error, Result},
    kind::Kind,
    validation,
};

/// Namespace used when a namespaced object is declared without one.
pub const DEFAULT_NAMESPACE: &str = "default";

/// Standard object metadata as it appears in state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Prefix for a server-generated name; mutually exclusive with `name`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generate_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generation: Option<i64>,
}

impl Metadata {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Default::default()
        }
    }

    pub fn in_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    /// The namespace the object lives in, falling back to [`DEFAULT_NAMESPACE`]
    /// for namespaced kinds. Always `None` for cluster-scoped kinds.
    pub fn effective_namespace(&self, kind: &Kind) -> Option<String> {
        kind.is_namespaced().then(|| {
            self.namespace
                .clone()
                .unwrap_or_else(|| DEFAULT_NAMESPACE.to_string())
        })
    }

    /// Reject metadata the API server would refuse on create.
    pub fn validate(&self, kind: &Kind) -> Result<()> {
        match (&self.name, &self.generate_name) {
            (Some(_), Some(_)) => {
                return Err(Error::validation(
                    "metadata",
                    "only one of name or generate_name may be set",
                ));
            }
            (None, None) => {
                return Err(Error::validation(
                    "metadata",
                    "one of name or generate_name must be set",
                ));
            }
            (Some(name), None) => kind.name_rule.check("metadata.name", name)?,
            (None, Some(prefix)) => kind
                .name_rule
                .check_prefix("metadata.generate_name", prefix)?,
        }
        self.validate_fields(kind)
    }

    /// Checks shared by create and update. On update the name is fixed, and
    /// state may carry both a generated name and its prefix.
    pub fn validate_fields(&self, kind: &Kind) -> Result<()> {
        if let Some(namespace) = &self.namespace {
            if !kind.is_namespaced() {
                return Err(Error::validation(
                    "metadata.namespace",
                    format!("{} is cluster-scoped", kind.kind),
                ));
            }
            validation::is_dns_1123_label(namespace).map_err(|message| {
                Error::validation("metadata.namespace", format!("{namespace:?}: {message}"))
            })?;
        }

        for (key, value) in &self.labels {
            validation::is_qualified_name(key).map_err(|message| {
                Error::validation("metadata.labels", format!("key {key:?}: {message}"))
            })?;
            validation::is_label_value(value).map_err(|message| {
                Error::validation("metadata.labels", format!("value {value:?}: {message}"))
            })?;
        }
        for key in self.annotations.keys() {
            validation::is_qualified_name(key).map_err(|message| {
                Error::validation("metadata.annotations", format!("key {key:?}: {message}"))
            })?;
        }
        Ok(())
    }

    /// Build the object metadata sent on create.
    pub fn expand(&self, kind: &Kind) -> ObjectMeta {
        ObjectMeta {
            name: self.name.clone(),
            generate_name: self.generate_name.clone(),
            namespace: self.effective_namespace(kind),
            labels: non_empty(&self.labels),
            annotations: non_empty(&self.annotations),
            ..Default::default()
        }
    }

    /// Convert server metadata to state. Internal labels and annotations are
    /// dropped unless `configured` declares them.
    pub fn flatten(meta: &ObjectMeta, configured: Option<&Metadata>) -> Self {
        let keep = |configured_keys: Option<&BTreeMap<String, String>>, key: &str| {
            !is_internal_key(key) || configured_keys.is_some_and(|keys| keys.contains_key(key))
        };
        let filter = |server: &Option<BTreeMap<String, String>>,
                      configured_keys: Option<&BTreeMap<String, String>>|
         -> BTreeMap<String, String> {
            server
                .iter()
                .flatten()
                .filter(|(key, _)| keep(configured_keys, key))
                .map(|(key, value)| (key.clone(), value.clone()))
                .collect()
        };

        Self {
            name: meta.name.clone(),
            generate_name: configured
                .and_then(|c| c.generate_name.clone())
                .or_else(|| meta.generate_name.clone()),
            namespace: meta.namespace.clone(),
            labels: filter(&meta.labels, configured.map(|c| &c.labels)),
            annotations: filter(&meta.annotations, configured.map(|c| &c.annotations)),
            uid: meta.uid.clone(),
            resource_version: meta.resource_version.clone(),
            generation: meta.generation,
        }
    }

    /// Overlay the configurable fields onto live metadata for an update.
    /// Internal keys the server or controllers added are preserved.
    pub fn merge_into(&self, meta: &mut ObjectMeta) {
        meta.labels = merge_keys(meta.labels.take(), &self.labels);
        meta.annotations = merge_keys(meta.annotations.take(), &self.annotations);
    }
}

fn non_empty(map: &BTreeMap<String, String>) -> Option<BTreeMap<String, String>> {
    (!map.is_empty()).then(|| map.clone())
}

fn merge_keys(
    live: Option<BTreeMap<String, String>>,
    desired: &BTreeMap<String, String>,
) -> Option<BTreeMap<String, String>> {
    let mut merged: BTreeMap<String, String> = live
        .into_iter()
        .flatten()
        .filter(|(key, _)| is_internal_key(key))
        .collect();
    merged.extend(desired.iter().map(|(k, v)| (k.clone(), v.clone())));
    (!merged.is_empty()).then_some(merged)
}

/// Whether a label or annotation key belongs to Kubernetes itself, e.g.
/// `kubectl.kubernetes.io/last-applied-configuration`. Application keys under
/// `app.kubernetes.io` are user-owned.
pub fn is_internal_key(key: &str) -> bool {
    let Some((prefix, _)) = key.split_once('/') else {
        return false;
    };
    if prefix == "app.kubernetes.io" {
        return false;
    }
    ["kubernetes.io", "k8s.io"]
        .iter()
        .any(|domain| prefix == *domain || prefix.ends_with(&format!(".{domain}")))
}
