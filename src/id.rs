//! Resource identifiers.
//!
//! Every managed object is tracked by a single string: `namespace/name` for
//! namespaced kinds and plain `name` for cluster-scoped ones.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

const SEPARATOR: char = '/';

/// Whether a kind lives inside a namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    Namespaced,
    Cluster,
}

impl Scope {
    pub fn is_namespaced(self) -> bool {
        matches!(self, Scope::Namespaced)
    }
}

/// Encode an identifier.
///
/// Callers are expected to pass a non-empty `name`, and a non-empty
/// `namespace` for namespaced kinds; use [`ResourceId::namespaced`] or
/// [`ResourceId::cluster`] for checked construction.
pub fn encode(namespace: &str, name: &str, scope: Scope) -> String {
    match scope {
        Scope::Namespaced => format!("{namespace}{SEPARATOR}{name}"),
        Scope::Cluster => name.to_string(),
    }
}

/// Parse a stored identifier for a kind of the given scope.
pub fn decode(id: &str, scope: Scope) -> Result<ResourceId> {
    let malformed = |reason| Error::MalformedIdentifier {
        id: id.to_string(),
        reason,
    };

    match scope {
        Scope::Namespaced => {
            let (namespace, name) = id
                .split_once(SEPARATOR)
                .ok_or_else(|| malformed("expected <namespace>/<name>"))?;
            if name.contains(SEPARATOR) {
                return Err(malformed("expected exactly one '/' separator"));
            }
            if namespace.is_empty() {
                return Err(malformed("namespace is empty"));
            }
            if name.is_empty() {
                return Err(malformed("name is empty"));
            }
            Ok(ResourceId {
                namespace: Some(namespace.to_string()),
                name: name.to_string(),
            })
        }
        Scope::Cluster => {
            if id.is_empty() {
                return Err(malformed("name is empty"));
            }
            Ok(ResourceId {
                namespace: None,
                name: id.to_string(),
            })
        }
    }
}

/// Decoded identifier of a remote object.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceId {
    namespace: Option<String>,
    name: String,
}

impl ResourceId {
    pub fn namespaced(namespace: impl Into<String>, name: impl Into<String>) -> Result<Self> {
        let namespace = namespace.into();
        let name = name.into();
        if namespace.is_empty() || namespace.contains(SEPARATOR) {
            return Err(Error::validation(
                "metadata.namespace",
                format!("{namespace:?} is not usable in an identifier"),
            ));
        }
        if name.is_empty() || name.contains(SEPARATOR) {
            return Err(Error::validation(
                "metadata.name",
                format!("{name:?} is not usable in an identifier"),
            ));
        }
        Ok(Self {
            namespace: Some(namespace),
            name,
        })
    }

    pub fn cluster(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        if name.is_empty() {
            return Err(Error::validation("metadata.name", "must not be empty"));
        }
        Ok(Self {
            namespace: None,
            name,
        })
    }

    /// `None` for cluster-scoped objects.
    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn scope(&self) -> Scope {
        if self.namespace.is_some() {
            Scope::Namespaced
        } else {
            Scope::Cluster
        }
    }

    pub fn encode(&self) -> String {
        encode(
            self.namespace.as_deref().unwrap_or_default(),
            &self.name,
            self.scope(),
        )
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

#[cfg(test)]
mod tests {
    use super::{ResourceId, Scope, decode, encode};
    use crate::error::Error;

    fn assert_malformed(id: &str, scope: Scope) {
        match decode(id, scope) {
            Err(Error::MalformedIdentifier { id: got, .. }) => assert_eq!(got, id),
            other => panic!("expected malformed identifier for {id:?}, got {other:?}"),
        }
    }

    #[test]
    fn namespaced_round_trip() {
        for (namespace, name) in [
            ("default", "tf-acc-test-abc123"),
            ("kube-system", "coredns"),
            ("a", "b"),
            ("ns", "name.with.dots"),
        ] {
            let id = encode(namespace, name, Scope::Namespaced);
            let decoded = decode(&id, Scope::Namespaced).unwrap();
            assert_eq!(decoded.namespace(), Some(namespace));
            assert_eq!(decoded.name(), name);
        }
    }

    #[test]
    fn cluster_round_trip() {
        for name in ["node-1", "system:aggregate-to-edit", "pv0001"] {
            let id = encode("", name, Scope::Cluster);
            assert_eq!(id, name);
            let decoded = decode(&id, Scope::Cluster).unwrap();
            assert_eq!(decoded.namespace(), None);
            assert_eq!(decoded.name(), name);
        }
    }

    #[test]
    fn encodes_default_namespace_object() {
        let id = encode("default", "tf-acc-test-abc123", Scope::Namespaced);
        assert_eq!(id, "default/tf-acc-test-abc123");

        let decoded = decode(&id, Scope::Namespaced).unwrap();
        assert_eq!(decoded.namespace(), Some("default"));
        assert_eq!(decoded.name(), "tf-acc-test-abc123");
        assert_eq!(decoded.to_string(), id);
    }

    #[test]
    fn rejects_malformed_identifiers() {
        assert_malformed("no-slash-here", Scope::Namespaced);
        assert_malformed("ns/name/extra", Scope::Namespaced);
        assert_malformed("/name", Scope::Namespaced);
        assert_malformed("ns/", Scope::Namespaced);
        assert_malformed("", Scope::Namespaced);
        assert_malformed("", Scope::Cluster);
    }

    #[test]
    fn checked_constructors() {
        let id = ResourceId::namespaced("default", "cm").unwrap();
        assert_eq!(id.scope(), Scope::Namespaced);
        assert_eq!(id.encode(), "default/cm");

        assert!(ResourceId::namespaced("", "cm").is_err());
        assert!(ResourceId::namespaced("a/b", "cm").is_err());
        assert!(ResourceId::namespaced("default", "").is_err());

        let id = ResourceId::cluster("admin").unwrap();
        assert_eq!(id.scope(), Scope::Cluster);
        assert_eq!(id.encode(), "admin");
        assert!(ResourceId::cluster("").is_err());
    }
}
