use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{
    dynamic::DynamicObject,
    error::Result,
    id::ResourceId,
    kind::Kind,
    metadata::Metadata,
};

/// The declarative document tracked for one resource instance.
///
/// Kind-specific attributes sit next to `id` and `metadata`, keyed by the
/// attribute names of the kind's field table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct State {
    /// Encoded [`ResourceId`]; empty until the object has been created.
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub metadata: Metadata,
    #[serde(flatten)]
    pub attributes: Map<String, Value>,
}

impl State {
    pub fn new(metadata: Metadata) -> Self {
        Self {
            metadata,
            ..Default::default()
        }
    }

    pub fn with_attribute(mut self, attribute: impl Into<String>, value: Value) -> Self {
        self.attributes.insert(attribute.into(), value);
        self
    }

    pub fn attribute(&self, attribute: &str) -> Option<&Value> {
        self.attributes.get(attribute).filter(|value| !value.is_null())
    }

    /// Build state from a live object. `configured` is the metadata the user
    /// declared, used to decide which internal keys stay visible.
    pub(crate) fn from_object(
        kind: &Kind,
        object: &DynamicObject,
        configured: Option<&Metadata>,
    ) -> Result<Self> {
        let name = object.metadata.name.clone().unwrap_or_default();
        let resource_id = if kind.is_namespaced() {
            let namespace = object.metadata.namespace.clone().unwrap_or_default();
            ResourceId::namespaced(namespace, name)?
        } else {
            ResourceId::cluster(name)?
        };

        let mut attributes = Map::new();
        for field in kind.fields {
            if let Some(value) = field.get(&object.data)? {
                attributes.insert(field.attribute.to_string(), value);
            }
        }

        Ok(Self {
            id: resource_id.encode(),
            metadata: Metadata::flatten(&object.metadata, configured),
            attributes,
        })
    }

    /// Build the object sent on create.
    pub(crate) fn to_object(&self, kind: &Kind) -> Result<DynamicObject> {
        let mut object = DynamicObject::new(kind);
        object.metadata = self.metadata.expand(kind);
        for field in kind.fields.iter().filter(|field| field.is_writable()) {
            field.set(&mut object.data, self.attribute(field.attribute))?;
        }
        Ok(object)
    }
}
