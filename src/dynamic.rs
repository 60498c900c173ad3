use std::borrow::Cow;

use kube::{
    Resource,
    api::{ObjectMeta, TypeMeta},
    core::DynamicResourceScope,
};
use serde_json::{Map, Value};

use crate::kind::Kind;

/// An untyped Kubernetes object whose dynamic type is a registry [`Kind`].
///
/// `kube::api::DynamicObject` needs an `ApiResource` from discovery; binding
/// the object to the static registry instead means URLs, apiVersion and scope
/// come from the kind table without a round trip to the API server.
#[derive(serde::Serialize, serde::Deserialize, Clone, Debug, PartialEq)]
pub struct DynamicObject {
    /// The type fields, not always present
    #[serde(flatten, default)]
    pub types: Option<TypeMeta>,
    /// Object metadata
    #[serde(default)]
    pub metadata: ObjectMeta,

    /// All other keys
    #[serde(flatten)]
    pub data: Value,
}

impl DynamicObject {
    /// An empty object of the given kind, ready to be filled and created.
    pub fn new(kind: &Kind) -> Self {
        Self {
            types: Some(TypeMeta {
                api_version: kind.api_version().into_owned(),
                kind: kind.kind.to_string(),
            }),
            metadata: ObjectMeta::default(),
            data: Value::Object(Map::new()),
        }
    }
}

impl Resource for DynamicObject {
    type DynamicType = Kind;
    type Scope = DynamicResourceScope;

    fn group(dt: &Kind) -> Cow<'_, str> {
        dt.group.into()
    }

    fn version(dt: &Kind) -> Cow<'_, str> {
        dt.version.into()
    }

    fn kind(dt: &Kind) -> Cow<'_, str> {
        dt.kind.into()
    }

    fn api_version(dt: &Kind) -> Cow<'_, str> {
        dt.api_version()
    }

    fn plural(dt: &Kind) -> Cow<'_, str> {
        dt.plural.into()
    }

    fn meta(&self) -> &ObjectMeta {
        &self.metadata
    }

    fn meta_mut(&mut self) -> &mut ObjectMeta {
        &mut self.metadata
    }
}
