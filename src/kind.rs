use std::borrow::Cow;

use crate::{
    fields::{Codec, Field},
    id::Scope,
    validation::NameRule,
};

/// A supported Kubernetes object kind and the attributes exposed for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Kind {
    /// Resource type name, e.g. `kubernetes_config_map_v1`.
    pub type_name: &'static str,
    /// API group, empty for the core group.
    pub group: &'static str,
    pub version: &'static str,
    pub kind: &'static str,
    pub plural: &'static str,
    pub short_names: &'static [&'static str],
    pub scope: Scope,
    pub name_rule: NameRule,
    /// `false` for kinds that are only available as data sources.
    pub managed: bool,
    pub fields: &'static [Field],
}

impl Kind {
    pub fn api_version(&self) -> Cow<'static, str> {
        if self.group.is_empty() {
            self.version.into()
        } else {
            format!("{}/{}", self.group, self.version).into()
        }
    }

    pub fn is_namespaced(&self) -> bool {
        self.scope.is_namespaced()
    }

    pub fn field(&self, attribute: &str) -> Option<&'static Field> {
        self.fields.iter().find(|field| field.attribute == attribute)
    }

    /// Matching is done against the type name, plural, kind, short names and
    /// group-qualified plural, the way kubectl resolves resource arguments.
    pub fn matches(&self, target: &str) -> bool {
        self.type_name == target
            || self.plural == target
            || self.kind.eq_ignore_ascii_case(target)
            || self.short_names.iter().any(|short| *short == target)
            || (!self.group.is_empty() && format!("{}.{}", self.plural, self.group) == target)
    }
}

/// Look up a kind by its exact resource type name.
pub fn by_type_name(type_name: &str) -> Option<&'static Kind> {
    KINDS.iter().find(|kind| kind.type_name == type_name)
}

/// Resolve a kind from any of the names accepted by [`Kind::matches`].
pub fn resolve_kind(target: &str) -> Option<&'static Kind> {
    KINDS.iter().find(|kind| kind.matches(target))
}

const RBAC_GROUP: &str = "rbac.authorization.k8s.io";

const CONFIG_MAP_FIELDS: &[Field] = &[
    Field::optional("data", &["data"], Codec::Map),
    Field::optional("binary_data", &["binaryData"], Codec::Map),
    Field::optional("immutable", &["immutable"], Codec::Scalar),
];

const SECRET_FIELDS: &[Field] = &[
    Field::optional("data", &["data"], Codec::Base64Map),
    Field::optional("binary_data", &["binaryData"], Codec::Map),
    Field::force_new("type", &["type"], Codec::Scalar),
    Field::optional("immutable", &["immutable"], Codec::Scalar),
];

const SERVICE_ACCOUNT_FIELDS: &[Field] = &[
    Field::optional(
        "automount_service_account_token",
        &["automountServiceAccountToken"],
        Codec::Scalar,
    ),
    Field::optional("image_pull_secret", &["imagePullSecrets"], Codec::Nested),
    Field::optional("secret", &["secrets"], Codec::Nested),
];

const RESOURCE_QUOTA_FIELDS: &[Field] = &[
    Field::optional("hard", &["spec", "hard"], Codec::Quantities),
    Field::optional("scopes", &["spec", "scopes"], Codec::Scalar),
    Field::optional("scope_selector", &["spec", "scopeSelector"], Codec::Nested),
    Field::computed("used", &["status", "used"], Codec::Quantities),
];

const INGRESS_FIELDS: &[Field] = &[
    Field::optional("ingress_class_name", &["spec", "ingressClassName"], Codec::Scalar),
    Field::optional("default_backend", &["spec", "defaultBackend"], Codec::Nested),
    Field::optional("rule", &["spec", "rules"], Codec::Nested),
    Field::optional("tls", &["spec", "tls"], Codec::Nested),
    Field::computed("status", &["status"], Codec::Nested),
];

const ROLE_FIELDS: &[Field] = &[Field::optional("rule", &["rules"], Codec::Nested)];

const CLUSTER_ROLE_FIELDS: &[Field] = &[
    Field::optional("rule", &["rules"], Codec::Nested),
    Field::optional("aggregation_rule", &["aggregationRule"], Codec::Nested),
];

const BINDING_FIELDS: &[Field] = &[
    Field::force_new("role_ref", &["roleRef"], Codec::Nested),
    Field::optional("subject", &["subjects"], Codec::Nested),
];

const ENDPOINT_SLICE_FIELDS: &[Field] = &[
    Field::force_new("address_type", &["addressType"], Codec::Scalar),
    Field::optional("endpoint", &["endpoints"], Codec::Nested),
    Field::optional("port", &["ports"], Codec::Nested),
];

const PERSISTENT_VOLUME_FIELDS: &[Field] = &[
    Field::optional("spec", &["spec"], Codec::Nested),
    Field::computed("phase", &["status", "phase"], Codec::Scalar),
];

const MUTATING_WEBHOOK_FIELDS: &[Field] = &[Field::optional("webhook", &["webhooks"], Codec::Nested)];

const NODE_FIELDS: &[Field] = &[
    Field::computed("spec", &["spec"], Codec::Nested),
    Field::computed("status", &["status"], Codec::Nested),
];

/// Every kind this crate knows about. One API generation is used per kind.
pub static KINDS: &[Kind] = &[
    Kind {
        type_name: "kubernetes_config_map_v1",
        group: "",
        version: "v1",
        kind: "ConfigMap",
        plural: "configmaps",
        short_names: &["cm"],
        scope: Scope::Namespaced,
        name_rule: NameRule::Subdomain,
        managed: true,
        fields: CONFIG_MAP_FIELDS,
    },
    Kind {
        type_name: "kubernetes_secret_v1",
        group: "",
        version: "v1",
        kind: "Secret",
        plural: "secrets",
        short_names: &[],
        scope: Scope::Namespaced,
        name_rule: NameRule::Subdomain,
        managed: true,
        fields: SECRET_FIELDS,
    },
    Kind {
        type_name: "kubernetes_service_account_v1",
        group: "",
        version: "v1",
        kind: "ServiceAccount",
        plural: "serviceaccounts",
        short_names: &["sa"],
        scope: Scope::Namespaced,
        name_rule: NameRule::Subdomain,
        managed: true,
        fields: SERVICE_ACCOUNT_FIELDS,
    },
    Kind {
        type_name: "kubernetes_namespace_v1",
        group: "",
        version: "v1",
        kind: "Namespace",
        plural: "namespaces",
        short_names: &["ns"],
        scope: Scope::Cluster,
        name_rule: NameRule::Label,
        managed: true,
        fields: &[],
    },
    Kind {
        type_name: "kubernetes_resource_quota_v1",
        group: "",
        version: "v1",
        kind: "ResourceQuota",
        plural: "resourcequotas",
        short_names: &["quota"],
        scope: Scope::Namespaced,
        name_rule: NameRule::Subdomain,
        managed: true,
        fields: RESOURCE_QUOTA_FIELDS,
    },
    Kind {
        type_name: "kubernetes_persistent_volume_v1",
        group: "",
        version: "v1",
        kind: "PersistentVolume",
        plural: "persistentvolumes",
        short_names: &["pv"],
        scope: Scope::Cluster,
        name_rule: NameRule::Subdomain,
        managed: true,
        fields: PERSISTENT_VOLUME_FIELDS,
    },
    Kind {
        type_name: "kubernetes_node_v1",
        group: "",
        version: "v1",
        kind: "Node",
        plural: "nodes",
        short_names: &["no"],
        scope: Scope::Cluster,
        name_rule: NameRule::Subdomain,
        managed: false,
        fields: NODE_FIELDS,
    },
    Kind {
        type_name: "kubernetes_ingress_v1",
        group: "networking.k8s.io",
        version: "v1",
        kind: "Ingress",
        plural: "ingresses",
        short_names: &["ing"],
        scope: Scope::Namespaced,
        name_rule: NameRule::Subdomain,
        managed: true,
        fields: INGRESS_FIELDS,
    },
    Kind {
        type_name: "kubernetes_endpoint_slice_v1",
        group: "discovery.k8s.io",
        version: "v1",
        kind: "EndpointSlice",
        plural: "endpointslices",
        short_names: &[],
        scope: Scope::Namespaced,
        name_rule: NameRule::Subdomain,
        managed: true,
        fields: ENDPOINT_SLICE_FIELDS,
    },
    Kind {
        type_name: "kubernetes_role_v1",
        group: RBAC_GROUP,
        version: "v1",
        kind: "Role",
        plural: "roles",
        short_names: &[],
        scope: Scope::Namespaced,
        name_rule: NameRule::PathSegment,
        managed: true,
        fields: ROLE_FIELDS,
    },
    Kind {
        type_name: "kubernetes_role_binding_v1",
        group: RBAC_GROUP,
        version: "v1",
        kind: "RoleBinding",
        plural: "rolebindings",
        short_names: &[],
        scope: Scope::Namespaced,
        name_rule: NameRule::PathSegment,
        managed: true,
        fields: BINDING_FIELDS,
    },
    Kind {
        type_name: "kubernetes_cluster_role_v1",
        group: RBAC_GROUP,
        version: "v1",
        kind: "ClusterRole",
        plural: "clusterroles",
        short_names: &[],
        scope: Scope::Cluster,
        name_rule: NameRule::PathSegment,
        managed: true,
        fields: CLUSTER_ROLE_FIELDS,
    },
    Kind {
        type_name: "kubernetes_cluster_role_binding_v1",
        group: RBAC_GROUP,
        version: "v1",
        kind: "ClusterRoleBinding",
        plural: "clusterrolebindings",
        short_names: &[],
        scope: Scope::Cluster,
        name_rule: NameRule::PathSegment,
        managed: true,
        fields: BINDING_FIELDS,
    },
    Kind {
        type_name: "kubernetes_mutating_webhook_configuration_v1",
        group: "admissionregistration.k8s.io",
        version: "v1",
        kind: "MutatingWebhookConfiguration",
        plural: "mutatingwebhookconfigurations",
        short_names: &[],
        scope: Scope::Cluster,
        name_rule: NameRule::Subdomain,
        managed: true,
        fields: MUTATING_WEBHOOK_FIELDS,
    },
];
