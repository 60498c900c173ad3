//! Read-only lookups of existing objects.

use kube::{
    Api, Client,
    api::ListParams,
};
use tracing::debug;

use crate::{
    dynamic::DynamicObject,
    error::{Error, Result},
    kind::Kind,
    metadata::Metadata,
    retry::{RetryPolicy, retry_with_policy},
    state::State,
};

/// Filters for listing objects of one kind.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListQuery {
    /// Restrict to one namespace; all namespaces when unset.
    pub namespace: Option<String>,
    pub label_selector: Option<String>,
    pub field_selector: Option<String>,
    pub limit: Option<u32>,
}

/// Data source for one kind. Missing objects are an empty result, not an error.
#[derive(Clone)]
pub struct DataSource {
    client: Client,
    kind: &'static Kind,
    retry: RetryPolicy,
}

impl DataSource {
    pub fn new(client: Client, kind: &'static Kind) -> Self {
        Self {
            client,
            kind,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn kind(&self) -> &'static Kind {
        self.kind
    }

    /// Look up a single object by `metadata.name` and `metadata.namespace`.
    pub async fn read(&self, metadata: &Metadata) -> Result<Option<State>> {
        let name = metadata
            .name
            .as_deref()
            .ok_or_else(|| Error::validation("metadata.name", "is required"))?;
        self.kind.name_rule.check("metadata.name", name)?;
        metadata.validate_fields(self.kind)?;

        let namespace = metadata.effective_namespace(self.kind);
        let api: Api<DynamicObject> = match namespace.as_deref() {
            Some(namespace) => Api::namespaced_with(self.client.clone(), namespace, self.kind),
            None => Api::all_with(self.client.clone(), self.kind),
        };

        match retry_with_policy(&self.retry, || api.get_opt(name)).await? {
            Some(object) => Ok(Some(State::from_object(self.kind, &object, Some(metadata))?)),
            None => {
                debug!(
                    kind = self.kind.kind,
                    namespace = namespace.as_deref().unwrap_or_default(),
                    name,
                    "object not found"
                );
                Ok(None)
            }
        }
    }

    /// List objects matching the query.
    pub async fn list(&self, query: &ListQuery) -> Result<Vec<State>> {
        let api: Api<DynamicObject> = match query.namespace.as_deref() {
            Some(namespace) if self.kind.is_namespaced() => {
                Api::namespaced_with(self.client.clone(), namespace, self.kind)
            }
            Some(_) => {
                return Err(Error::validation(
                    "namespace",
                    format!("{} is cluster-scoped", self.kind.kind),
                ));
            }
            None => Api::all_with(self.client.clone(), self.kind),
        };

        let mut lp = ListParams::default();
        if let Some(labels) = &query.label_selector {
            lp = lp.labels(labels);
        }
        if let Some(fields) = &query.field_selector {
            lp = lp.fields(fields);
        }
        if let Some(limit) = query.limit {
            lp = lp.limit(limit);
        }

        let list = retry_with_policy(&self.retry, || api.list(&lp)).await?;
        debug!(kind = self.kind.kind, count = list.items.len(), "listed objects");
        list.items
            .iter()
            .map(|object| State::from_object(self.kind, object, None))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use http::Method;
    use serde_json::json;

    use super::{DataSource, ListQuery};
    use crate::{
        error::Error,
        kind::by_type_name,
        metadata::Metadata,
        mock::{self, expect},
    };

    fn data_source(type_name: &str) -> (DataSource, mock::Handle) {
        let (client, handle) = mock::client();
        (DataSource::new(client, by_type_name(type_name).unwrap()), handle)
    }

    #[tokio::test]
    async fn read_existing_object() {
        let (source, mut handle) = data_source("kubernetes_service_account_v1");
        let server = tokio::spawn(async move {
            let (_, send) = expect(
                &mut handle,
                Method::GET,
                "/api/v1/namespaces/kube-system/serviceaccounts/default",
            )
            .await;
            send.send_response(mock::ok(&json!({
                "apiVersion": "v1",
                "kind": "ServiceAccount",
                "metadata": {"name": "default", "namespace": "kube-system"},
                "automountServiceAccountToken": false,
                "imagePullSecrets": [{"name": "registry"}]
            })));
        });

        let state = source
            .read(&Metadata::named("default").in_namespace("kube-system"))
            .await
            .unwrap()
            .unwrap();
        server.await.unwrap();

        assert_eq!(state.id, "kube-system/default");
        assert_eq!(
            state.attribute("automount_service_account_token"),
            Some(&json!(false))
        );
        assert_eq!(
            state.attribute("image_pull_secret"),
            Some(&json!([{"name": "registry"}]))
        );
    }

    #[tokio::test]
    async fn read_missing_object_is_empty() {
        let (source, mut handle) = data_source("kubernetes_config_map_v1");
        let server = tokio::spawn(async move {
            let (_, send) = expect(
                &mut handle,
                Method::GET,
                "/api/v1/namespaces/default/configmaps/absent",
            )
            .await;
            send.send_response(mock::not_found("absent"));
        });

        let result = source.read(&Metadata::named("absent")).await.unwrap();
        server.await.unwrap();
        assert_eq!(result, None);
    }

    #[tokio::test]
    async fn read_node_by_name() {
        let (source, mut handle) = data_source("kubernetes_node_v1");
        let server = tokio::spawn(async move {
            let (_, send) = expect(&mut handle, Method::GET, "/api/v1/nodes/node-1").await;
            send.send_response(mock::ok(&json!({
                "apiVersion": "v1",
                "kind": "Node",
                "metadata": {"name": "node-1", "labels": {"kubernetes.io/hostname": "node-1"}},
                "spec": {"podCIDR": "10.244.0.0/24", "providerID": "kind://docker/node-1"},
                "status": {"capacity": {"cpu": "4"}, "nodeInfo": {"machineID": "abc", "kubeletVersion": "v1.33.0"}}
            })));
        });

        let state = source.read(&Metadata::named("node-1")).await.unwrap().unwrap();
        server.await.unwrap();

        assert_eq!(state.id, "node-1");
        assert!(state.metadata.labels.is_empty());
        assert_eq!(
            state.attribute("spec"),
            Some(&json!({"pod_cidr": "10.244.0.0/24", "provider_id": "kind://docker/node-1"}))
        );
        assert_eq!(
            state.attribute("status"),
            Some(&json!({"capacity": {"cpu": "4"}, "node_info": {"machine_id": "abc", "kubelet_version": "v1.33.0"}}))
        );
    }

    #[tokio::test]
    async fn read_requires_a_name() {
        let (source, _handle) = data_source("kubernetes_config_map_v1");
        let err = source.read(&Metadata::default()).await.unwrap_err();
        assert!(matches!(err, Error::Validation { .. }));
    }

    #[tokio::test]
    async fn list_with_selectors() {
        let (source, mut handle) = data_source("kubernetes_config_map_v1");
        let server = tokio::spawn(async move {
            let (request, send) = expect(
                &mut handle,
                Method::GET,
                "/api/v1/namespaces/team-a/configmaps",
            )
            .await;
            let query = request.uri().query().unwrap_or_default().to_string();
            assert!(query.contains("labelSelector=app%3Dweb"), "{query}");
            assert!(query.contains("limit=2"), "{query}");
            send.send_response(mock::ok(&json!({
                "apiVersion": "v1",
                "kind": "ConfigMapList",
                "metadata": {"resourceVersion": "100"},
                "items": [
                    {"metadata": {"name": "a", "namespace": "team-a"}, "data": {"k": "1"}},
                    {"metadata": {"name": "b", "namespace": "team-a"}}
                ]
            })));
        });

        let states = source
            .list(&ListQuery {
                namespace: Some("team-a".into()),
                label_selector: Some("app=web".into()),
                limit: Some(2),
                ..Default::default()
            })
            .await
            .unwrap();
        server.await.unwrap();

        let ids: Vec<_> = states.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, ["team-a/a", "team-a/b"]);
        assert_eq!(states[0].attribute("data"), Some(&json!({"k": "1"})));
        assert_eq!(states[1].attribute("data"), None);
    }

    #[tokio::test]
    async fn list_rejects_namespace_for_cluster_kind() {
        let (source, _handle) = data_source("kubernetes_cluster_role_v1");
        let err = source
            .list(&ListQuery {
                namespace: Some("default".into()),
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation { .. }));
    }
}
