//! Lifecycle of managed resources.

use std::time::Duration;

use kube::{
    Api, Client,
    api::{DeleteParams, PostParams},
};
use tokio::time::{sleep, timeout};
use tracing::{debug, info, warn};

use crate::{
    dynamic::DynamicObject,
    error::{Error, Result},
    fields::Mode,
    id::{self, ResourceId},
    kind::Kind,
    retry::{RetryPolicy, retry_with_policy},
    state::State,
};

/// Time limits for operations that wait on the API server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    /// How long to wait for a deleted object to disappear.
    pub delete: Duration,
    /// Interval between existence checks while waiting.
    pub poll_interval: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            delete: Duration::from_secs(60),
            poll_interval: Duration::from_secs(1),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    NoOp,
    Create,
    Update,
    Replace,
}

/// Outcome of comparing prior and proposed state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Plan {
    pub action: Action,
    /// Attributes whose change forces replacement.
    pub replace_triggers: Vec<String>,
}

/// Create/read/update/delete for one managed kind.
#[derive(Clone)]
pub struct ResourceHandler {
    client: Client,
    kind: &'static Kind,
    retry: RetryPolicy,
    timeouts: Timeouts,
}

impl ResourceHandler {
    /// Fails with [`Error::ReadOnly`] for kinds that are only data sources.
    pub fn new(client: Client, kind: &'static Kind) -> Result<Self> {
        if !kind.managed {
            return Err(Error::ReadOnly(kind.type_name));
        }
        Ok(Self {
            client,
            kind,
            retry: RetryPolicy::default(),
            timeouts: Timeouts::default(),
        })
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_timeouts(mut self, timeouts: Timeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    pub fn kind(&self) -> &'static Kind {
        self.kind
    }

    fn api(&self, namespace: Option<&str>) -> Api<DynamicObject> {
        match namespace {
            Some(namespace) => Api::namespaced_with(self.client.clone(), namespace, self.kind),
            None => Api::all_with(self.client.clone(), self.kind),
        }
    }

    fn decode(&self, id: &str) -> Result<ResourceId> {
        id::decode(id, self.kind.scope)
    }

    /// Decide how `proposed` is reached from `prior`.
    ///
    /// `ForceNew` attributes left unset in `proposed` take the server value
    /// and never trigger replacement. Values the server filled in beyond what
    /// `proposed` declares are not drift, as decided by
    /// [`Field::is_unchanged`](crate::fields::Field::is_unchanged).
    pub fn plan(&self, prior: Option<&State>, proposed: &State) -> Plan {
        let Some(prior) = prior else {
            return Plan {
                action: Action::Create,
                replace_triggers: Vec::new(),
            };
        };

        let mut replace_triggers = Vec::new();
        let (before, after) = (&prior.metadata, &proposed.metadata);
        if after.name.is_some() && after.name != before.name {
            replace_triggers.push("metadata.name".to_string());
        }
        if after.generate_name.is_some() && after.generate_name != before.generate_name {
            replace_triggers.push("metadata.generate_name".to_string());
        }
        if after.effective_namespace(self.kind) != before.namespace {
            replace_triggers.push("metadata.namespace".to_string());
        }

        let mut changed = after.labels != before.labels || after.annotations != before.annotations;
        for field in self.kind.fields {
            let (old, new) = (prior.attribute(field.attribute), proposed.attribute(field.attribute));
            match field.mode {
                Mode::ForceNew if new.is_some() && !field.is_unchanged(old, new) => {
                    replace_triggers.push(field.attribute.to_string());
                }
                Mode::Optional if !field.is_unchanged(old, new) => changed = true,
                _ => {}
            }
        }

        let action = if !replace_triggers.is_empty() {
            Action::Replace
        } else if changed {
            Action::Update
        } else {
            Action::NoOp
        };
        Plan {
            action,
            replace_triggers,
        }
    }

    /// Create the object and return its state, including the new identifier.
    pub async fn create(&self, planned: &State) -> Result<State> {
        planned.metadata.validate(self.kind)?;
        let object = planned.to_object(self.kind)?;
        let namespace = planned.metadata.effective_namespace(self.kind);
        let api = self.api(namespace.as_deref());

        info!(
            kind = self.kind.kind,
            namespace = namespace.as_deref().unwrap_or_default(),
            name = object.metadata.name.as_deref().unwrap_or_default(),
            "creating object"
        );
        let pp = PostParams::default();
        let created = retry_with_policy(&self.retry, || api.create(&pp, &object)).await?;

        let state = State::from_object(self.kind, &created, Some(&planned.metadata))?;
        info!(kind = self.kind.kind, id = %state.id, "created object");
        Ok(state)
    }

    /// Refresh state from the live object. `None` means the object is gone
    /// and the instance should be dropped from state.
    pub async fn read(&self, current: &State) -> Result<Option<State>> {
        let id = self.decode(&current.id)?;
        let api = self.api(id.namespace());

        debug!(kind = self.kind.kind, %id, "reading object");
        match retry_with_policy(&self.retry, || api.get_opt(id.name())).await? {
            Some(object) => Ok(Some(State::from_object(
                self.kind,
                &object,
                Some(&current.metadata),
            )?)),
            None => {
                warn!(kind = self.kind.kind, %id, "object not found, removing from state");
                Ok(None)
            }
        }
    }

    /// Apply in-place changes. The live object's resource version is sent
    /// back, so concurrent modifications surface as conflicts.
    pub async fn update(&self, prior: &State, planned: &State) -> Result<State> {
        let plan = self.plan(Some(prior), planned);
        if plan.action == Action::Replace {
            return Err(Error::RequiresReplacement(plan.replace_triggers));
        }
        planned.metadata.validate_fields(self.kind)?;

        let id = self.decode(&prior.id)?;
        let api = self.api(id.namespace());
        let mut live = retry_with_policy(&self.retry, || api.get(id.name())).await?;

        planned.metadata.merge_into(&mut live.metadata);
        for field in self.kind.fields.iter().filter(|f| f.mode == Mode::Optional) {
            field.set_if_changed(
                &mut live.data,
                prior.attribute(field.attribute),
                planned.attribute(field.attribute),
            )?;
        }

        info!(kind = self.kind.kind, %id, "updating object");
        let pp = PostParams::default();
        let updated = retry_with_policy(&self.retry, || api.replace(id.name(), &pp, &live)).await?;
        State::from_object(self.kind, &updated, Some(&planned.metadata))
    }

    /// Delete the object and wait until the API server no longer returns it.
    /// An object that is already gone counts as deleted.
    pub async fn delete(&self, current: &State) -> Result<()> {
        let id = self.decode(&current.id)?;
        let api = self.api(id.namespace());

        info!(kind = self.kind.kind, %id, "deleting object");
        let dp = DeleteParams::default();
        match retry_with_policy(&self.retry, || api.delete(id.name(), &dp))
            .await
            .map_err(Error::from)
        {
            Ok(_) => {}
            Err(error) if error.is_not_found() => {
                debug!(kind = self.kind.kind, %id, "object already deleted");
                return Ok(());
            }
            Err(error) => return Err(error),
        }

        self.wait_for_deletion(&api, &id).await
    }

    async fn wait_for_deletion(&self, api: &Api<DynamicObject>, id: &ResourceId) -> Result<()> {
        let poll = async {
            loop {
                match retry_with_policy(&self.retry, || api.get_opt(id.name())).await? {
                    None => return Ok::<(), Error>(()),
                    Some(_) => {
                        debug!(kind = self.kind.kind, %id, "waiting for object to be deleted");
                        sleep(self.timeouts.poll_interval).await;
                    }
                }
            }
        };

        timeout(self.timeouts.delete, poll)
            .await
            .map_err(|_| Error::DeleteTimeout {
                id: id.to_string(),
                timeout: self.timeouts.delete,
            })?
    }

    /// Adopt an existing object by identifier.
    pub async fn import(&self, id: &str) -> Result<State> {
        let resource_id = self.decode(id)?;
        let api = self.api(resource_id.namespace());

        info!(kind = self.kind.kind, id, "importing object");
        let object = retry_with_policy(&self.retry, || api.get_opt(resource_id.name()))
            .await?
            .ok_or_else(|| Error::ImportNotFound(id.to_string()))?;
        State::from_object(self.kind, &object, None)
    }
}
