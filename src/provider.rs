use futures::stream::{self, StreamExt};
use kube::Client;
use tracing::{debug, info};

use crate::{
    config::ProviderConfig,
    data_source::DataSource,
    error::{Error, Result},
    kind::{self, KINDS},
    resource::{ResourceHandler, Timeouts},
    retry::RetryPolicy,
    state::State,
};

/// Entry point for resource and data source handlers.
///
/// Owns one client; every handler it returns shares that client, so there is
/// no process-wide connection state.
#[derive(Clone)]
pub struct Provider {
    client: Client,
    retry: RetryPolicy,
    timeouts: Timeouts,
    parallelism: usize,
}

impl Provider {
    /// Use an already configured client.
    pub fn new(client: Client) -> Self {
        Self::with_config(client, &ProviderConfig::default())
    }

    /// Use an already configured client with the provider settings of `config`.
    pub fn with_config(client: Client, config: &ProviderConfig) -> Self {
        Self {
            client,
            retry: config.retry_policy(),
            timeouts: config.timeouts(),
            parallelism: config.parallelism(),
        }
    }

    /// Build the client described by `config` and wrap it.
    pub async fn from_config(config: &ProviderConfig) -> anyhow::Result<Self> {
        let client = config.client().await?;
        info!(
            resources = Self::resource_types().count(),
            data_sources = Self::data_source_types().count(),
            "provider configured"
        );
        Ok(Self::with_config(client, config))
    }

    /// Type names usable as managed resources.
    pub fn resource_types() -> impl Iterator<Item = &'static str> {
        KINDS.iter().filter(|k| k.managed).map(|k| k.type_name)
    }

    /// Type names usable as data sources. Every kind can be read.
    pub fn data_source_types() -> impl Iterator<Item = &'static str> {
        KINDS.iter().map(|k| k.type_name)
    }

    pub fn resource(&self, type_name: &str) -> Result<ResourceHandler> {
        let kind =
            kind::by_type_name(type_name).ok_or_else(|| Error::UnknownType(type_name.to_string()))?;
        Ok(ResourceHandler::new(self.client.clone(), kind)?
            .with_retry(self.retry)
            .with_timeouts(self.timeouts))
    }

    pub fn data_source(&self, type_name: &str) -> Result<DataSource> {
        let kind =
            kind::by_type_name(type_name).ok_or_else(|| Error::UnknownType(type_name.to_string()))?;
        Ok(DataSource::new(self.client.clone(), kind).with_retry(self.retry))
    }

    /// Read many resource instances, at most `parallelism` at a time.
    /// Results are returned in input order.
    pub async fn refresh(&self, instances: &[(&str, State)]) -> Vec<Result<Option<State>>> {
        debug!(count = instances.len(), parallelism = self.parallelism, "refreshing");
        stream::iter(instances)
            .map(|(type_name, state)| async move {
                match self.resource(type_name) {
                    Ok(handler) => handler.read(state).await,
                    Err(error) => Err(error),
                }
            })
            .buffered(self.parallelism)
            .collect()
            .await
    }
}
