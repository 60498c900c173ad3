use std::{path::PathBuf, time::Duration};

use anyhow::Context;
use kube::{
    Client, Config,
    config::{KubeConfigOptions, Kubeconfig},
};
use serde::Deserialize;
use tracing::debug;

use crate::{resource::Timeouts, retry::RetryPolicy};

/// Environment variable naming the kubeconfig file.
pub const ENV_CONFIG_PATH: &str = "KUBE_CONFIG_PATH";
/// Environment variable naming the kubeconfig context.
pub const ENV_CONFIG_CONTEXT: &str = "KUBE_CTX";

const DEFAULT_PARALLELISM: usize = 10;

/// Provider configuration, as written in the provider block.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProviderConfig {
    /// Kubeconfig file; the standard kubeconfig lookup is used when unset.
    pub config_path: Option<PathBuf>,
    /// Kubeconfig context; the file's `current-context` when unset.
    pub config_context: Option<String>,
    /// Extra attempts for transient API failures. `0` passes every error through.
    pub max_retries: usize,
    /// How long a delete waits for the object to disappear.
    pub delete_timeout_secs: u64,
    /// Upper bound on concurrent reads during a refresh.
    pub parallelism: usize,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        let timeouts = Timeouts::default();
        Self {
            config_path: None,
            config_context: None,
            max_retries: 0,
            delete_timeout_secs: timeouts.delete.as_secs(),
            parallelism: DEFAULT_PARALLELISM,
        }
    }
}

impl ProviderConfig {
    /// Parse the provider block.
    pub fn from_value(value: serde_json::Value) -> anyhow::Result<Self> {
        serde_json::from_value(value).context("Failed to parse provider configuration")
    }

    /// Fill unset fields from `KUBE_CONFIG_PATH` and `KUBE_CTX`.
    pub fn with_env_defaults(self) -> Self {
        self.with_env_from(|key| std::env::var(key).ok())
    }

    fn with_env_from(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if self.config_path.is_none() {
            self.config_path = lookup(ENV_CONFIG_PATH)
                .filter(|path| !path.is_empty())
                .map(PathBuf::from);
        }
        if self.config_context.is_none() {
            self.config_context = lookup(ENV_CONFIG_CONTEXT).filter(|ctx| !ctx.is_empty());
        }
        self
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::default().with_retries(self.max_retries)
    }

    pub fn timeouts(&self) -> Timeouts {
        Timeouts {
            delete: Duration::from_secs(self.delete_timeout_secs),
            ..Timeouts::default()
        }
    }

    pub fn parallelism(&self) -> usize {
        self.parallelism.max(1)
    }

    /// Read the configured kubeconfig file, or the default one.
    pub fn load_kubeconfig(&self) -> anyhow::Result<Kubeconfig> {
        match &self.config_path {
            Some(path) => Kubeconfig::read_from(path)
                .with_context(|| format!("Failed to read kubeconfig at {path:?}")),
            None => Kubeconfig::read().context("Failed to read kubeconfig"),
        }
    }

    /// Build a client for the selected kubeconfig context.
    pub async fn client(&self) -> anyhow::Result<Client> {
        let kubeconfig = self.load_kubeconfig()?;
        let context = determine_context(self.config_context.as_deref(), &kubeconfig)?;
        debug!(%context, "using kubeconfig context");

        let options = KubeConfigOptions {
            context: Some(context.clone()),
            ..Default::default()
        };
        let config = Config::from_custom_kubeconfig(kubeconfig, &options)
            .await
            .with_context(|| format!("Failed to load context {context:?}"))?;
        Client::try_from(config).context("Failed to create Kubernetes client")
    }
}

/// Determines the Kubernetes context.
///
/// Context determination follows this priority:
/// 1. Uses the context if explicitly specified.
/// 2. Uses the current context of the kubeconfig.
///
/// # Errors
/// Returns an error if no current context is set, or if the selected context
/// does not exist in the kubeconfig.
pub fn determine_context(context: Option<&str>, kubeconfig: &Kubeconfig) -> anyhow::Result<String> {
    let context = match context {
        Some(context) => context.to_string(),
        None => kubeconfig
            .current_context
            .clone()
            .ok_or_else(|| anyhow::anyhow!("current_context is not set"))?,
    };

    if kubeconfig.contexts.iter().any(|named| named.name == context) {
        Ok(context)
    } else {
        Err(anyhow::anyhow!("context {context:?} not found in kubeconfig"))
    }
}
