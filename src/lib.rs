#![cfg_attr(not(doctest), doc = include_str!("../README.md"))]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub use k8s_openapi;
pub use kube;

pub mod config;
pub mod data_source;
pub mod dynamic;
pub mod error;
pub mod fields;
pub mod id;
pub mod kind;
pub mod metadata;
pub mod provider;
pub mod resource;
pub mod retry;
pub mod state;
pub mod validation;

#[cfg(test)]
mod mock;

pub use config::ProviderConfig;
pub use data_source::{DataSource, ListQuery};
pub use error::{Error, Result};
pub use id::{ResourceId, Scope};
pub use kind::{KINDS, Kind, resolve_kind};
pub use metadata::Metadata;
pub use provider::Provider;
pub use resource::{Action, Plan, ResourceHandler, Timeouts};
pub use retry::RetryPolicy;
pub use state::State;
